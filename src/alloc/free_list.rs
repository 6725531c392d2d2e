//! Free lists threaded through the page descriptors.
//!
//! Each list only stores the index of its head block; the links live in the descriptor of each
//! block's first page. Links go both ways so a block can be unlinked from the middle of a list
//! when its buddy is freed.

use super::page::{NIL, PageDescriptor};

/// A list of free blocks of a single order.
#[derive(Debug)]
pub(super) struct FreeList {
    /// The first block on the list, or [`NIL`].
    head: u32,
    /// The number of blocks on the list.
    len: usize,
}

impl FreeList {
    /// Construct an empty list.
    pub const fn new() -> Self {
        Self { head: NIL, len: 0 }
    }

    /// The number of blocks on the list.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Push the block starting at `index` to the front of the list.
    pub fn push(&mut self, pages: &mut [PageDescriptor], index: usize) {
        let raw = index as u32;
        pages[index].prev = NIL;
        pages[index].next = self.head;
        if self.head != NIL {
            pages[self.head as usize].prev = raw;
        }
        self.head = raw;
        self.len += 1;
    }

    /// Remove the block at the front of the list.
    pub fn pop(&mut self, pages: &mut [PageDescriptor]) -> Option<usize> {
        if self.head == NIL {
            return None;
        }
        let index = self.head as usize;
        self.remove(pages, index);
        Some(index)
    }

    /// Unlink the block starting at `index`.
    ///
    /// The block must currently be on this list.
    pub fn remove(&mut self, pages: &mut [PageDescriptor], index: usize) {
        let PageDescriptor { prev, next, .. } = pages[index];
        if prev == NIL {
            debug_assert_eq!(self.head as usize, index, "Unlinking a block from the wrong list");
            self.head = next;
        } else {
            pages[prev as usize].next = next;
        }
        if next != NIL {
            pages[next as usize].prev = prev;
        }
        pages[index].prev = NIL;
        pages[index].next = NIL;
        self.len -= 1;
    }
}
