//! Page handles and the per-page bookkeeping behind them.

use crate::config::{PAGE_SIZE, POOL_CAPACITY};

/// An opaque name for an allocated block, given as the index of its first page in the pool.
///
/// The same handle type is used for single pages and for larger blocks; the allocator remembers
/// each block's order, so callers never do address arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PageHandle(usize);

impl PageHandle {
    /// Name the block starting at the given pool index.
    ///
    /// Any index can be named, but only handles returned from an allocation can be freed.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Name the block starting at the given byte offset into the pool.
    ///
    /// Returns `None` if the offset isn't page-aligned.
    #[must_use]
    pub const fn from_byte_offset(offset: usize) -> Option<Self> {
        if offset.is_multiple_of(PAGE_SIZE) {
            Some(Self(offset / PAGE_SIZE))
        } else {
            None
        }
    }

    /// The pool index of the block's first page.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    /// The byte offset of the block's first page from the start of the pool.
    #[must_use]
    pub const fn byte_offset(self) -> usize {
        self.0 * PAGE_SIZE
    }
}

impl core::fmt::Display for PageHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "page#{}", self.0)
    }
}

bitset::bitset!(
    /// The state of the block a page heads.
    ///
    /// Only the first page of a block carries flags; the pages inside a block have none.
    pub(super) PageFlags(u8) {
        /// The page heads a block sitting on a free list.
        Free,
        /// The page heads a block owned by an outstanding allocation.
        Allocated,
    }
);

/// Marks the end of a free list.
pub(super) const NIL: u32 = u32::MAX;

/// Bookkeeping for a single page of the pool.
#[derive(Clone, Copy, Debug, bytemuck::Zeroable)]
#[repr(C)]
pub(super) struct PageDescriptor {
    /// The previous block on the same free list, or [`NIL`].
    pub prev: u32,
    /// The next block on the same free list, or [`NIL`].
    pub next: u32,
    /// The order of the block this page heads.
    pub order: u8,
    /// The state of the block this page heads.
    pub flags: PageFlags,
}

impl PageDescriptor {
    /// Whether this page heads a free block of exactly the given order.
    pub fn is_free_head(&self, order: usize) -> bool {
        self.flags.free() && usize::from(self.order) == order
    }
}

/// Storage for a full pool's worth of descriptors.
pub(super) type Descriptors = [PageDescriptor; POOL_CAPACITY];

/// Build descriptor storage with every page zeroed: order 0, no flags, unlinked.
pub(super) fn zeroed_descriptors() -> Descriptors {
    bytemuck::Zeroable::zeroed()
}
