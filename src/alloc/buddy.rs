//! The buddy allocator.
//!
//! See [`BuddyAllocator`] for details.

use super::{
    free_list::FreeList,
    page::{Descriptors, PageFlags, PageHandle, zeroed_descriptors},
};
use crate::{
    config::{MAX_BLOCK_SIZE, MAX_ORDER, ORDER_COUNT, PAGE_SIZE, POOL_CAPACITY},
    error::{ErrorKind, Result},
};

/// Get the order of the smallest block that holds `size` bytes.
///
/// A size of zero still takes a page. Sizes above [`MAX_BLOCK_SIZE`] are rejected with
/// [`ErrorKind::InvalidSize`].
///
/// ```
/// # use globalos_core::alloc::order_for_size;
/// assert_eq!(order_for_size(1).unwrap(), 0);
/// assert_eq!(order_for_size(4096).unwrap(), 0);
/// assert_eq!(order_for_size(5000).unwrap(), 1);
/// assert_eq!(order_for_size(3 * 4096).unwrap(), 2);
/// ```
pub fn order_for_size(size: usize) -> Result<usize> {
    if size > MAX_BLOCK_SIZE {
        return Err(ErrorKind::InvalidSize.into());
    }
    let num_pages = size.div_ceil(PAGE_SIZE).max(1);
    Ok(num_pages.next_power_of_two().ilog2() as usize)
}

/// A buddy allocator over a fixed pool of pages.
///
/// Memory is handed out in blocks of `2^order` pages, where a block of order `k` always starts at
/// a page index aligned to `2^k`. The block's buddy is the other half of the order-`k + 1` block
/// it belongs to, found by flipping bit `k` of its index.
///
/// Requests are served from the free list of the required order when possible, or else by
/// splitting the smallest larger free block in half until it fits. Frees merge a block with its
/// buddy for as long as the buddy is also a whole free block, so a free block never sits beside a
/// free buddy of the same order.
///
/// The allocator owns all of its state, so independent instances never interfere.
pub struct BuddyAllocator {
    /// Bookkeeping for every page the pool can describe.
    pages: Descriptors,
    /// One free list per order.
    free_lists: [FreeList; ORDER_COUNT],
    /// The number of pages in use by this pool.
    total_pages: usize,
    /// The number of pages on the free lists.
    free_pages: usize,
    /// The end of the kernel image, as reported at boot.
    reserved_end: u64,
}

impl BuddyAllocator {
    /// Set up a pool for the given amount of physical memory.
    ///
    /// The pool covers `total_memory / PAGE_SIZE` pages, capped at [`POOL_CAPACITY`]. Every page
    /// starts out free at order 0 and is then merged with its buddies, so the pool begins as the
    /// largest aligned blocks that fit.
    ///
    /// Fails with [`ErrorKind::OutOfMemory`] if the memory doesn't hold a single page.
    #[doc(alias = "allocator_init")]
    pub fn new(total_memory: u64, reserved_end: u64) -> Result<Self> {
        let total_pages = (total_memory / PAGE_SIZE as u64).min(POOL_CAPACITY as u64) as usize;
        if total_pages == 0 {
            return Err(ErrorKind::OutOfMemory.into());
        }
        let mut allocator = Self {
            pages: zeroed_descriptors(),
            free_lists: [const { FreeList::new() }; ORDER_COUNT],
            total_pages,
            free_pages: 0,
            reserved_end,
        };
        for index in 0..total_pages {
            allocator.release(index, 0);
        }
        log::debug!(
            "Page pool ready: {total_pages} pages, {} order-{MAX_ORDER} blocks",
            allocator.free_lists[MAX_ORDER].len(),
        );
        Ok(allocator)
    }

    /// Allocate a single page.
    pub fn allocate_page(&mut self) -> Result<PageHandle> {
        self.allocate_order(0)
    }

    /// Allocate a block of at least `size` bytes.
    ///
    /// The block spans `2^k` pages for the smallest `k` that fits (see [`order_for_size`]).
    pub fn allocate_block(&mut self, size: usize) -> Result<PageHandle> {
        self.allocate_order(order_for_size(size)?)
    }

    /// Allocate a block of `2^order` pages.
    ///
    /// Fails with [`ErrorKind::InvalidSize`] if `order` exceeds [`MAX_ORDER`], or
    /// [`ErrorKind::OutOfMemory`] if no free block of that order or above exists. A failed
    /// request changes nothing.
    pub fn allocate_order(&mut self, order: usize) -> Result<PageHandle> {
        if order > MAX_ORDER {
            return Err(ErrorKind::InvalidSize.into());
        }
        let Some((mut current_order, index)) = (order..=MAX_ORDER).find_map(|list_order| {
            self.free_lists[list_order]
                .pop(&mut self.pages)
                .map(|index| (list_order, index))
        }) else {
            log::debug!("No free block of order {order} or above");
            return Err(ErrorKind::OutOfMemory.into());
        };
        self.pages[index].flags = PageFlags::empty();

        while current_order > order {
            current_order -= 1;
            let upper_half = index + (1 << current_order);
            log::debug!("Split order-{} block at {index} for order {order}", current_order + 1);
            self.mark_free(upper_half, current_order);
        }

        let head = &mut self.pages[index];
        head.order = order as u8;
        head.flags = PageFlags::ALLOCATED;
        self.free_pages -= 1 << order;
        Ok(PageHandle::from_index(index))
    }

    /// Free a page allocated by [`Self::allocate_page`].
    ///
    /// The allocator records each block's order, so this behaves exactly as
    /// [`Self::free_block`].
    pub fn free_page(&mut self, handle: PageHandle) -> Result<()> {
        self.free_block(handle)
    }

    /// Return an allocated block to the pool, merging it with free buddies.
    ///
    /// Fails with [`ErrorKind::InvalidHandle`] if the handle is outside the pool or doesn't name a
    /// block that is currently allocated. A rejected free changes nothing.
    pub fn free_block(&mut self, handle: PageHandle) -> Result<()> {
        let order = self.block_order(handle).inspect_err(|_| {
            log::warn!("Rejected free of {handle}: not an allocated block");
        })?;
        self.release(handle.index(), order);
        Ok(())
    }

    /// Get the order of the allocated block named by `handle`.
    pub fn block_order(&self, handle: PageHandle) -> Result<usize> {
        match self.pages[..self.total_pages].get(handle.index()) {
            Some(page) if page.flags.allocated() => Ok(page.order.into()),
            _ => Err(ErrorKind::InvalidHandle.into()),
        }
    }

    /// Whether `handle` names a block that is currently allocated.
    pub fn is_allocated(&self, handle: PageHandle) -> bool {
        self.block_order(handle).is_ok()
    }

    /// The number of pages in the pool.
    pub const fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// The number of pages not owned by any allocation.
    pub const fn free_pages(&self) -> usize {
        self.free_pages
    }

    /// The number of free blocks of exactly the given order.
    ///
    /// Orders above [`MAX_ORDER`] never have free blocks.
    pub fn free_blocks(&self, order: usize) -> usize {
        self.free_lists.get(order).map_or(0, FreeList::len)
    }

    /// The end of the kernel image, as given at initialization.
    ///
    /// Pages are named by pool index rather than physical address, so this isn't used to carve
    /// anything out of the pool.
    pub const fn reserved_end(&self) -> u64 {
        self.reserved_end
    }

    /// Give the block at `index` back to the free lists, merging upward as far as possible.
    ///
    /// The block must not currently be on a free list.
    fn release(&mut self, mut index: usize, mut order: usize) {
        self.pages[index].flags = PageFlags::empty();
        self.free_pages += 1 << order;
        while order < MAX_ORDER {
            let buddy = index ^ (1 << order);
            if buddy >= self.total_pages || !self.pages[buddy].is_free_head(order) {
                break;
            }
            self.free_lists[order].remove(&mut self.pages, buddy);
            self.pages[buddy].flags = PageFlags::empty();
            index = index.min(buddy);
            order += 1;
            log::trace!("Merged buddies into order-{order} block at {index}");
        }
        self.mark_free(index, order);
    }

    /// Record the block at `index` as free and put it on its free list.
    fn mark_free(&mut self, index: usize, order: usize) {
        let head = &mut self.pages[index];
        head.order = order as u8;
        head.flags = PageFlags::FREE;
        self.free_lists[order].push(&mut self.pages, index);
    }
}

impl core::fmt::Debug for BuddyAllocator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut free_blocks = [0; ORDER_COUNT];
        for (count, list) in free_blocks.iter_mut().zip(&self.free_lists) {
            *count = list.len();
        }
        f.debug_struct("BuddyAllocator")
            .field("total_pages", &self.total_pages)
            .field("free_pages", &self.free_pages)
            .field("free_blocks", &free_blocks)
            .finish_non_exhaustive()
    }
}
