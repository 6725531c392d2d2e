//! Physical page allocator for the kernel.
//!
//! Pages come from a fixed pool and are named by [`PageHandle`]s. See [`BuddyAllocator`] for how
//! blocks are split and merged.

mod buddy;
mod free_list;
mod page;

pub use buddy::{BuddyAllocator, order_for_size};
pub use page::PageHandle;
