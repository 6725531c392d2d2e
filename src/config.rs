//! Kernel configuration.
//!
//! Sizing constants live here so the allocator, scheduler and tests agree on them, along with the
//! [`BootConfig`] that the boot entry hands to [`Kernel::boot`](crate::Kernel::boot).

/// The size of a single page in memory.
pub const PAGE_SIZE: usize = 4096;

/// The largest block order the allocator hands out (inclusive).
///
/// An order-`MAX_ORDER` block spans 4 MiB.
pub const MAX_ORDER: usize = 10;

/// The number of distinct orders, and so the number of free lists.
pub const ORDER_COUNT: usize = MAX_ORDER + 1;

/// The number of pages the statically sized pool can describe.
///
/// This is two maximum-order blocks' worth of pages.
pub const POOL_CAPACITY: usize = 2 << MAX_ORDER;

/// The largest size, in bytes, a single block allocation can request.
pub const MAX_BLOCK_SIZE: usize = (1 << MAX_ORDER) * PAGE_SIZE;

/// The number of slots in the task table.
pub const MAX_TASKS: usize = 16;

/// The amount of memory the boot path reports when nothing else is known.
pub const DEFAULT_TOTAL_MEMORY: u64 = 64 * 1024 * 1024;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    // Page indices are stored as `u32` links inside the page descriptors.
    assert!(POOL_CAPACITY < u32::MAX as usize);
    // Orders are stored as `u8` inside the page descriptors.
    assert!(MAX_ORDER < u8::MAX as usize);
};

/// Parameters the boot entry passes when bringing up the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootConfig {
    /// The total amount of physical memory, in bytes.
    pub total_memory: u64,
    /// The end of the region the kernel image occupies.
    pub reserved_end: u64,
    /// The maximum level of log records to keep.
    pub log_level: log::LevelFilter,
}

impl BootConfig {
    /// The configuration the original boot path used: 64 MiB and `Info` logging.
    pub const DEFAULT: Self = Self {
        total_memory: DEFAULT_TOTAL_MEMORY,
        reserved_end: 0,
        log_level: log::LevelFilter::Info,
    };

    /// Use a different amount of total memory.
    #[must_use]
    pub const fn with_total_memory(self, total_memory: u64) -> Self {
        Self {
            total_memory,
            ..self
        }
    }

    /// Record where the kernel image ends.
    #[must_use]
    pub const fn with_reserved_end(self, reserved_end: u64) -> Self {
        Self {
            reserved_end,
            ..self
        }
    }

    /// Use a different log level.
    #[must_use]
    pub const fn with_log_level(self, log_level: log::LevelFilter) -> Self {
        Self { log_level, ..self }
    }
}

impl Default for BootConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
