//! Details shared between the kernel core and the collaborators that link against it.
//!
//! The syscall table, console driver and install routines only see the core through result
//! values, so the error kinds here have a stable numeric encoding they can pass around as plain
//! integers.

#![no_std]

/// Possible kinds of errors from the allocator and scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorKind {
    /// No free block of sufficient order exists, even after splitting larger blocks.
    OutOfMemory = 1,
    /// The requested size exceeds the largest representable block.
    InvalidSize = 2,
    /// A free was given a handle outside the pool, or one that isn't currently allocated.
    InvalidHandle = 3,
    /// Every slot in the task table is in use.
    TaskTableFull = 4,
}
impl ErrorKind {
    /// Every error kind, in numeric order.
    pub const ALL: [Self; 4] = [
        Self::OutOfMemory,
        Self::InvalidSize,
        Self::InvalidHandle,
        Self::TaskTableFull,
    ];

    /// Get the error kind from a number.
    #[must_use]
    pub fn from_num(num: u32) -> Option<Self> {
        Some(match num {
            1 => Self::OutOfMemory,
            2 => Self::InvalidSize,
            3 => Self::InvalidHandle,
            4 => Self::TaskTableFull,
            _ => return None,
        })
    }

    /// Get the number used to pass this error kind across the syscall boundary.
    ///
    /// Zero is never used, so callers can reserve it for success.
    #[must_use]
    pub const fn to_num(self) -> u32 {
        self as u32
    }
}
impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::OutOfMemory => "Out of memory",
            Self::InvalidSize => "Requested size exceeds the largest block",
            Self::InvalidHandle => "Handle does not name an allocated block",
            Self::TaskTableFull => "Task table is full",
        })
    }
}
