//! The resource-management core of the kernel: a buddy page allocator and a cooperative
//! round-robin task scheduler.
//!
//! Everything else in the system (console, keyboard, filesystem, syscall table, install routines)
//! links against this crate and reaches these services through a [`Kernel`]. The boot entry must
//! create the [`Kernel`] before creating any task or allocating any memory.

#![no_std]

pub mod alloc;
pub mod config;
pub mod error;
mod kernel;
pub mod logger;
pub mod sched;

pub use error::{Error, ErrorKind, Result};
pub use kernel::Kernel;
