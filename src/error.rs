//! Error types.

use core::{error, fmt};

pub use shared::ErrorKind;

/// A result whose error defaults to [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// An error produced by the allocator or scheduler.
///
/// Every kind is recoverable and leaves the state it was reported from unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    /// The kind of the error.
    pub kind: ErrorKind,
}
impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self { kind }
    }
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}
impl error::Error for Error {}
