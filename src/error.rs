//! The status-return error type used by operations that report success/failure rather than
//! handing back an `Option`.

use core::fmt;

/// Failure reason for a fallible status-returning operation.
///
/// Allocators (`Heap::allocate`, `MemPool::allocate`) signal exhaustion with `None` instead,
/// following the distinction the source project draws between "returns a pointer" and
/// "returns a status code".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The heap (directly, or transitively through a pool growing itself) could not supply
    /// enough memory to satisfy the request.
    Exhausted,
    /// A referenced item was not found in the list it was expected to be in.
    NotFound,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Exhausted => f.write_str("heap or pool exhausted"),
            Error::NotFound => f.write_str("item not found in list"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
