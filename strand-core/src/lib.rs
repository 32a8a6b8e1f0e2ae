//! Lock-free concurrent collections: an unbounded doubly-ended queue and a
//! bounded ordered set.
//!
//! # Organization
//!
//! - [`data_structures`] - The collections themselves
//! - [`guard`] - Memory reclamation abstraction
//! - [`common_tests`] - Generic test suites reused by guard/set implementations
//!
//! Collections are generic over a guard type `G: Guard` that determines the
//! memory reclamation strategy:
//!
//! ```ignore
//! use strand_core::{ConcurrentDeque, DeferredGuard};
//!
//! let deque: ConcurrentDeque<i32, DeferredGuard> = ConcurrentDeque::new();
//! deque.add_last(42);
//! assert_eq!(deque.poll_first(), Some(42));
//! ```

pub mod common_tests;
pub mod data_structures;
pub mod guard;

pub use data_structures::bounded_ordered_set::BoundedOrderedSet;
pub use data_structures::deque::{ConcurrentDeque, DetachedNode, NodeHandle, Polled};
pub use data_structures::ordered_iterator::{Ordered, OrderedIterator, ordered_from_vec};
pub use data_structures::ordered_set::{ConcurrentOrderedSet, StdOrderedSet};
pub use guard::{DeferredGuard, DeferredRef, Guard};

/// Errors surfaced by the collections.
///
/// Structural repair (head/tail pointing at retired garbage) is performed
/// transparently and never reported; internal invariant violations panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A strict accessor was called on an empty deque.
    NoSuchElement,
    /// The operation is not supported by this collection.
    NotSupported,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NoSuchElement => write!(f, "collection is empty"),
            Error::NotSupported => write!(f, "operation is not supported"),
        }
    }
}

impl std::error::Error for Error {}

/// Result type for strict collection operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::NoSuchElement.to_string(), "collection is empty");
        assert_eq!(Error::NotSupported.to_string(), "operation is not supported");
    }
}
