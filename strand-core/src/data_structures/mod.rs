//! Data structures for concurrent collections.
//!
//! # Organization
//!
//! - [`deque`] - Lock-free doubly-ended queue
//! - [`bounded_ordered_set`] - Concurrent ordered set with a soft size bound
//! - [`ordered_set`] - The ordered-set trait the bounded set composes over
//! - [`internal`] - Internal implementation details (pub(crate))
//!
//! Collections are generic over a guard type `G: Guard`:
//!
//! ```ignore
//! use strand_core::{ConcurrentDeque, DeferredGuard};
//!
//! let deque: ConcurrentDeque<i32, DeferredGuard> = ConcurrentDeque::new();
//! deque.add_last(42);
//! ```

pub mod bounded_ordered_set;
pub mod deque;
pub(crate) mod internal;
pub mod ordered_iterator;
pub mod ordered_set;

pub use bounded_ordered_set::BoundedOrderedSet;
pub use deque::{ConcurrentDeque, DetachedNode, NodeHandle, Polled};
pub use ordered_iterator::{Ordered, OrderedIterator, ordered_from_vec};
pub use ordered_set::{ConcurrentOrderedSet, StdOrderedSet};

pub(crate) use internal::AtomicCount;
