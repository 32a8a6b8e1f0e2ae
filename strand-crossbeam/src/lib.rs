//! Crossbeam-based implementations for strand collections.
//!
//! This crate provides the production-grade plumbing the core crate keeps
//! behind traits:
//!
//! - [`EpochGuard`], a [`strand_core::Guard`] implementation over
//!   crossbeam-epoch, giving the deque epoch-based memory reclamation.
//! - [`SkipListSet`], a [`strand_core::ConcurrentOrderedSet`] over
//!   crossbeam-skiplist, the base set the bounded ordered set composes over.
//!
//! # Usage
//!
//! ```ignore
//! use strand_core::{BoundedOrderedSet, ConcurrentDeque};
//! use strand_crossbeam::{EpochGuard, SkipListSet};
//!
//! let deque: ConcurrentDeque<i32, EpochGuard> = ConcurrentDeque::new();
//! deque.add_last(42);
//!
//! let set: BoundedOrderedSet<i32, SkipListSet<i32>> = BoundedOrderedSet::new(100);
//! set.insert(7);
//! ```

pub mod epoch_guard;
pub mod skiplist_set;

pub use epoch_guard::{EpochGuard, EpochRef};
pub use skiplist_set::SkipListSet;
