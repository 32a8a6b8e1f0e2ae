//! The concurrent ordered-set seam the bounded set composes over.
//!
//! [`BoundedOrderedSet`](super::bounded_ordered_set::BoundedOrderedSet) needs
//! three things from its base set: duplicate-detecting insertion, removal of
//! the smallest element, and a view of the smallest element. Any concurrent
//! sorted-set primitive that can provide those atomically fits behind this
//! trait:
//!
//! ```text
//! BoundedOrderedSet<T, S: ConcurrentOrderedSet<T>>
//!     │
//!     ├── BoundedOrderedSet<T, SkipListSet<T>>  (production, strand-crossbeam)
//!     └── BoundedOrderedSet<T, StdOrderedSet<T>> (reference/testing)
//! ```

use std::collections::BTreeSet;
use std::sync::Mutex;

/// A concurrent set with a total order over its elements.
///
/// # Contract
///
/// - `add` returns `false` for a duplicate and must decide membership
///   atomically: two racing `add`s of equal elements see exactly one `true`.
/// - `remove_first` removes the smallest element; `false` only when the set
///   was observed empty.
/// - Iteration (`to_vec`) yields ascending order.
pub trait ConcurrentOrderedSet<T: Ord>: Send + Sync {
    /// Insert a value. Returns `true` if the set did not already contain it.
    fn add(&self, value: T) -> bool;

    /// Remove the smallest element. Returns `false` if the set was empty.
    fn remove_first(&self) -> bool;

    /// The smallest element at some point during the call.
    fn first(&self) -> Option<T>
    where
        T: Clone;

    /// Membership test.
    fn contains(&self, value: &T) -> bool;

    /// Number of elements (may traverse).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All elements in ascending order.
    fn to_vec(&self) -> Vec<T>
    where
        T: Clone;
}

/// Reference implementation backed by a mutexed `BTreeSet`.
///
/// Trivially correct, not lock-free. Used to exercise the bounded set in
/// tests the same way `DeferredGuard` exercises the deque; production code
/// should use the skip-list set from `strand-crossbeam`.
pub struct StdOrderedSet<T: Ord> {
    inner: Mutex<BTreeSet<T>>,
}

impl<T: Ord> StdOrderedSet<T> {
    pub fn new() -> Self {
        StdOrderedSet {
            inner: Mutex::new(BTreeSet::new()),
        }
    }
}

impl<T: Ord> Default for StdOrderedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Send + Sync> ConcurrentOrderedSet<T> for StdOrderedSet<T> {
    fn add(&self, value: T) -> bool {
        self.inner.lock().unwrap().insert(value)
    }

    fn remove_first(&self) -> bool {
        self.inner.lock().unwrap().pop_first().is_some()
    }

    fn first(&self) -> Option<T>
    where
        T: Clone,
    {
        self.inner.lock().unwrap().first().cloned()
    }

    fn contains(&self, value: &T) -> bool {
        self.inner.lock().unwrap().contains(value)
    }

    fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.inner.lock().unwrap().iter().cloned().collect()
    }
}
