//! Concurrent ordered set that manages its own maximum size.
//!
//! Once the set exceeds its bound it evicts smallest elements until the
//! count returns to the bound. Due to the concurrent nature of the set it may
//! transiently grow slightly past the bound, but every overshoot triggers a
//! corrective eviction, so it readjusts quickly and is exactly bounded after
//! mutators quiesce.
//!
//! Removal by value is not supported on this kind of set; eviction order is
//! the only removal path.

use crate::data_structures::ordered_set::ConcurrentOrderedSet;
use crate::data_structures::AtomicCount;
use crate::{Error, Result};

/// A concurrent sorted set with a soft upper bound on cardinality.
///
/// Composes over any [`ConcurrentOrderedSet`]; insertion always succeeds and
/// then evicts the smallest element(s) while the count exceeds the bound.
/// `len` reads an O(1) counter instead of traversing, in contrast to the
/// underlying set.
///
/// ```ignore
/// use strand_core::{BoundedOrderedSet, StdOrderedSet};
///
/// let set: BoundedOrderedSet<i32, StdOrderedSet<i32>> = BoundedOrderedSet::new(3);
/// for v in [5, 1, 4, 2, 3] {
///     set.insert(v);
/// }
/// assert_eq!(set.to_vec(), vec![3, 4, 5]);
/// ```
pub struct BoundedOrderedSet<T: Ord, S: ConcurrentOrderedSet<T>> {
    set: S,
    max: usize,
    cnt: AtomicCount,
    _marker: std::marker::PhantomData<T>,
}

impl<T, S> BoundedOrderedSet<T, S>
where
    T: Ord,
    S: ConcurrentOrderedSet<T>,
{
    /// An empty bounded set over a default-constructed base set.
    ///
    /// # Panics
    /// Panics when `max` is zero.
    pub fn new(max: usize) -> Self
    where
        S: Default,
    {
        Self::with_set(max, S::default())
    }

    /// An empty bounded set over a caller-supplied base set, which chooses
    /// the element order and thereby the eviction direction.
    ///
    /// # Panics
    /// Panics when `max` is zero or the supplied set is non-empty.
    pub fn with_set(max: usize, set: S) -> Self {
        assert!(max > 0, "bound must be strictly positive");
        assert!(set.is_empty(), "base set must start empty");

        BoundedOrderedSet {
            set,
            max,
            cnt: AtomicCount::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// A bounded set initially containing `elements`, inserted one by one so
    /// the bound already holds for the initial contents.
    ///
    /// # Panics
    /// Panics when `max` is zero.
    pub fn with_elements<I>(max: usize, elements: I) -> Self
    where
        S: Default,
        I: IntoIterator<Item = T>,
    {
        let set = Self::new(max);
        for e in elements {
            set.insert(e);
        }
        set
    }

    /// Inserts `value`. Returns `false` without side effects when an equal
    /// element is already present.
    ///
    /// On success the count goes up first and is CASed back down before each
    /// eviction, so concurrent inserters observe the corrected bound as early
    /// as possible.
    pub fn insert(&self, value: T) -> bool {
        if !self.set.add(value) {
            return false;
        }

        self.cnt.increment();

        loop {
            let c = self.cnt.get();
            if c <= self.max as i64 {
                break;
            }
            if self.cnt.compare_exchange(c, c - 1).is_ok() {
                // Evict exactly one element for this decrement. A failed
                // removal means another remover raced us to the same smallest
                // element; keep trying until one removal sticks. The set
                // running dry here would mean eviction outran insertion,
                // which the counter protocol rules out.
                loop {
                    if self.set.remove_first() {
                        break;
                    }
                    debug_assert!(
                        !self.set.is_empty(),
                        "bounded set ran dry during eviction"
                    );
                    std::hint::spin_loop();
                }
            }
        }

        true
    }

    /// Approximate size at this point in time, in constant time. Exact once
    /// all mutators quiesce.
    pub fn len(&self) -> usize {
        self.cnt.get().max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The configured upper bound.
    pub fn capacity(&self) -> usize {
        self.max
    }

    /// The smallest element currently present.
    pub fn first(&self) -> Option<T>
    where
        T: Clone,
    {
        self.set.first()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.set.contains(value)
    }

    /// All elements in ascending order. Not atomic under concurrency.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.set.to_vec()
    }

    /// Removal by value is not supported on the bounded set.
    pub fn remove(&self, _value: &T) -> Result<bool> {
        Err(Error::NotSupported)
    }
}
