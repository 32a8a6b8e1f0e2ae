//! Concurrent ordered set over crossbeam-skiplist.
//!
//! The skip map's `compare_insert` decides membership atomically, but does
//! not report whether the call inserted or found an existing entry. Each
//! insertion therefore carries a process-unique ticket as its value: after
//! the call, the winning entry's ticket tells whose insertion stuck.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;

use crossbeam_skiplist::SkipMap;
use strand_core::data_structures::ordered_set::ConcurrentOrderedSet;

/// Source of process-unique insertion tickets.
static TICKET: AtomicU64 = AtomicU64::new(0);

/// Lock-free sorted set backed by `crossbeam_skiplist::SkipMap`.
///
/// The production base set for
/// [`BoundedOrderedSet`](strand_core::BoundedOrderedSet): duplicate-detecting
/// insertion, smallest-first removal and ascending iteration, all lock-free.
pub struct SkipListSet<T: Ord> {
    map: SkipMap<T, u64>,
}

impl<T: Ord> SkipListSet<T> {
    pub fn new() -> Self {
        SkipListSet {
            map: SkipMap::new(),
        }
    }
}

impl<T: Ord> Default for SkipListSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ConcurrentOrderedSet<T> for SkipListSet<T>
where
    T: Ord + Send + Sync + 'static,
{
    fn add(&self, value: T) -> bool {
        let ticket = TICKET.fetch_add(1, Relaxed) + 1;
        // Never replace an existing entry; the returned entry is either ours
        // (fresh insert) or the one that was already present.
        let entry = self.map.compare_insert(value, ticket, |_| false);
        *entry.value() == ticket
    }

    fn remove_first(&self) -> bool {
        self.map.pop_front().is_some()
    }

    fn first(&self) -> Option<T>
    where
        T: Clone,
    {
        self.map.front().map(|entry| entry.key().clone())
    }

    fn contains(&self, value: &T) -> bool {
        self.map.contains_key(value)
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.map.iter().map(|entry| entry.key().clone()).collect()
    }
}
