// Event-based element counter.
//
// Tracks logical insert/remove events rather than a traversal count, so the
// value is exact after all mutators quiesce and approximate while they run.
// Each decrement's matching increment precedes it in every interleaving, so
// the count never goes negative.

use std::sync::atomic::{AtomicI64, Ordering};

pub(crate) struct AtomicCount {
    count: AtomicI64,
}

impl AtomicCount {
    #[inline]
    pub(crate) fn new() -> Self {
        AtomicCount {
            count: AtomicI64::new(0),
        }
    }

    #[inline]
    pub(crate) fn get(&self) -> i64 {
        self.count.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn increment(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub(crate) fn decrement(&self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }

    #[inline]
    pub(crate) fn add(&self, n: i64) {
        self.count.fetch_add(n, Ordering::AcqRel);
    }

    /// CAS the counter (AcqRel on success, Acquire on failure).
    #[inline]
    pub(crate) fn compare_exchange(&self, current: i64, new: i64) -> Result<i64, i64> {
        self.count
            .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
    }
}

impl Default for AtomicCount {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_events() {
        let count = AtomicCount::new();
        assert_eq!(count.get(), 0);

        count.increment();
        count.increment();
        count.add(3);
        assert_eq!(count.get(), 5);

        count.decrement();
        assert_eq!(count.get(), 4);
    }

    #[test]
    fn test_compare_exchange() {
        let count = AtomicCount::new();
        count.add(10);

        assert_eq!(count.compare_exchange(10, 9), Ok(10));
        assert_eq!(count.get(), 9);
        assert_eq!(count.compare_exchange(10, 8), Err(9));
    }
}
