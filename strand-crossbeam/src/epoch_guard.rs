//! Epoch-based guard implementation using crossbeam-epoch.
//!
//! # Design
//!
//! `EpochGuard` is a zero-sized type that schedules destruction through the
//! global epoch collector. A deque parameterized with it reclaims retired
//! nodes once every thread has moved past the epoch in which they were
//! retired:
//!
//! ```text
//! ConcurrentDeque<i32, EpochGuard>
//!     │
//!     └── node retirement goes through crossbeam-epoch
//! ```
//!
//! Every public deque operation pins the current thread for its duration, so
//! a traversal that already holds a node keeps it alive; a node handed to
//! `defer_destroy` is freed only after all pins from before the call are
//! released.

use crossbeam_epoch::{self as epoch, Guard as CrossbeamGuard};
use std::ops::Deref;
use strand_core::guard::Guard;

/// Epoch-based memory reclamation guard.
///
/// Stateless: the instance stored inside a collection carries no data, and
/// all bookkeeping lives in the global epoch collector. That keeps
/// collections `Send + Sync` without extra synchronization.
///
/// Reclamation is batched and amortized O(1) per node; memory can accumulate
/// while long-running operations stay pinned.
#[derive(Clone, Copy, Default)]
pub struct EpochGuard;

impl EpochGuard {
    pub fn new() -> Self {
        EpochGuard
    }
}

/// A reference kept valid by a pinned epoch.
///
/// Bundles the pin with the reference so the referent cannot be reclaimed
/// while the `EpochRef` is alive.
pub struct EpochRef<'a, T> {
    _pin: CrossbeamGuard,
    referent: &'a T,
}

impl<'a, T> EpochRef<'a, T> {
    /// # Safety
    ///
    /// `referent` must stay valid while `pin` stays active.
    pub(crate) unsafe fn new(pin: CrossbeamGuard, referent: &'a T) -> Self {
        EpochRef {
            _pin: pin,
            referent,
        }
    }
}

impl<T> Deref for EpochRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.referent
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for EpochRef<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EpochRef({:?})", self.referent)
    }
}

unsafe impl<T: Send> Send for EpochRef<'_, T> {}
unsafe impl<T: Sync> Sync for EpochRef<'_, T> {}

impl Guard for EpochGuard {
    type GuardedRef<'a, T: 'a> = EpochRef<'a, T>;

    /// An actual crossbeam pin protecting reads for its lifetime.
    type ReadGuard = CrossbeamGuard;

    fn pin() -> Self::ReadGuard {
        epoch::pin()
    }

    unsafe fn defer_destroy<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N)) {
        // Pin, schedule, unpin: the deallocation runs once every thread has
        // advanced past the current epoch.
        let guard = epoch::pin();
        unsafe {
            guard.defer_unchecked(move || {
                dealloc(node);
            });
        }
    }

    unsafe fn make_ref<'a, T: 'a>(ptr: *const T) -> Self::GuardedRef<'a, T> {
        let guard = epoch::pin();
        unsafe { EpochRef::new(guard, &*ptr) }
    }
}
