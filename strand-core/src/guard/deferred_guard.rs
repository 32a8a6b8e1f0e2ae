//! Deferred guard implementation for testing.
//!
//! `DeferredGuard` postpones all node destruction until the guard itself is
//! dropped, which for a collection-owned guard means until the collection is
//! dropped. References handed out during the collection's lifetime can never
//! dangle, which makes it the guard of choice for stress tests.

use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Mutex;

use super::Guard;

/// A guard that defers all node destruction until it is dropped.
///
/// Not suitable for long-running production use: retired nodes accumulate
/// until the owning collection drops. Use the epoch-based guard from
/// `strand-crossbeam` there.
///
/// Debug builds track retired addresses and panic on a duplicate
/// `defer_destroy`, which catches double-retire bugs in the collections.
pub struct DeferredGuard {
    retired: Mutex<Vec<Retired>>,
    #[cfg(debug_assertions)]
    seen: Mutex<HashSet<usize>>,
}

struct Retired {
    node: *mut (),
    release: unsafe fn(*mut ()),
}

// Safety: only an address and its release function are stored, and all
// access goes through the Mutex.
unsafe impl Send for Retired {}

impl DeferredGuard {
    pub fn new() -> Self {
        DeferredGuard {
            retired: Mutex::new(Vec::new()),
            #[cfg(debug_assertions)]
            seen: Mutex::new(HashSet::new()),
        }
    }
}

impl Default for DeferredGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeferredGuard {
    fn drop(&mut self) {
        let retired = self.retired.get_mut().unwrap();

        let mut addresses: HashSet<usize> = HashSet::with_capacity(retired.len());
        for entry in retired.iter() {
            assert!(
                addresses.insert(entry.node as usize),
                "node {:#x} was retired twice",
                entry.node as usize
            );
        }

        for entry in retired.drain(..) {
            unsafe {
                (entry.release)(entry.node);
            }
        }
    }
}

/// A reference wrapper for `DeferredGuard`.
///
/// Destruction is deferred until the guard drops, so the plain reference is
/// valid for as long as the collection lives.
pub struct DeferredRef<'a, T> {
    value: &'a T,
}

impl<'a, T> DeferredRef<'a, T> {
    pub fn new(value: &'a T) -> Self {
        DeferredRef { value }
    }
}

impl<T> Deref for DeferredRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value
    }
}

impl Guard for DeferredGuard {
    type GuardedRef<'a, T: 'a> = DeferredRef<'a, T>;

    /// No-op: the collection's stored guard protects every node already.
    type ReadGuard = ();

    fn pin() -> Self::ReadGuard {}

    unsafe fn defer_destroy<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N)) {
        #[cfg(debug_assertions)]
        {
            let mut seen = self.seen.lock().unwrap();
            assert!(
                seen.insert(node as usize),
                "duplicate defer_destroy at {:#x}",
                node as usize
            );
        }

        // The deallocator only cares about the address; erase the node type
        // so one list can hold every kind of retirement.
        let entry = Retired {
            node: node as *mut (),
            release: unsafe {
                std::mem::transmute::<unsafe fn(*mut N), unsafe fn(*mut ())>(dealloc)
            },
        };
        self.retired.lock().unwrap().push(entry);
    }

    unsafe fn make_ref<'a, T: 'a>(ptr: *const T) -> Self::GuardedRef<'a, T> {
        // Safety: caller guarantees ptr is valid for 'a.
        DeferredRef::new(unsafe { &*ptr })
    }
}
