//! Guard trait for memory reclamation strategies.
//!
//! Lock-free collections cannot free a node the moment it is unlinked:
//! concurrent traversals and iterators may still hold references to it.
//! The `Guard` trait abstracts over the reclamation strategy so the same
//! collection code runs under epoch-based reclamation in production and
//! under a free-on-drop guard in tests:
//!
//! ```text
//! ConcurrentDeque<T, G: Guard>
//!     │
//!     ├── ConcurrentDeque<T, EpochGuard>      (production, strand-crossbeam)
//!     └── ConcurrentDeque<T, DeferredGuard>   (testing)
//! ```
//!
//! A collection stores one shared guard instance and routes every retired
//! node through [`Guard::defer_destroy`]. Public operations pin a
//! [`Guard::ReadGuard`] for their whole duration, so any node observed
//! during the operation stays allocated until the pin is released.

mod deferred_guard;

use std::ops::Deref;

pub use deferred_guard::{DeferredGuard, DeferredRef};

/// A memory reclamation guard protecting concurrent access to nodes.
///
/// # Safety contract
///
/// Implementations must ensure:
/// 1. A node passed to `defer_destroy` is not freed while any thread holds a
///    `ReadGuard` pinned before the call.
/// 2. `GuardedRef` keeps the referenced data valid for its lifetime.
///
/// The guard stored inside a collection schedules deferred destruction;
/// thread pinning happens per operation via [`Guard::pin`], not when the
/// stored guard is created.
pub trait Guard: Sized + Default + Send + Sync {
    /// A reference protected by a guard of this type.
    ///
    /// Must deref to `T`; owns whatever protection mechanism it needs.
    type GuardedRef<'a, T: 'a>: Deref<Target = T>;

    /// An active guard that protects reads for its lifetime.
    ///
    /// For epoch-based guards this is a pinned epoch handle; for deferred
    /// guards it can be `()` since the collection's stored guard already
    /// protects every node.
    type ReadGuard: Sized;

    /// Pin an active read guard for the duration of one operation or
    /// iteration.
    fn pin() -> Self::ReadGuard;

    /// Schedule a node for deferred destruction.
    ///
    /// # Safety
    ///
    /// - `node` must be a valid pointer allocated by the collection.
    /// - `node` must be unreachable by any traversal that starts after this
    ///   call (threads already holding it are protected by their pins).
    /// - `dealloc` must be the matching deallocation function, and this must
    ///   be the only `defer_destroy` call for `node`.
    unsafe fn defer_destroy<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N));

    /// Create a guarded reference from a raw pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must point to data that remains valid for `'a` under this
    /// guard's protection scheme.
    unsafe fn make_ref<'a, T: 'a>(ptr: *const T) -> Self::GuardedRef<'a, T>;
}
