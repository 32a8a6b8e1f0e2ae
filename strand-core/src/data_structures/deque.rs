use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ptr::{self, null_mut};
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};
use std::sync::atomic::{AtomicBool, AtomicPtr};

use crate::data_structures::AtomicCount;
use crate::guard::Guard;
use crate::{Error, Result};

type NodePtr<T> = *mut Node<T>;

// =============================================================================
// CONCURRENT DEQUE INVARIANTS & NODE LIFECYCLE
// =============================================================================
//
// An unbounded lock-free deque over a symmetrical doubly-linked list. Interior
// removes are supported, interior inserts are not.
//
// List structure:
//
//   head ──► ... ─prev─► [first] ◄──next/prev──► [x] ◄──► [last] ◄─next─ ... ◄── tail
//
// A node holds three atomically accessed fields (prev, item, next) plus a
// one-shot reclamation flag. A node is "live" while item != null. CASing item
// to null logically deletes the element; the item slot never becomes non-null
// again.
//
// At any time there is exactly one "first" node (prev == null && next != self)
// terminating prev chains from live nodes, and one "last" node symmetric to
// it. First and last may themselves be deleted. A node is "active" if it is
// live or is the first/last node. Active nodes are never unlinked.
//
// head and tail are approximations: the first node is always O(1) reachable
// from head via prev links, likewise last from tail via next links. head and
// tail may lag behind and may reference deleted (even unlinked) nodes, but
// never self-linked ones.
//
// A "self-link" (p.prev == p or p.next == p) marks a node taken off the list
// at that end. Two per-deque terminator nodes play the same role for the
// outermost positions: prev_terminator (next == self) and next_terminator
// (prev == self). Terminators are never live and never enter an active chain.
//
// Deletion proceeds in three stages:
//
//   1. Logical deletion: the item CAS removes the element. This is the
//      linearization point of poll/remove operations.
//   2. Unlinking: the unique active predecessor and successor are located and
//      their links are fixed up to point at each other, making the node
//      unreachable from active nodes. Pure optimization; any thread may help.
//   3. Unlink for reclamation: once the node's neighborhood is confirmed
//      bypassed in both directions and head/tail have been repaired past it,
//      its own links are replaced with self/terminator approximations and the
//      node is handed to the guard. The flag makes the handoff exactly-once.
//
// INVARIANTS:
// 1. The first active node is unique; symmetric for the last.
// 2. Live nodes reachable via next from the first equal those reachable via
//    prev from the last.
// 3. item never transitions from null back to non-null.
// 4. head and tail are never self-linked.
// 5. Terminators never appear inside an active chain.
//
// MEMORY RECLAMATION:
// The original formulation of this structure leans on a tracing collector.
// Here every public operation pins the collection's guard for its whole
// duration, so any node observed during a traversal outlives the traversal.
// Nodes are retired to the guard only after stage 3, when no traversal
// starting afterwards can reach them. A node that loses its stage-3 validation
// race stays linked or waits for the final sweep in Drop; under sustained
// contention a small number of nodes may only be reclaimed when the guard
// drops. That trade (bounded retention over use-after-free) is deliberate.
//
// Single-element end operations are linearizable. Combinations are not:
// an add_first racing a poll_first removing a different element admits
// histories no sequential deque produces. Iterators are weakly consistent.
// =============================================================================

/// Number of dead-node hops tolerated before an interior unlink bothers
/// squeezing out garbage next to an end.
const HOPS: usize = 2;

struct Node<T> {
    prev: AtomicPtr<Node<T>>,
    item: AtomicPtr<T>,
    next: AtomicPtr<Node<T>>,
    /// One-shot claim deciding who (guard or Drop) releases this node.
    reclaimed: AtomicBool,
}

impl<T> Node<T> {
    /// A node carrying an element. The item slot is written without ordering;
    /// the node is only published by the link CAS, which carries the release.
    fn new(item: T) -> Self {
        Node {
            prev: AtomicPtr::new(null_mut()),
            item: AtomicPtr::new(Box::into_raw(Box::new(item))),
            next: AtomicPtr::new(null_mut()),
            reclaimed: AtomicBool::new(false),
        }
    }

    /// An empty node: the initial head/tail dummy and the terminators.
    fn empty() -> Self {
        Node {
            prev: AtomicPtr::new(null_mut()),
            item: AtomicPtr::new(null_mut()),
            next: AtomicPtr::new(null_mut()),
            reclaimed: AtomicBool::new(false),
        }
    }

    #[inline]
    fn get_item(&self) -> *mut T {
        self.item.load(Acquire)
    }

    #[inline]
    fn is_live(&self) -> bool {
        !self.get_item().is_null()
    }

    #[inline]
    fn cas_item(&self, expected: *mut T, new: *mut T) -> bool {
        self.item
            .compare_exchange(expected, new, AcqRel, Acquire)
            .is_ok()
    }

    #[inline]
    fn get_prev(&self) -> NodePtr<T> {
        self.prev.load(Acquire)
    }

    #[inline]
    fn get_next(&self) -> NodePtr<T> {
        self.next.load(Acquire)
    }

    /// Release store, used for link publication and self-link wiring.
    #[inline]
    fn set_prev(&self, ptr: NodePtr<T>) {
        self.prev.store(ptr, Release);
    }

    #[inline]
    fn set_next(&self, ptr: NodePtr<T>) {
        self.next.store(ptr, Release);
    }

    #[inline]
    fn cas_prev(&self, expected: NodePtr<T>, new: NodePtr<T>) -> bool {
        self.prev
            .compare_exchange(expected, new, AcqRel, Acquire)
            .is_ok()
    }

    #[inline]
    fn cas_next(&self, expected: NodePtr<T>, new: NodePtr<T>) -> bool {
        self.next
            .compare_exchange(expected, new, AcqRel, Acquire)
            .is_ok()
    }

    /// First caller wins the right to release this node.
    #[inline]
    fn claim(&self) -> bool {
        !self.reclaimed.swap(true, AcqRel)
    }
}

/// Releases a node whose element slot has already been emptied or taken.
///
/// # Safety
/// `ptr` must come from `Box::into_raw` and must not be accessed afterwards.
unsafe fn dealloc_node<T>(ptr: *mut Node<T>) {
    unsafe { drop(Box::from_raw(ptr)) };
}

/// Drops a logically deleted element together with its allocation.
///
/// # Safety
/// `ptr` must come from `Box::into_raw` and the value must still be intact.
unsafe fn dealloc_item<T>(ptr: *mut T) {
    unsafe { drop(Box::from_raw(ptr)) };
}

/// Frees an element allocation whose value was moved out by `ptr::read`.
///
/// # Safety
/// `ptr` must come from `Box::into_raw` and the value must already have been
/// taken; only the storage is released here.
unsafe fn dealloc_item_shell<T>(ptr: *mut T) {
    unsafe { drop(Box::from_raw(ptr as *mut ManuallyDrop<T>)) };
}

/// Handle to a linked node, returned by the `*_x` insertion variants.
///
/// Lets the creator remove that exact element later in O(1) via
/// [`ConcurrentDeque::unlink`], regardless of where the node has drifted.
/// A handle is only meaningful for the deque that produced it.
pub struct NodeHandle<T> {
    node: NodePtr<T>,
    _marker: PhantomData<*mut T>,
}

impl<T> NodeHandle<T> {
    fn new(node: NodePtr<T>) -> Self {
        NodeHandle {
            node,
            _marker: PhantomData,
        }
    }
}

impl<T> Copy for NodeHandle<T> {}

impl<T> Clone for NodeHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> std::fmt::Debug for NodeHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeHandle({:p})", self.node)
    }
}

// Safety: a handle is an opaque address; all access to the node goes through
// the deque, which pins its guard first.
unsafe impl<T: Send> Send for NodeHandle<T> {}
unsafe impl<T: Send + Sync> Sync for NodeHandle<T> {}

/// A preconstructed, unlinked node for the node-accepting insertion variants.
///
/// Dropping a detached node that was never linked releases it and its element.
pub struct DetachedNode<T> {
    node: NodePtr<T>,
}

impl<T> DetachedNode<T> {
    pub fn new(item: T) -> Self {
        DetachedNode {
            node: Box::into_raw(Box::new(Node::new(item))),
        }
    }

    fn into_raw(self) -> NodePtr<T> {
        let node = self.node;
        std::mem::forget(self);
        node
    }
}

impl<T> Drop for DetachedNode<T> {
    fn drop(&mut self) {
        unsafe {
            let item = (*self.node).item.load(Relaxed);
            if !item.is_null() {
                dealloc_item(item);
            }
            dealloc_node(self.node);
        }
    }
}

unsafe impl<T: Send> Send for DetachedNode<T> {}

/// Element plus node handle returned by [`ConcurrentDeque::poll_first_x`].
pub struct Polled<T> {
    pub item: T,
    pub node: NodeHandle<T>,
}

/// An unbounded lock-free doubly-ended queue.
///
/// Supports insertion and removal at both ends, O(1) targeted removal through
/// node handles, weakly consistent iteration in both directions, and bulk
/// append. All operations take `&self` and are safe to call from any number
/// of threads; none of them block.
///
/// `len` is a traversal, not a constant-time read; use [`len_approx`] for the
/// O(1) event-based count. Bulk operations (`add_all`, `to_vec`, `contains`)
/// are not atomic with respect to concurrent mutation.
///
/// The guard parameter selects the memory reclamation strategy, e.g.
/// `DeferredGuard` for tests or the epoch guard from `strand-crossbeam`.
///
/// [`len_approx`]: ConcurrentDeque::len_approx
pub struct ConcurrentDeque<T, G: Guard> {
    head: AtomicPtr<Node<T>>,
    tail: AtomicPtr<Node<T>>,
    size: AtomicCount,
    prev_term: NodePtr<T>,
    next_term: NodePtr<T>,
    /// Shared guard instance; all retired nodes and items are deferred here.
    guard: G,
}

// Safety: the deque hands out element values (Send) and clones (Sync needs
// &T access from several threads); nodes are only freed through the guard.
unsafe impl<T: Send, G: Guard> Send for ConcurrentDeque<T, G> {}
unsafe impl<T: Send + Sync, G: Guard> Sync for ConcurrentDeque<T, G> {}

impl<T, G: Guard> ConcurrentDeque<T, G> {
    pub fn new() -> Self {
        // A single empty dummy keeps the first/last invariants satisfied
        // before any element arrives.
        let dummy = Box::into_raw(Box::new(Node::empty()));
        Self::with_head_tail(dummy, dummy, 0)
    }

    /// Builds a deque from the elements of `iter`, in iteration order.
    pub fn with_elements<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut h: NodePtr<T> = null_mut();
        let mut t: NodePtr<T> = null_mut();
        let mut count = 0i64;

        for item in iter {
            let node = Box::into_raw(Box::new(Node::new(item)));
            if h.is_null() {
                h = node;
                t = node;
            } else {
                unsafe {
                    (*t).set_next(node);
                    (*node).set_prev(t);
                }
                t = node;
            }
            count += 1;
        }

        if h.is_null() {
            let dummy = Box::into_raw(Box::new(Node::empty()));
            h = dummy;
            t = dummy;
        } else if h == t {
            // A lone node with a non-null item would be both first and last;
            // pad with an empty node to keep the end detection simple.
            let dummy = Box::into_raw(Box::new(Node::empty()));
            unsafe {
                (*t).set_next(dummy);
                (*dummy).set_prev(t);
            }
            t = dummy;
        }

        Self::with_head_tail(h, t, count)
    }

    fn with_head_tail(h: NodePtr<T>, t: NodePtr<T>, count: i64) -> Self {
        let prev_term = Box::into_raw(Box::new(Node::empty()));
        let next_term = Box::into_raw(Box::new(Node::empty()));
        unsafe {
            // Terminator wiring happens exactly once, before the deque is
            // visible to any other thread.
            (*prev_term).next.store(prev_term, Relaxed);
            (*next_term).prev.store(next_term, Relaxed);
        }

        let size = AtomicCount::new();
        size.add(count);

        ConcurrentDeque {
            head: AtomicPtr::new(h),
            tail: AtomicPtr::new(t),
            size,
            prev_term,
            next_term,
            guard: G::default(),
        }
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Inserts `item` at the front of the deque.
    pub fn add_first(&self, item: T) {
        let _pin = G::pin();
        let node = Box::into_raw(Box::new(Node::new(item)));
        unsafe { self.link_first(node) };
    }

    /// Inserts `item` at the back of the deque.
    pub fn add_last(&self, item: T) {
        let _pin = G::pin();
        let node = Box::into_raw(Box::new(Node::new(item)));
        unsafe { self.link_last(node) };
    }

    /// Like [`add_first`](Self::add_first); always returns `true`, since the
    /// deque is unbounded.
    pub fn offer_first(&self, item: T) -> bool {
        self.add_first(item);
        true
    }

    /// Like [`add_last`](Self::add_last); always returns `true`.
    pub fn offer_last(&self, item: T) -> bool {
        self.add_last(item);
        true
    }

    /// Inserts at the front and returns a handle to the freshly linked node.
    pub fn add_first_x(&self, item: T) -> NodeHandle<T> {
        let _pin = G::pin();
        let node = Box::into_raw(Box::new(Node::new(item)));
        unsafe { self.link_first(node) };
        NodeHandle::new(node)
    }

    /// Inserts at the back and returns a handle to the freshly linked node.
    pub fn add_last_x(&self, item: T) -> NodeHandle<T> {
        let _pin = G::pin();
        let node = Box::into_raw(Box::new(Node::new(item)));
        unsafe { self.link_last(node) };
        NodeHandle::new(node)
    }

    /// Handle-returning offer; identical to [`add_first_x`](Self::add_first_x).
    pub fn offer_first_x(&self, item: T) -> NodeHandle<T> {
        self.add_first_x(item)
    }

    /// Handle-returning offer; identical to [`add_last_x`](Self::add_last_x).
    pub fn offer_last_x(&self, item: T) -> NodeHandle<T> {
        self.add_last_x(item)
    }

    /// Links a preconstructed node at the back of the deque.
    pub fn add_last_node(&self, node: DetachedNode<T>) -> NodeHandle<T> {
        let _pin = G::pin();
        let raw = node.into_raw();
        unsafe { self.link_last(raw) };
        NodeHandle::new(raw)
    }

    /// Node-accepting offer; always returns `true`.
    pub fn offer_last_node(&self, node: DetachedNode<T>) -> bool {
        self.add_last_node(node);
        true
    }

    /// Stack view: inserts at the front.
    pub fn push(&self, item: T) {
        self.add_first(item);
    }

    /// Appends every element of `elements` at the back.
    ///
    /// The new elements are linked into a private chain first and spliced in
    /// with a single CAS, so the whole batch becomes visible atomically and
    /// the cost stays O(batch) under contention. Returns `true` if at least
    /// one element was appended.
    pub fn add_all<I: IntoIterator<Item = T>>(&self, elements: I) -> bool {
        let mut beginning: NodePtr<T> = null_mut();
        let mut last: NodePtr<T> = null_mut();
        let mut count = 0i64;

        for item in elements {
            let node = Box::into_raw(Box::new(Node::new(item)));
            if beginning.is_null() {
                beginning = node;
            } else {
                unsafe {
                    (*last).set_next(node);
                    (*node).set_prev(last);
                }
            }
            last = node;
            count += 1;
        }

        if beginning.is_null() {
            return false;
        }

        self.size.add(count);

        let _pin = G::pin();
        unsafe {
            'restart_from_tail: loop {
                let mut t = self.tail.load(Acquire);
                let mut p = t;
                loop {
                    let mut q = (*p).get_next();
                    let advanced_twice = if !q.is_null() {
                        p = q;
                        q = (*p).get_next();
                        !q.is_null()
                    } else {
                        false
                    };

                    if advanced_twice {
                        // Check for tail updates every other hop.
                        let t2 = self.tail.load(Acquire);
                        p = if t != t2 {
                            t = t2;
                            t
                        } else {
                            q
                        };
                        continue;
                    }
                    if (*p).get_prev() == p {
                        continue 'restart_from_tail;
                    }

                    // p is the last node.
                    (*beginning).set_prev(p);

                    if (*p).cas_next(null_mut(), beginning) {
                        // This CAS is the linearization point for the batch.
                        if self
                            .tail
                            .compare_exchange(t, last, AcqRel, Acquire)
                            .is_err()
                        {
                            // Worth a second attempt when splicing many nodes.
                            let t2 = self.tail.load(Acquire);
                            if (*last).get_next().is_null() {
                                let _ = self.tail.compare_exchange(t2, last, AcqRel, Acquire);
                            }
                        }
                        return true;
                    }
                    // Lost the race; re-read next.
                }
            }
        }
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// First present element, if any.
    pub fn peek_first(&self) -> Option<T>
    where
        T: Clone,
    {
        let _pin = G::pin();
        unsafe {
            let mut p = self.first_node();
            while !p.is_null() {
                let item = (*p).get_item();
                if !item.is_null() {
                    return Some((*item).clone());
                }
                p = self.successor(p);
            }
            None
        }
    }

    /// Last present element, if any.
    pub fn peek_last(&self) -> Option<T>
    where
        T: Clone,
    {
        let _pin = G::pin();
        unsafe {
            let mut p = self.last_node();
            while !p.is_null() {
                let item = (*p).get_item();
                if !item.is_null() {
                    return Some((*item).clone());
                }
                p = self.predecessor(p);
            }
            None
        }
    }

    /// Strict [`peek_first`](Self::peek_first).
    pub fn get_first(&self) -> Result<T>
    where
        T: Clone,
    {
        self.peek_first().ok_or(Error::NoSuchElement)
    }

    /// Strict [`peek_last`](Self::peek_last).
    pub fn get_last(&self) -> Result<T>
    where
        T: Clone,
    {
        self.peek_last().ok_or(Error::NoSuchElement)
    }

    /// Whether an element equal to `item` is currently present.
    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let _pin = G::pin();
        unsafe {
            let mut p = self.first_node();
            while !p.is_null() {
                let it = (*p).get_item();
                if !it.is_null() && *it == *item {
                    return true;
                }
                p = self.successor(p);
            }
            false
        }
    }

    /// `true` when no element is present, judged by an end traversal.
    pub fn is_empty(&self) -> bool {
        let _pin = G::pin();
        unsafe {
            let mut p = self.first_node();
            while !p.is_null() {
                if (*p).is_live() {
                    return false;
                }
                p = self.successor(p);
            }
            true
        }
    }

    /// Counter-based emptiness check, O(1) but approximate while mutators run.
    pub fn is_empty_approx(&self) -> bool {
        self.len_approx() == 0
    }

    /// Number of present elements, counted by traversal and saturated at
    /// `i32::MAX`. Not a constant-time operation.
    pub fn len(&self) -> usize {
        let _pin = G::pin();
        let mut count: usize = 0;
        unsafe {
            let mut p = self.first_node();
            while !p.is_null() {
                if (*p).is_live() {
                    count += 1;
                    if count == i32::MAX as usize {
                        break;
                    }
                }
                p = self.successor(p);
            }
        }
        count
    }

    /// Event-based element count in O(1). Exact once all mutators quiesce.
    pub fn len_approx(&self) -> usize {
        self.size.get().max(0) as usize
    }

    /// All present elements, first to last. Not atomic under concurrency.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        let _pin = G::pin();
        let mut out = Vec::new();
        unsafe {
            let mut p = self.first_node();
            while !p.is_null() {
                let item = (*p).get_item();
                if !item.is_null() {
                    out.push((*item).clone());
                }
                p = self.successor(p);
            }
        }
        out
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Removes and returns the first element, or `None` when empty.
    pub fn poll_first(&self) -> Option<T> {
        let _pin = G::pin();
        unsafe {
            let mut p = self.first_node();
            while !p.is_null() {
                let item = (*p).get_item();
                if !item.is_null() && (*p).cas_item(item, null_mut()) {
                    // The item CAS is the linearization point; the winner owns
                    // the value and leaves only the shell to the guard.
                    let value = ptr::read(item);
                    self.guard.defer_destroy(item, dealloc_item_shell::<T>);
                    self.unlink_node(p);
                    return Some(value);
                }
                p = self.successor(p);
            }
            None
        }
    }

    /// Removes and returns the last element, or `None` when empty.
    pub fn poll_last(&self) -> Option<T> {
        let _pin = G::pin();
        unsafe {
            let mut p = self.last_node();
            while !p.is_null() {
                let item = (*p).get_item();
                if !item.is_null() && (*p).cas_item(item, null_mut()) {
                    let value = ptr::read(item);
                    self.guard.defer_destroy(item, dealloc_item_shell::<T>);
                    self.unlink_node(p);
                    return Some(value);
                }
                p = self.predecessor(p);
            }
            None
        }
    }

    /// Like [`poll_first`](Self::poll_first), additionally returning the
    /// handle of the removed node.
    pub fn poll_first_x(&self) -> Option<Polled<T>> {
        let _pin = G::pin();
        unsafe {
            let mut p = self.first_node();
            while !p.is_null() {
                let item = (*p).get_item();
                if !item.is_null() && (*p).cas_item(item, null_mut()) {
                    let value = ptr::read(item);
                    self.guard.defer_destroy(item, dealloc_item_shell::<T>);
                    self.unlink_node(p);
                    return Some(Polled {
                        item: value,
                        node: NodeHandle::new(p),
                    });
                }
                p = self.successor(p);
            }
            None
        }
    }

    /// Strict [`poll_first`](Self::poll_first).
    pub fn remove_first(&self) -> Result<T> {
        self.poll_first().ok_or(Error::NoSuchElement)
    }

    /// Strict [`poll_last`](Self::poll_last).
    pub fn remove_last(&self) -> Result<T> {
        self.poll_last().ok_or(Error::NoSuchElement)
    }

    /// Stack view: strict removal from the front.
    pub fn pop(&self) -> Result<T> {
        self.remove_first()
    }

    /// Removes the node behind `handle` if its element is still present.
    ///
    /// Only the first call (across all removal paths touching that node)
    /// observes the element; later calls are no-ops returning `false`.
    ///
    /// The handle must have been produced by this deque, and it stays usable
    /// only while the guard keeps retired nodes alive. Under the deferred
    /// guard that is the deque's whole lifetime; under an epoch guard a
    /// handle should not be reused once its element is known removed.
    pub fn unlink(&self, handle: &NodeHandle<T>) -> bool {
        let _pin = G::pin();
        unsafe { self.unlink_handle(handle.node) }
    }

    /// Removes the first element equal to `item`, scanning front to back.
    pub fn remove_first_occurrence(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let _pin = G::pin();
        unsafe {
            let mut p = self.first_node();
            while !p.is_null() {
                let it = (*p).get_item();
                if !it.is_null() && *it == *item && (*p).cas_item(it, null_mut()) {
                    self.guard.defer_destroy(it, dealloc_item::<T>);
                    self.unlink_node(p);
                    return true;
                }
                p = self.successor(p);
            }
            false
        }
    }

    /// Removes the last element equal to `item`, scanning back to front.
    pub fn remove_last_occurrence(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let _pin = G::pin();
        unsafe {
            let mut p = self.last_node();
            while !p.is_null() {
                let it = (*p).get_item();
                if !it.is_null() && *it == *item && (*p).cas_item(it, null_mut()) {
                    self.guard.defer_destroy(it, dealloc_item::<T>);
                    self.unlink_node(p);
                    return true;
                }
                p = self.predecessor(p);
            }
            false
        }
    }

    /// Alias for [`remove_first_occurrence`](Self::remove_first_occurrence).
    pub fn remove(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.remove_first_occurrence(item)
    }

    /// Removes every element.
    pub fn clear(&self) {
        while self.poll_first().is_some() {}
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Weakly consistent iterator from first to last.
    pub fn iter(&self) -> Iter<'_, T, G>
    where
        T: Clone,
    {
        Iter::new(self, Direction::Forward)
    }

    /// Weakly consistent iterator from last to first.
    pub fn iter_descending(&self) -> Iter<'_, T, G>
    where
        T: Clone,
    {
        Iter::new(self, Direction::Descending)
    }

    // =========================================================================
    // Linking
    // =========================================================================

    /// Links `new_node` as the first node.
    ///
    /// # Safety
    /// `new_node` must be unlinked, live, and exclusively owned by the caller.
    unsafe fn link_first(&self, new_node: NodePtr<T>) {
        self.size.increment();

        unsafe {
            'restart_from_head: loop {
                let mut h = self.head.load(Acquire);
                let mut p = h;
                loop {
                    let mut q = (*p).get_prev();
                    let advanced_twice = if !q.is_null() {
                        p = q;
                        q = (*p).get_prev();
                        !q.is_null()
                    } else {
                        false
                    };

                    if advanced_twice {
                        // Check for head updates every other hop.
                        let h2 = self.head.load(Acquire);
                        p = if h != h2 {
                            h = h2;
                            h
                        } else {
                            q
                        };
                        continue;
                    }
                    if (*p).get_next() == p {
                        // Walked onto the off-list-at-the-head marker.
                        continue 'restart_from_head;
                    }

                    // p is the first node. Publish the inward link before the
                    // CAS makes the node reachable.
                    (*new_node).set_next(p);

                    if (*p).cas_prev(null_mut(), new_node) {
                        // The CAS is the linearization point: the element is
                        // in the deque and the node is live.
                        if p != h {
                            // Hop two nodes at a time; losing this CAS is fine.
                            let _ = self.head.compare_exchange(h, new_node, AcqRel, Acquire);
                        }
                        return;
                    }
                    // Lost the race; re-read prev.
                }
            }
        }
    }

    /// Links `new_node` as the last node. Mirror image of `link_first`.
    ///
    /// # Safety
    /// `new_node` must be unlinked, live, and exclusively owned by the caller.
    unsafe fn link_last(&self, new_node: NodePtr<T>) {
        self.size.increment();

        unsafe {
            'restart_from_tail: loop {
                let mut t = self.tail.load(Acquire);
                let mut p = t;
                loop {
                    let mut q = (*p).get_next();
                    let advanced_twice = if !q.is_null() {
                        p = q;
                        q = (*p).get_next();
                        !q.is_null()
                    } else {
                        false
                    };

                    if advanced_twice {
                        let t2 = self.tail.load(Acquire);
                        p = if t != t2 {
                            t = t2;
                            t
                        } else {
                            q
                        };
                        continue;
                    }
                    if (*p).get_prev() == p {
                        continue 'restart_from_tail;
                    }

                    (*new_node).set_prev(p);

                    if (*p).cas_next(null_mut(), new_node) {
                        if p != t {
                            let _ = self.tail.compare_exchange(t, new_node, AcqRel, Acquire);
                        }
                        return;
                    }
                }
            }
        }
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// The unique node with `prev == null && next != self`. May be deleted.
    /// Also repairs `head` to reference the returned node.
    unsafe fn first_node(&self) -> NodePtr<T> {
        unsafe {
            'restart_from_head: loop {
                let mut h = self.head.load(Acquire);
                let mut p = h;
                loop {
                    let mut q = (*p).get_prev();
                    let advanced_twice = if !q.is_null() {
                        p = q;
                        q = (*p).get_prev();
                        !q.is_null()
                    } else {
                        false
                    };

                    if advanced_twice {
                        let h2 = self.head.load(Acquire);
                        p = if h != h2 {
                            h = h2;
                            h
                        } else {
                            q
                        };
                        continue;
                    }
                    // p may be the terminator here; the CAS then fails by
                    // construction because head never references it.
                    if p == h || self.head.compare_exchange(h, p, AcqRel, Acquire).is_ok() {
                        debug_assert!(
                            p != self.prev_term && p != self.next_term,
                            "terminator reached where the first node was expected"
                        );
                        return p;
                    }
                    continue 'restart_from_head;
                }
            }
        }
    }

    /// The unique node with `next == null && prev != self`. May be deleted.
    unsafe fn last_node(&self) -> NodePtr<T> {
        unsafe {
            'restart_from_tail: loop {
                let mut t = self.tail.load(Acquire);
                let mut p = t;
                loop {
                    let mut q = (*p).get_next();
                    let advanced_twice = if !q.is_null() {
                        p = q;
                        q = (*p).get_next();
                        !q.is_null()
                    } else {
                        false
                    };

                    if advanced_twice {
                        let t2 = self.tail.load(Acquire);
                        p = if t != t2 {
                            t = t2;
                            t
                        } else {
                            q
                        };
                        continue;
                    }
                    if p == t || self.tail.compare_exchange(t, p, AcqRel, Acquire).is_ok() {
                        debug_assert!(
                            p != self.prev_term && p != self.next_term,
                            "terminator reached where the last node was expected"
                        );
                        return p;
                    }
                    continue 'restart_from_tail;
                }
            }
        }
    }

    /// Next node in forward order, or the current first node when `p` has
    /// been taken off the list at the head end.
    unsafe fn successor(&self, p: NodePtr<T>) -> NodePtr<T> {
        unsafe {
            let q = (*p).get_next();
            if p == q { self.first_node() } else { q }
        }
    }

    /// Mirror image of `successor`.
    unsafe fn predecessor(&self, p: NodePtr<T>) -> NodePtr<T> {
        unsafe {
            let q = (*p).get_prev();
            if p == q { self.last_node() } else { q }
        }
    }

    // =========================================================================
    // Unlinking
    // =========================================================================

    /// Logically deletes the node if it is still live, then unlinks it.
    ///
    /// # Safety
    /// `node` must belong to this deque and the caller must hold a pin.
    unsafe fn unlink_handle(&self, node: NodePtr<T>) -> bool {
        unsafe {
            let item = (*node).get_item();
            if !item.is_null() && (*node).cas_item(item, null_mut()) {
                self.guard.defer_destroy(item, dealloc_item::<T>);
                self.unlink_node(node);
                true
            } else {
                false
            }
        }
    }

    /// Unlinks a node whose element was just deleted. Called exactly once per
    /// node; this is where the size decrement happens.
    ///
    /// # Safety
    /// `x` must be logically deleted, non-terminator, and the caller must
    /// hold a pin.
    unsafe fn unlink_node(&self, x: NodePtr<T>) {
        unsafe {
            debug_assert!(
                !(*x).is_live(),
                "unlinking a node whose element is still present"
            );
            debug_assert!(
                x != self.prev_term && x != self.next_term,
                "unlinking a terminator"
            );

            self.size.decrement();

            let prev = (*x).get_prev();
            let next = (*x).get_next();

            if prev.is_null() {
                self.unlink_first(x, next);
            } else if next.is_null() {
                self.unlink_last(x, prev);
            } else {
                // Interior removal, the common case: a run of polls at one
                // end deletes end nodes that cannot themselves be unlinked,
                // so their neighbors end up here.
                //
                // Find the unique active predecessor and successor of x, fix
                // their links to point at each other, then confirm the
                // neighborhood and take x off the list for reclamation.
                let active_pred;
                let active_succ;
                let is_first;
                let is_last;
                let mut hops = 1usize;

                let mut p = prev;
                loop {
                    if (*p).is_live() {
                        active_pred = p;
                        is_first = false;
                        break;
                    }
                    let q = (*p).get_prev();
                    if q.is_null() {
                        if (*p).get_next() == p {
                            return;
                        }
                        active_pred = p;
                        is_first = true;
                        break;
                    }
                    if p == q {
                        return;
                    }
                    p = q;
                    hops += 1;
                }

                let mut p = next;
                loop {
                    if (*p).is_live() {
                        active_succ = p;
                        is_last = false;
                        break;
                    }
                    let q = (*p).get_next();
                    if q.is_null() {
                        if (*p).get_prev() == p {
                            return;
                        }
                        active_succ = p;
                        is_last = true;
                        break;
                    }
                    if p == q {
                        return;
                    }
                    p = q;
                    hops += 1;
                }

                // Shallow garbage next to an end is left for a later pass.
                if hops < HOPS && (is_first || is_last) {
                    return;
                }

                // Squeeze out the deleted run between the active neighbors,
                // x included.
                self.skip_deleted_successors(active_pred);
                self.skip_deleted_predecessors(active_succ);

                // Confirm the bypass held in both directions and that the
                // neighbors still have the status the walk saw. Only then is
                // x unreachable for traversals starting after this point.
                let closed = (*active_pred).get_next() == active_succ
                    && (*active_succ).get_prev() == active_pred
                    && (if is_first {
                        (*active_pred).get_prev().is_null()
                    } else {
                        (*active_pred).is_live()
                    })
                    && (if is_last {
                        (*active_succ).get_next().is_null()
                    } else {
                        (*active_succ).is_live()
                    });

                if closed {
                    // Make sure neither root can still lead to x.
                    self.update_head();
                    self.update_tail();

                    // The whole dead run between the active neighbors is now
                    // bypassed in both directions. Collect it through x's
                    // frozen links before they are replaced; nodes a
                    // concurrent compression hid from this walk stay behind
                    // for a later pass or the final sweep.
                    let mut run: Vec<NodePtr<T>> = Vec::new();
                    let mut u = (*x).get_prev();
                    while u != active_pred && !u.is_null() {
                        if (*u).is_live() || (*u).get_prev() == u || (*u).get_next() == u {
                            break;
                        }
                        run.push(u);
                        u = (*u).get_prev();
                    }
                    let mut u = (*x).get_next();
                    while u != active_succ && !u.is_null() {
                        if (*u).is_live() || (*u).get_prev() == u || (*u).get_next() == u {
                            break;
                        }
                        run.push(u);
                        u = (*u).get_next();
                    }

                    // Replace x's links with their off-list approximations so
                    // nodes stranded on x cannot pin the active chain.
                    (*x).set_prev(if is_first { self.prev_term } else { x });
                    (*x).set_next(if is_last { self.next_term } else { x });

                    self.retire_node(x);
                    for &u in &run {
                        self.retire_node(u);
                    }
                }
            }
        }
    }

    /// Unlinks the deleted first node by bypassing the dead prefix behind it.
    /// The end node itself stays in place; end nodes cannot be unlinked.
    ///
    /// # Safety
    /// `first` must be the deleted first node and `next` its observed
    /// successor; the caller must hold a pin.
    unsafe fn unlink_first(&self, first: NodePtr<T>, next: NodePtr<T>) {
        unsafe {
            let mut swept: Vec<NodePtr<T>> = Vec::new();
            let mut o: NodePtr<T> = null_mut();
            let mut p = next;
            loop {
                let live = (*p).is_live();
                let q = (*p).get_next();
                if live || q.is_null() {
                    if !o.is_null()
                        && (*p).get_prev() != p
                        && (*first).cas_next(next, p)
                    {
                        self.skip_deleted_predecessors(p);
                        if (*first).get_prev().is_null()
                            && ((*p).get_next().is_null() || (*p).is_live())
                            && (*p).get_prev() == first
                        {
                            // The prefix is bypassed in both directions.
                            self.update_head();
                            self.update_tail();

                            (*o).set_next(o);
                            (*o).set_prev(self.prev_term);

                            for &u in &swept {
                                self.retire_node(u);
                            }
                        }
                    }
                    return;
                }
                if p == q {
                    return;
                }
                o = p;
                swept.push(p);
                p = q;
            }
        }
    }

    /// Mirror image of `unlink_first`.
    ///
    /// # Safety
    /// `last` must be the deleted last node and `prev` its observed
    /// predecessor; the caller must hold a pin.
    unsafe fn unlink_last(&self, last: NodePtr<T>, prev: NodePtr<T>) {
        unsafe {
            let mut swept: Vec<NodePtr<T>> = Vec::new();
            let mut o: NodePtr<T> = null_mut();
            let mut p = prev;
            loop {
                let live = (*p).is_live();
                let q = (*p).get_prev();
                if live || q.is_null() {
                    if !o.is_null()
                        && (*p).get_next() != p
                        && (*last).cas_prev(prev, p)
                    {
                        self.skip_deleted_successors(p);
                        if (*last).get_next().is_null()
                            && ((*p).get_prev().is_null() || (*p).is_live())
                            && (*p).get_next() == last
                        {
                            self.update_head();
                            self.update_tail();

                            (*o).set_prev(o);
                            (*o).set_next(self.next_term);

                            for &u in &swept {
                                self.retire_node(u);
                            }
                        }
                    }
                    return;
                }
                if p == q {
                    return;
                }
                o = p;
                swept.push(p);
                p = q;
            }
        }
    }

    /// Compresses the run of deleted nodes out of `x.prev`, CASing it to the
    /// nearest active node on the prev side. Loops while `x` stays interior.
    ///
    /// # Safety
    /// `x` must not be a terminator; the caller must hold a pin.
    unsafe fn skip_deleted_predecessors(&self, x: NodePtr<T>) {
        unsafe {
            loop {
                let prev = (*x).get_prev();
                if prev.is_null() {
                    return;
                }
                let mut p = prev;
                let mut off_list = false;
                loop {
                    if (*p).is_live() {
                        break;
                    }
                    let q = (*p).get_prev();
                    if q.is_null() {
                        if (*p).get_next() == p {
                            off_list = true;
                        }
                        break;
                    }
                    if p == q {
                        off_list = true;
                        break;
                    }
                    p = q;
                }

                if !off_list && (prev == p || (*x).cas_prev(prev, p)) {
                    return;
                }

                // Keep helping while x is still live or is the last node.
                if !((*x).is_live() || (*x).get_next().is_null()) {
                    return;
                }
            }
        }
    }

    /// Mirror image of `skip_deleted_predecessors`.
    ///
    /// # Safety
    /// `x` must not be a terminator; the caller must hold a pin.
    unsafe fn skip_deleted_successors(&self, x: NodePtr<T>) {
        unsafe {
            loop {
                let next = (*x).get_next();
                if next.is_null() {
                    return;
                }
                let mut p = next;
                let mut off_list = false;
                loop {
                    if (*p).is_live() {
                        break;
                    }
                    let q = (*p).get_next();
                    if q.is_null() {
                        if (*p).get_prev() == p {
                            off_list = true;
                        }
                        break;
                    }
                    if p == q {
                        off_list = true;
                        break;
                    }
                    p = q;
                }

                if !off_list && (next == p || (*x).cas_next(next, p)) {
                    return;
                }

                if !((*x).is_live() || (*x).get_prev().is_null()) {
                    return;
                }
            }
        }
    }

    /// Moves `head` to a node that was active while this ran, guaranteeing
    /// nodes unlinked before the call are unreachable from `head` after it.
    /// Does not try to eliminate slack.
    unsafe fn update_head(&self) {
        unsafe {
            'restart_from_head: loop {
                let h = self.head.load(Acquire);
                if (*h).is_live() {
                    return;
                }
                let mut p = (*h).get_prev();
                if p.is_null() {
                    return;
                }
                loop {
                    let mut q = (*p).get_prev();
                    if q.is_null() {
                        // p may be the terminator; the CAS fails then.
                        if self.head.compare_exchange(h, p, AcqRel, Acquire).is_ok() {
                            return;
                        }
                        continue 'restart_from_head;
                    }
                    p = q;
                    q = (*p).get_prev();
                    if q.is_null() {
                        if self.head.compare_exchange(h, p, AcqRel, Acquire).is_ok() {
                            return;
                        }
                        continue 'restart_from_head;
                    }
                    if h != self.head.load(Acquire) {
                        continue 'restart_from_head;
                    }
                    p = q;
                }
            }
        }
    }

    /// Mirror image of `update_head`.
    unsafe fn update_tail(&self) {
        unsafe {
            'restart_from_tail: loop {
                let t = self.tail.load(Acquire);
                if (*t).is_live() {
                    return;
                }
                let mut p = (*t).get_next();
                if p.is_null() {
                    return;
                }
                loop {
                    let mut q = (*p).get_next();
                    if q.is_null() {
                        if self.tail.compare_exchange(t, p, AcqRel, Acquire).is_ok() {
                            return;
                        }
                        continue 'restart_from_tail;
                    }
                    p = q;
                    q = (*p).get_next();
                    if q.is_null() {
                        if self.tail.compare_exchange(t, p, AcqRel, Acquire).is_ok() {
                            return;
                        }
                        continue 'restart_from_tail;
                    }
                    if t != self.tail.load(Acquire) {
                        continue 'restart_from_tail;
                    }
                    p = q;
                }
            }
        }
    }

    /// Hands a bypassed node to the guard, once.
    ///
    /// # Safety
    /// `x` must be unreachable for traversals that start after this call.
    unsafe fn retire_node(&self, x: NodePtr<T>) {
        unsafe {
            if (*x).claim() {
                self.guard.defer_destroy(x, dealloc_node::<T>);
            }
        }
    }
}

impl<T, G: Guard> Default for ConcurrentDeque<T, G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, G: Guard> Drop for ConcurrentDeque<T, G> {
    fn drop(&mut self) {
        // Exclusive access: no pins, no concurrent mutators. Retired nodes
        // are off both chains and belong to the guard; everything else is
        // collected here by walking both directions from both roots.
        unsafe {
            let mut nodes: Vec<NodePtr<T>> = Vec::new();

            let claim = |p: NodePtr<T>, nodes: &mut Vec<NodePtr<T>>| unsafe {
                if (*p).claim() {
                    nodes.push(p);
                }
            };

            let stop = |p: NodePtr<T>, q: NodePtr<T>| {
                q.is_null() || q == p || q == self.prev_term || q == self.next_term
            };

            // Back up from head to the first node, collecting the detour.
            let mut first = self.head.load(Relaxed);
            loop {
                claim(first, &mut nodes);
                let q = (*first).prev.load(Relaxed);
                if stop(first, q) {
                    break;
                }
                first = q;
            }
            // Forward from tail to the last node.
            let mut last = self.tail.load(Relaxed);
            loop {
                claim(last, &mut nodes);
                let q = (*last).next.load(Relaxed);
                if stop(last, q) {
                    break;
                }
                last = q;
            }
            // The full next chain.
            let mut p = first;
            loop {
                claim(p, &mut nodes);
                let q = (*p).next.load(Relaxed);
                if stop(p, q) {
                    break;
                }
                p = q;
            }
            // The full prev chain, catching nodes bypassed on one side only.
            let mut p = last;
            loop {
                claim(p, &mut nodes);
                let q = (*p).prev.load(Relaxed);
                if stop(p, q) {
                    break;
                }
                p = q;
            }

            for &n in &nodes {
                let item = (*n).item.load(Relaxed);
                if !item.is_null() {
                    dealloc_item(item);
                }
                dealloc_node(n);
            }

            dealloc_node(self.prev_term);
            dealloc_node(self.next_term);
        }
    }
}

// =============================================================================
// Iteration
// =============================================================================

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Descending,
}

/// Weakly consistent deque iterator.
///
/// Yields elements that existed at some point at or since the iterator's
/// creation; never an element twice, never a deleted slot. Holds a read pin
/// for its whole lifetime, so the nodes it references stay allocated.
pub struct Iter<'a, T, G: Guard>
where
    T: Clone,
{
    deque: &'a ConcurrentDeque<T, G>,
    _pin: G::ReadGuard,
    direction: Direction,
    /// Next node to yield from.
    next_node: NodePtr<T>,
    /// Element captured together with `next_node`: once announced it is
    /// yielded even if the node is deleted in the meantime.
    next_item: Option<T>,
    /// Node most recently yielded; target of `remove_current`.
    last_ret: NodePtr<T>,
}

impl<'a, T, G: Guard> Iter<'a, T, G>
where
    T: Clone,
{
    fn new(deque: &'a ConcurrentDeque<T, G>, direction: Direction) -> Self {
        let mut iter = Iter {
            deque,
            _pin: G::pin(),
            direction,
            next_node: null_mut(),
            next_item: None,
            last_ret: null_mut(),
        };
        iter.advance();
        iter
    }

    unsafe fn start_node(&self) -> NodePtr<T> {
        unsafe {
            match self.direction {
                Direction::Forward => self.deque.first_node(),
                Direction::Descending => self.deque.last_node(),
            }
        }
    }

    unsafe fn step(&self, p: NodePtr<T>) -> NodePtr<T> {
        unsafe {
            match self.direction {
                Direction::Forward => self.deque.successor(p),
                Direction::Descending => self.deque.predecessor(p),
            }
        }
    }

    /// Moves `next_node`/`next_item` to the next live node, if any.
    fn advance(&mut self) {
        self.last_ret = self.next_node;

        unsafe {
            let mut p = if self.next_node.is_null() {
                self.start_node()
            } else {
                self.step(self.next_node)
            };

            loop {
                if p.is_null() {
                    self.next_node = null_mut();
                    self.next_item = None;
                    return;
                }
                let item = (*p).get_item();
                if !item.is_null() {
                    self.next_node = p;
                    self.next_item = Some((*item).clone());
                    return;
                }
                p = self.step(p);
            }
        }
    }

    /// Logically removes the element most recently yielded by `next`.
    ///
    /// Returns [`Error::NotSupported`] before the first `next`, or twice in a
    /// row for the same element.
    pub fn remove_current(&mut self) -> Result<()> {
        if self.last_ret.is_null() {
            return Err(Error::NotSupported);
        }
        unsafe {
            self.deque.unlink_handle(self.last_ret);
        }
        self.last_ret = null_mut();
        Ok(())
    }
}

impl<T, G: Guard> Iterator for Iter<'_, T, G>
where
    T: Clone,
{
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.next_item.take()?;
        self.advance();
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::DeferredGuard;

    type Deque<T> = ConcurrentDeque<T, DeferredGuard>;

    #[test]
    fn test_add_poll_ends() {
        let deque: Deque<i32> = ConcurrentDeque::new();
        deque.add_last(2);
        deque.add_first(1);
        deque.add_last(3);

        assert_eq!(deque.peek_first(), Some(1));
        assert_eq!(deque.peek_last(), Some(3));
        assert_eq!(deque.len(), 3);
        assert_eq!(deque.len_approx(), 3);

        assert_eq!(deque.poll_first(), Some(1));
        assert_eq!(deque.poll_last(), Some(3));
        assert_eq!(deque.poll_first(), Some(2));
        assert_eq!(deque.poll_first(), None);
        assert!(deque.is_empty());
        assert_eq!(deque.len_approx(), 0);
    }

    #[test]
    fn test_round_trip_laws() {
        let deque: Deque<i32> = ConcurrentDeque::new();

        deque.add_last(7);
        assert_eq!(deque.poll_last(), Some(7));

        deque.add_first(8);
        assert_eq!(deque.poll_first(), Some(8));

        deque.push(9);
        assert_eq!(deque.pop(), Ok(9));
        assert_eq!(deque.pop(), Err(Error::NoSuchElement));
    }

    #[test]
    fn test_strict_variants_on_empty() {
        let deque: Deque<i32> = ConcurrentDeque::new();
        assert_eq!(deque.get_first(), Err(Error::NoSuchElement));
        assert_eq!(deque.get_last(), Err(Error::NoSuchElement));
        assert_eq!(deque.remove_first(), Err(Error::NoSuchElement));
        assert_eq!(deque.remove_last(), Err(Error::NoSuchElement));
    }

    #[test]
    fn test_fifo_order() {
        let deque: Deque<i32> = ConcurrentDeque::new();
        for i in 0..100 {
            deque.add_last(i);
        }
        for i in 0..100 {
            assert_eq!(deque.poll_first(), Some(i));
        }
    }

    #[test]
    fn test_lifo_order() {
        let deque: Deque<i32> = ConcurrentDeque::new();
        for i in 0..100 {
            deque.push(i);
        }
        for i in (0..100).rev() {
            assert_eq!(deque.pop(), Ok(i));
        }
    }

    #[test]
    fn test_offer_always_succeeds() {
        let deque: Deque<i32> = ConcurrentDeque::new();
        assert!(deque.offer_first(1));
        assert!(deque.offer_last(2));
        assert!(deque.offer_last_node(DetachedNode::new(3)));
        assert_eq!(deque.to_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn test_unlink_handle_is_idempotent() {
        let deque: Deque<i32> = ConcurrentDeque::new();
        deque.add_last(1);
        let handle = deque.add_last_x(2);
        deque.add_last(3);

        assert!(deque.unlink(&handle));
        assert!(!deque.unlink(&handle));
        assert_eq!(deque.to_vec(), vec![1, 3]);
        assert_eq!(deque.len_approx(), 2);
    }

    #[test]
    fn test_unlink_after_poll_is_noop() {
        let deque: Deque<i32> = ConcurrentDeque::new();
        let handle = deque.add_last_x(42);
        assert_eq!(deque.poll_first(), Some(42));
        assert!(!deque.unlink(&handle));
        assert!(deque.is_empty());
    }

    #[test]
    fn test_poll_first_x_returns_node() {
        let deque: Deque<i32> = ConcurrentDeque::new();
        deque.add_last(5);
        let polled = deque.poll_first_x().unwrap();
        assert_eq!(polled.item, 5);
        assert!(!deque.unlink(&polled.node));
    }

    #[test]
    fn test_occurrence_removal() {
        let deque: Deque<i32> = ConcurrentDeque::new();
        for v in [1, 2, 3, 2, 1] {
            deque.add_last(v);
        }

        assert!(deque.remove_first_occurrence(&2));
        assert_eq!(deque.to_vec(), vec![1, 3, 2, 1]);

        assert!(deque.remove_last_occurrence(&1));
        assert_eq!(deque.to_vec(), vec![1, 3, 2]);

        assert!(!deque.remove(&9));
        assert!(deque.contains(&3));
        assert!(!deque.contains(&9));
    }

    #[test]
    fn test_add_all_appends_in_order() {
        let deque: Deque<i32> = ConcurrentDeque::new();
        deque.add_last(0);
        assert!(deque.add_all(1..=5));
        assert!(!deque.add_all(std::iter::empty()));
        assert_eq!(deque.to_vec(), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(deque.len_approx(), 6);
    }

    #[test]
    fn test_with_elements() {
        let deque: Deque<i32> = ConcurrentDeque::with_elements(vec![1, 2, 3]);
        assert_eq!(deque.len(), 3);
        assert_eq!(deque.len_approx(), 3);
        assert_eq!(deque.poll_first(), Some(1));
        assert_eq!(deque.poll_last(), Some(3));

        let single: Deque<i32> = ConcurrentDeque::with_elements(vec![9]);
        assert_eq!(single.poll_first(), Some(9));
        assert!(single.is_empty());
    }

    #[test]
    fn test_iterators() {
        let deque: Deque<i32> = ConcurrentDeque::with_elements(vec![1, 2, 3, 4]);
        assert_eq!(deque.iter().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(
            deque.iter_descending().collect::<Vec<_>>(),
            vec![4, 3, 2, 1]
        );
    }

    #[test]
    fn test_iterator_remove_current() {
        let deque: Deque<i32> = ConcurrentDeque::with_elements(vec![1, 2, 3]);

        let mut iter = deque.iter();
        assert_eq!(iter.remove_current(), Err(Error::NotSupported));

        assert_eq!(iter.next(), Some(1));
        assert_eq!(iter.next(), Some(2));
        assert_eq!(iter.remove_current(), Ok(()));
        assert_eq!(iter.next(), Some(3));
        drop(iter);

        assert_eq!(deque.to_vec(), vec![1, 3]);
    }

    #[test]
    fn test_iterator_skips_deleted() {
        let deque: Deque<i32> = ConcurrentDeque::new();
        let handles: Vec<_> = (0..10).map(|i| deque.add_last_x(i)).collect();
        for h in handles.iter().step_by(2) {
            deque.unlink(h);
        }
        assert_eq!(deque.iter().collect::<Vec<_>>(), vec![1, 3, 5, 7, 9]);
    }

    #[test]
    fn test_clear() {
        let deque: Deque<i32> = ConcurrentDeque::with_elements(0..50);
        deque.clear();
        assert!(deque.is_empty());
        assert!(deque.is_empty_approx());
        assert_eq!(deque.len(), 0);
    }

    #[test]
    fn test_interior_unlink_all_nodes() {
        let deque: Deque<i32> = ConcurrentDeque::new();
        let handles: Vec<_> = (0..1000).map(|i| deque.add_last_x(i)).collect();

        for h in &handles {
            assert!(deque.unlink(h));
        }

        assert_eq!(deque.len(), 0);
        assert_eq!(deque.len_approx(), 0);
        assert!(deque.is_empty());

        // The structure must still accept work at both ends.
        deque.add_first(1);
        deque.add_last(2);
        assert_eq!(deque.to_vec(), vec![1, 2]);
    }

    #[test]
    fn test_detached_node_dropped_unlinked() {
        let node = DetachedNode::new(String::from("never linked"));
        drop(node);
    }

    #[test]
    fn test_drop_with_mixed_states() {
        let deque: Deque<String> = ConcurrentDeque::new();
        for i in 0..100 {
            deque.add_last(format!("value-{i}"));
        }
        for _ in 0..30 {
            deque.poll_first();
        }
        for _ in 0..30 {
            deque.poll_last();
        }
        // Remaining live nodes and any lingering dead ones are released here.
        drop(deque);
    }
}
