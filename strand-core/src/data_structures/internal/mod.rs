//! Internal implementation details shared by the collections.

mod atomic_count;

pub(crate) use atomic_count::AtomicCount;
