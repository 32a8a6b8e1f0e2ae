//! Generic test suites shared across guard and ordered-set implementations.
//!
//! The functions here are parameterized over `G: Guard` or
//! `S: ConcurrentOrderedSet` so each implementation crate can instantiate the
//! same behavioral checks against its own types.
