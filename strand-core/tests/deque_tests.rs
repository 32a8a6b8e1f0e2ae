use rstest::rstest;

use strand_core::common_tests::deque_core_tests::*;
use strand_core::guard::Guard;
use strand_core::{ConcurrentDeque, DeferredGuard};

type DeferredDeque = ConcurrentDeque<i32, DeferredGuard>;

#[rstest]
#[case::deferred(DeferredDeque::default())]
fn core_end_round_trips<G: Guard + 'static>(#[case] _deque: ConcurrentDeque<i32, G>) {
    test_end_round_trips::<G>();
}

#[rstest]
#[case::deferred(DeferredDeque::default())]
fn core_counters_agree_after_quiesce<G: Guard + 'static>(#[case] _deque: ConcurrentDeque<i32, G>) {
    test_counters_agree_after_quiesce::<G>();
}

#[rstest]
#[case::deferred(DeferredDeque::default())]
fn core_no_element_vanishes<G: Guard + 'static>(#[case] _deque: ConcurrentDeque<i32, G>) {
    test_no_element_vanishes::<G>();
}

#[rstest]
#[case::deferred(DeferredDeque::default())]
fn core_interior_unlink_partitions<G: Guard + 'static>(#[case] _deque: ConcurrentDeque<i32, G>) {
    test_interior_unlink_partitions::<G>();
}

#[rstest]
#[case::deferred(DeferredDeque::default())]
fn core_weakly_consistent_iteration<G: Guard + 'static>(#[case] _deque: ConcurrentDeque<i32, G>) {
    test_weakly_consistent_iteration::<G>();
}

#[rstest]
#[case::deferred(DeferredDeque::default())]
fn core_add_all_under_concurrent_append<G: Guard + 'static>(
    #[case] _deque: ConcurrentDeque<i32, G>,
) {
    test_add_all_under_concurrent_append::<G>();
}

#[rstest]
#[case::deferred(DeferredDeque::default())]
fn core_memory_ordering<G: Guard + 'static>(#[case] _deque: ConcurrentDeque<i32, G>) {
    test_memory_ordering::<G>();
}
