use rstest::rstest;

use strand_core::common_tests::bounded_set_tests::*;
use strand_core::{BoundedOrderedSet, ConcurrentOrderedSet};
use strand_crossbeam::SkipListSet;

type SkipBounded = BoundedOrderedSet<i32, SkipListSet<i32>>;

#[rstest]
#[case::skiplist(SkipListSet::<i32>::default())]
fn bounded_overflow_retains_greatest<S: ConcurrentOrderedSet<i32> + Default + 'static>(
    #[case] _set: S,
) {
    test_overflow_retains_greatest::<S>();
}

#[rstest]
#[case::skiplist(SkipListSet::<i32>::default())]
fn bounded_duplicate_inserts_keep_one<S: ConcurrentOrderedSet<i32> + Default + 'static>(
    #[case] _set: S,
) {
    test_duplicate_inserts_keep_one::<S>();
}

#[rstest]
#[case::skiplist(SkipListSet::<i32>::default())]
fn bounded_count_matches_membership<S: ConcurrentOrderedSet<i32> + Default + 'static>(
    #[case] _set: S,
) {
    test_count_matches_membership::<S>();
}

#[rstest]
#[case::skiplist(SkipListSet::<i32>::default())]
fn bounded_small_bound_pressure<S: ConcurrentOrderedSet<i32> + Default + 'static>(
    #[case] _set: S,
) {
    test_small_bound_pressure::<S>();
}

#[rstest]
#[case::tight(1)]
#[case::small(7)]
#[case::wide(512)]
fn bounded_holds_for_any_max(#[case] max: usize) {
    let set = SkipBounded::new(max);
    for v in 0..1_024 {
        set.insert(v);
    }

    let expected = max.min(1_024);
    assert_eq!(set.len(), expected);
    let contents = set.to_vec();
    assert_eq!(contents.len(), expected);
    assert_eq!(contents.first().copied(), Some(1_024 - expected as i32));
    assert_eq!(contents.last().copied(), Some(1_023));
}
