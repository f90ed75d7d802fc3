//! Predicate mode and view mode must agree on membership.

use std::collections::BTreeSet;

use bytes::Bytes;
use proptest::prelude::*;
use strata_segment::{intersect, MemoryIndex, Query, Segment, SegmentedView};

fn id(n: u8) -> Bytes {
    Bytes::from(format!("u{n}"))
}

fn segment_strategy() -> impl Strategy<Value = Segment> {
    prop::collection::btree_set(0u8..24, 0..16).prop_map(|ids| ids.into_iter().map(id).collect())
}

fn index_strategy() -> impl Strategy<Value = MemoryIndex> {
    prop::collection::vec((0u8..4, 0u8..24), 0..64).prop_map(|pairs| {
        MemoryIndex::from_pairs(
            pairs
                .into_iter()
                .map(|(key, value)| (format!("k{key}"), id(value))),
        )
    })
}

proptest! {
    #[test]
    fn modes_agree(
        index in index_strategy(),
        segments in prop::collection::vec(segment_strategy(), 1..5),
    ) {
        let by_pred = SegmentedView::with_identity(&index, &segments, |v| v.clone()).unwrap();
        let by_view = SegmentedView::restricted(&index, &segments).unwrap();

        for key in ["k0", "k1", "k2", "k3", "k9"] {
            let a: Vec<Bytes> = by_pred.lookup(key.as_bytes()).unwrap().collect();
            let b: Vec<Bytes> = by_view.lookup(key.as_bytes()).unwrap().collect();
            prop_assert_eq!(a, b);
        }

        let a: Vec<Bytes> = by_pred.values().unwrap().collect();
        let b: Vec<Bytes> = by_view.values().unwrap().collect();
        prop_assert_eq!(a, b);

        let a: Vec<Bytes> = by_pred.unique_values().unwrap().collect();
        let b: Vec<Bytes> = by_view.unique_values().unwrap().collect();
        prop_assert_eq!(a, b);

        let query = Query::literal("k0").or(Query::literal("k1").and(Query::literal("k2")));
        let a: Vec<Bytes> = by_pred.query(&query).unwrap().collect();
        let b: Vec<Bytes> = by_view.query(&query).unwrap().collect();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn intersection_is_common_members(segments in prop::collection::vec(segment_strategy(), 1..5)) {
        let expected: BTreeSet<Bytes> = segments[0]
            .iter()
            .filter(|m| segments.iter().all(|s| s.contains(*m)))
            .cloned()
            .collect();
        prop_assert_eq!(intersect(&segments), expected);
    }
}

#[test]
fn known_intersection() {
    let index = MemoryIndex::from_pairs((1..=4).map(|n| ("k0", id(n))));
    let segments = vec![
        [1, 2, 3].into_iter().map(id).collect::<Segment>(),
        [2, 3, 4].into_iter().map(id).collect::<Segment>(),
    ];

    let by_pred = SegmentedView::with_identity(&index, &segments, |v| v.clone()).unwrap();
    let by_view = SegmentedView::restricted(&index, &segments).unwrap();
    let expected = vec![id(2), id(3)];
    assert_eq!(by_pred.lookup(b"k0").unwrap().collect::<Vec<_>>(), expected);
    assert_eq!(by_view.lookup(b"k0").unwrap().collect::<Vec<_>>(), expected);
}
