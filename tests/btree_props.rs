//! Property tests: scan output against a model multiset.

use std::sync::Arc;

use proptest::prelude::*;
use tempfile::tempdir;
use treeline::index::btree::{BTree, DeletePolicy, Key, KeyType};
use treeline::{BufferPoolManager, DiskManager, PageId, RecordId, Result};

fn build_tree(pairs: &[(i32, u32)]) -> (BTree, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("prop.tln");
    let dm = DiskManager::create(&path).unwrap();
    let bpm = Arc::new(BufferPoolManager::new(32, dm));
    let mut tree = BTree::open_or_create(
        bpm,
        "p",
        KeyType::Int,
        4,
        DeletePolicy::Naive,
    )
    .unwrap();
    for &(k, r) in pairs {
        tree.insert(&Key::Int(k), rid(r)).unwrap();
    }
    (tree, dir)
}

fn rid(n: u32) -> RecordId {
    RecordId::new(PageId::new(n), (n % 1000) as u16)
}

fn scan_pairs(tree: &mut BTree, lo: Option<i32>, hi: Option<i32>) -> Vec<(i32, u32)> {
    let lo = lo.map(Key::Int);
    let hi = hi.map(Key::Int);
    tree.scan(lo.as_ref(), hi.as_ref())
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap()
        .into_iter()
        .map(|(k, r)| match k {
            Key::Int(k) => (k, r.page.0),
            Key::Str(_) => unreachable!("integer tree"),
        })
        .collect()
}

fn sorted(mut pairs: Vec<(i32, u32)>) -> Vec<(i32, u32)> {
    pairs.sort_unstable();
    pairs
}

/// Pairs with distinct record ids; keys drawn from a small range so
/// duplicates are common.
fn pairs_strategy() -> impl Strategy<Value = Vec<(i32, u32)>> {
    prop::collection::vec(-50i32..50, 0..400)
        .prop_map(|keys| keys.into_iter().zip(0u32..).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn full_scan_is_the_sorted_multiset_of_inserts(pairs in pairs_strategy()) {
        let (mut tree, _dir) = build_tree(&pairs);

        let got = scan_pairs(&mut tree, None, None);

        // Keys non-decreasing
        for window in got.windows(2) {
            prop_assert!(window[0].0 <= window[1].0);
        }
        // Same multiset, duplicates preserved
        prop_assert_eq!(sorted(got), sorted(pairs));
    }

    #[test]
    fn bounded_scan_is_the_filtered_range(
        pairs in pairs_strategy(),
        lo in -60i32..60,
        width in 0i32..60,
    ) {
        let hi = lo.saturating_add(width);
        let (mut tree, _dir) = build_tree(&pairs);

        let got = scan_pairs(&mut tree, Some(lo), Some(hi));

        for window in got.windows(2) {
            prop_assert!(window[0].0 <= window[1].0);
        }
        let expected: Vec<_> = pairs
            .iter()
            .copied()
            .filter(|&(k, _)| lo <= k && k <= hi)
            .collect();
        prop_assert_eq!(sorted(got), sorted(expected));
    }

    #[test]
    fn delete_removes_exactly_the_targeted_pair(
        pairs in pairs_strategy().prop_filter("need one entry", |p| !p.is_empty()),
        pick in any::<prop::sample::Index>(),
    ) {
        let (mut tree, _dir) = build_tree(&pairs);
        let (k, r) = pairs[pick.index(pairs.len())];

        prop_assert!(tree.delete(&Key::Int(k), rid(r)).unwrap());

        let mut expected = pairs.clone();
        let victim = expected.iter().position(|&p| p == (k, r)).unwrap();
        expected.remove(victim);
        prop_assert_eq!(sorted(scan_pairs(&mut tree, None, None)), sorted(expected));
    }

    #[test]
    fn delete_of_absent_pair_is_a_reported_noop(pairs in pairs_strategy()) {
        let (mut tree, _dir) = build_tree(&pairs);

        // Record ids in the tree are < pairs.len(); this one never was
        let absent = rid(u32::MAX);
        prop_assert!(!tree.delete(&Key::Int(0), absent).unwrap());

        prop_assert_eq!(sorted(scan_pairs(&mut tree, None, None)), sorted(pairs));
    }
}
