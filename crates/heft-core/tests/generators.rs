//! Random closure generators shared by property tests.

#![allow(dead_code)]

use heft_core::PathRecord;
use proptest::prelude::*;

/// Id for the `i`-th generated path.
pub fn path_id(i: usize) -> String {
    format!("/nix/store/{i:032}-pkg-{i}")
}

/// Records forming a DAG: path `i` may only reference paths `j > i`.
pub fn records_from(sizes: &[u64], edges: &[Vec<bool>]) -> Vec<PathRecord> {
    sizes
        .iter()
        .enumerate()
        .map(|(i, &size)| {
            let refs = (i + 1..sizes.len())
                .filter(|&j| edges[i][j])
                .map(path_id);
            PathRecord::new(path_id(i), size).with_references(refs)
        })
        .collect()
}

/// Random acyclic closure with up to `max_nodes` paths.
pub fn arb_closure(max_nodes: usize) -> impl Strategy<Value = Vec<PathRecord>> {
    (1..=max_nodes).prop_flat_map(|n| {
        (
            prop::collection::vec(0u64..100_000, n),
            prop::collection::vec(prop::collection::vec(prop::bool::weighted(0.25), n), n),
        )
            .prop_map(|(sizes, edges)| records_from(&sizes, &edges))
    })
}
