//! Size attribution over a closure graph.
//!
//! # Definitions
//!
//! | Term             | Definition |
//! |------------------|------------|
//! | `exclusive_size` | Bytes of the path itself. |
//! | `reach(n)`       | `n` plus every path reachable from `n` through references. |
//! | `closure_size`   | Sum of `exclusive_size` over `reach(n)`; each path counted once. |
//! | `A(n)`           | Ancestors of `n`: `n` plus every path whose closure contains `n`. |
//! | `shared_size`    | Sum of the shares of every path `m` with `n ∈ A(m)`. |
//!
//! # Algorithm
//!
//! 1. Walk the graph in **reverse topological order** (dependencies first)
//!    and memoize `reach(n)` as a [`FixedBitSet`] indexed by node index:
//!    `reach(n) = {n} ∪ ⋃ reach(dep)`. Unioning sets instead of adding child
//!    closure sizes keeps diamond dependencies from being counted twice.
//! 2. Walk in **topological order** (dependents first) over the reverse
//!    `dependents` index and memoize `A(n) = {n} ∪ ⋃ A(parent)` the same way.
//! 3. For every node `n`, split `exclusive_size(n)` across `A(n)` according
//!    to the [`ApportionPolicy`] and add each share to the member's
//!    accumulator.
//!
//! Every node hands out exactly its own exclusive size, so the sum of
//! `shared_size` over the table equals the sum of `exclusive_size` up to
//! floating-point rounding.
//!
//! # Numeric semantics
//!
//! Accumulators are `f64` and are never rounded. Display code rounds shared
//! sizes to three fractional digits ([`format_shared`]).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use fixedbitset::FixedBitSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::graph::ClosureGraph;
use crate::record::NodeId;

// ---------------------------------------------------------------------------
// ApportionPolicy
// ---------------------------------------------------------------------------

/// How a path's exclusive size is split among its ancestors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum ApportionPolicy {
    /// Every member of `A(n)` receives `exclusive(n) / |A(n)|`.
    #[default]
    Equal,
    /// Member `a` receives `exclusive(n) * exclusive(a) / Σ exclusive(A(n))`.
    ///
    /// `n` itself is in `A(n)`, so the denominator is never zero for a node
    /// with bytes to hand out. Empty ancestors (e.g. wrapper paths) get nothing.
    ExclusiveWeighted,
}

impl ApportionPolicy {
    /// Stable name used in config files and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::ExclusiveWeighted => "exclusive-weighted",
        }
    }
}

impl fmt::Display for ApportionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApportionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "equal" => Ok(Self::Equal),
            "exclusive-weighted" | "weighted" => Ok(Self::ExclusiveWeighted),
            other => Err(format!(
                "unknown apportion policy '{other}' (expected 'equal' or 'exclusive-weighted')"
            )),
        }
    }
}

impl TryFrom<String> for ApportionPolicy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Attribution
// ---------------------------------------------------------------------------

/// Computed sizes for one path. Read-only report row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribution {
    /// Store path.
    pub id: NodeId,
    /// Bytes of the path itself.
    pub exclusive_size: u64,
    /// Bytes of the path plus everything it transitively references.
    pub closure_size: u64,
    /// This path's share of the closure's storage.
    pub shared_size: f64,
    /// `|reach(n)|`: paths in this path's closure, itself included.
    pub closure_count: usize,
    /// `|A(n)|`: paths whose closure includes this one, itself included.
    pub ancestor_count: usize,
}

/// Format a shared size for display: three fractional digits.
#[must_use]
pub fn format_shared(value: f64) -> String {
    format!("{value:.3}")
}

// ---------------------------------------------------------------------------
// AttributionTable
// ---------------------------------------------------------------------------

/// One [`Attribution`] per graph node, in graph (input) order.
#[derive(Debug, Clone, Default)]
pub struct AttributionTable {
    rows: Vec<Attribution>,
    index: HashMap<NodeId, usize>,
    policy: ApportionPolicy,
}

impl AttributionTable {
    /// Rows in graph order.
    #[must_use]
    pub fn rows(&self) -> &[Attribution] {
        &self.rows
    }

    /// Consume the table, yielding rows in graph order.
    #[must_use]
    pub fn into_rows(self) -> Vec<Attribution> {
        self.rows
    }

    /// Attribution for a store path.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Attribution> {
        self.index.get(id).map(|&i| &self.rows[i])
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Return `true` when the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Policy the shared sizes were computed with.
    #[must_use]
    pub const fn policy(&self) -> ApportionPolicy {
        self.policy
    }

    /// Sum of exclusive sizes.
    #[must_use]
    pub fn total_exclusive(&self) -> u64 {
        self.rows.iter().map(|row| row.exclusive_size).sum()
    }

    /// Sum of shared sizes. Equals [`Self::total_exclusive`] up to rounding.
    #[must_use]
    pub fn total_shared(&self) -> f64 {
        self.rows.iter().map(|row| row.shared_size).sum()
    }
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Attribute sizes with the default [`ApportionPolicy::Equal`] policy.
#[must_use]
pub fn attribute(graph: &ClosureGraph) -> AttributionTable {
    attribute_with(graph, ApportionPolicy::default())
}

/// Attribute sizes to every node of `graph` using `policy`.
///
/// Total over a validated graph: this never fails.
#[instrument(skip(graph), fields(nodes = graph.node_count()))]
#[allow(clippy::cast_precision_loss)]
pub fn attribute_with(graph: &ClosureGraph, policy: ApportionPolicy) -> AttributionTable {
    let n = graph.node_count();
    let sizes: Vec<u64> = graph.iter().map(|(_, node)| node.exclusive_size).collect();

    let reach = reachable_sets(graph);
    let ancestors = ancestor_sets(graph);

    let mut shared = vec![0.0f64; n];
    for (i, members) in ancestors.iter().enumerate() {
        let size = sizes[i];
        if size == 0 {
            continue;
        }
        let size = size as f64;

        match policy {
            ApportionPolicy::Equal => {
                let share = size / members.count_ones(..) as f64;
                for a in members.ones() {
                    shared[a] += share;
                }
            }
            ApportionPolicy::ExclusiveWeighted => {
                let weight_total: u64 = members.ones().map(|a| sizes[a]).sum();
                let weight_total = weight_total as f64;
                for a in members.ones() {
                    shared[a] += size * (sizes[a] as f64) / weight_total;
                }
            }
        }
    }

    let mut rows = Vec::with_capacity(n);
    let mut index = HashMap::with_capacity(n);
    for (idx, node) in graph.iter() {
        let i = idx.index();
        let closure_size = reach[i].ones().map(|j| sizes[j]).sum();
        index.insert(node.id.clone(), rows.len());
        rows.push(Attribution {
            id: node.id.clone(),
            exclusive_size: node.exclusive_size,
            closure_size,
            shared_size: shared[i],
            closure_count: reach[i].count_ones(..),
            ancestor_count: ancestors[i].count_ones(..),
        });
    }

    let table = AttributionTable {
        rows,
        index,
        policy,
    };

    debug!(
        %policy,
        total_exclusive = table.total_exclusive(),
        total_shared = table.total_shared(),
        "sizes attributed"
    );

    table
}

/// `reach(n)` for every node, memoized dependencies-first.
fn reachable_sets(graph: &ClosureGraph) -> Vec<FixedBitSet> {
    let n = graph.node_count();
    let mut reach = vec![FixedBitSet::new(); n];

    for &idx in graph.topo_order().iter().rev() {
        let mut set = FixedBitSet::with_capacity(n);
        set.insert(idx.index());
        for dep in graph.dependencies(idx) {
            set.union_with(&reach[dep.index()]);
        }
        reach[idx.index()] = set;
    }

    reach
}

/// `A(n)` for every node, memoized dependents-first over the reverse index.
fn ancestor_sets(graph: &ClosureGraph) -> Vec<FixedBitSet> {
    let n = graph.node_count();
    let mut ancestors = vec![FixedBitSet::new(); n];

    for &idx in graph.topo_order() {
        let mut set = FixedBitSet::with_capacity(n);
        set.insert(idx.index());
        for parent in graph.dependents(idx) {
            set.union_with(&ancestors[parent.index()]);
        }
        ancestors[idx.index()] = set;
    }

    ancestors
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build;
    use crate::record::PathRecord;

    const EPS: f64 = 1e-9;

    fn rec(id: &str, size: u64, refs: &[&str]) -> PathRecord {
        PathRecord::new(id, size).with_references(refs.iter().copied())
    }

    fn table(records: Vec<PathRecord>, policy: ApportionPolicy) -> AttributionTable {
        attribute_with(&build(records).expect("build graph"), policy)
    }

    fn row<'a>(table: &'a AttributionTable, id: &str) -> &'a Attribution {
        table.get(id).expect("row present")
    }

    #[test]
    fn empty_graph_yields_empty_table() {
        let table = attribute(&build(Vec::new()).expect("build graph"));
        assert!(table.is_empty());
        assert_eq!(table.total_exclusive(), 0);
    }

    #[test]
    fn leaf_closure_is_its_own_size() {
        let table = table(vec![rec("solo", 42, &[])], ApportionPolicy::Equal);
        let solo = row(&table, "solo");
        assert_eq!(solo.closure_size, 42);
        assert!((solo.shared_size - 42.0).abs() < EPS);
        assert_eq!(solo.ancestor_count, 1);
    }

    #[test]
    fn shared_leaf_split_across_two_parents() {
        let table = table(
            vec![rec("a", 10, &["c"]), rec("b", 20, &["c"]), rec("c", 5, &[])],
            ApportionPolicy::Equal,
        );

        assert_eq!(row(&table, "a").closure_size, 15);
        assert_eq!(row(&table, "b").closure_size, 25);
        assert_eq!(row(&table, "c").closure_size, 5);

        let third = 5.0 / 3.0;
        assert!((row(&table, "a").shared_size - (10.0 + third)).abs() < EPS);
        assert!((row(&table, "b").shared_size - (20.0 + third)).abs() < EPS);
        assert!((row(&table, "c").shared_size - third).abs() < EPS);
        assert!((table.total_shared() - 35.0).abs() < EPS);
    }

    #[test]
    fn diamond_counts_shared_dependency_once() {
        let table = table(
            vec![
                rec("top", 1, &["left", "right"]),
                rec("left", 2, &["base"]),
                rec("right", 4, &["base"]),
                rec("base", 8, &[]),
            ],
            ApportionPolicy::Equal,
        );
        assert_eq!(row(&table, "top").closure_size, 15);
        assert_eq!(row(&table, "top").closure_count, 4);
        assert_eq!(row(&table, "base").ancestor_count, 4);
    }

    #[test]
    fn chain_leaf_split_over_every_ancestor() {
        let table = table(
            vec![rec("a", 0, &["b"]), rec("b", 0, &["c"]), rec("c", 9, &[])],
            ApportionPolicy::Equal,
        );
        for id in ["a", "b", "c"] {
            assert!((row(&table, id).shared_size - 3.0).abs() < EPS, "{id}");
        }
    }

    #[test]
    fn weighted_policy_follows_ancestor_sizes() {
        let table = table(
            vec![rec("a", 10, &["c"]), rec("b", 30, &["c"]), rec("c", 8, &[])],
            ApportionPolicy::ExclusiveWeighted,
        );
        // c's 8 bytes split 10:30:8 over {a, b, c}.
        assert!((row(&table, "a").shared_size - (10.0 + 8.0 * 10.0 / 48.0)).abs() < EPS);
        assert!((row(&table, "b").shared_size - (30.0 + 8.0 * 30.0 / 48.0)).abs() < EPS);
        assert!((row(&table, "c").shared_size - 8.0 * 8.0 / 48.0).abs() < EPS);
        assert!((table.total_shared() - 48.0).abs() < EPS);
        assert_eq!(table.policy(), ApportionPolicy::ExclusiveWeighted);
    }

    #[test]
    fn weighted_policy_gives_nothing_to_empty_ancestors() {
        let table = table(
            vec![rec("meta", 0, &["data"]), rec("data", 6, &[])],
            ApportionPolicy::ExclusiveWeighted,
        );
        assert!(row(&table, "meta").shared_size.abs() < EPS);
        assert!((row(&table, "data").shared_size - 6.0).abs() < EPS);

        let equal = table_for_equal();
        assert!((row(&equal, "meta").shared_size - 3.0).abs() < EPS);
        assert!((row(&equal, "data").shared_size - 3.0).abs() < EPS);
    }

    fn table_for_equal() -> AttributionTable {
        table(
            vec![rec("meta", 0, &["data"]), rec("data", 6, &[])],
            ApportionPolicy::Equal,
        )
    }

    #[test]
    fn policy_parses_from_config_spellings() {
        assert_eq!("equal".parse::<ApportionPolicy>(), Ok(ApportionPolicy::Equal));
        assert_eq!(
            "exclusive_weighted".parse::<ApportionPolicy>(),
            Ok(ApportionPolicy::ExclusiveWeighted)
        );
        assert!("median".parse::<ApportionPolicy>().is_err());
    }

    #[test]
    fn shared_display_rounds_to_three_digits() {
        assert_eq!(format_shared(5.0 / 3.0), "1.667");
        assert_eq!(format_shared(10.0), "10.000");
    }
}
