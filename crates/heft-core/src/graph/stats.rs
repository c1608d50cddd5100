//! Summary statistics for a closure graph.
//!
//! # Statistics Provided
//!
//! - **node_count** / **edge_count**: paths and references in the closure.
//! - **root_count**: paths nothing else references (usually one: the target).
//! - **leaf_count**: paths with no references of their own.
//! - **max_level**: depth of the deepest path below a root (see
//!   [`levels`](super::levels::levels)).
//! - **max_in_degree**: most dependents of a single path.
//! - **max_out_degree**: most direct references from a single path.
//! - **total_size**: sum of exclusive sizes, i.e. the real on-disk cost of the
//!   whole closure with every shared path counted once.

use serde::Serialize;

use super::build::ClosureGraph;
use super::levels::levels;

/// Summary statistics for a [`ClosureGraph`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub root_count: usize,
    pub leaf_count: usize,
    pub max_level: usize,
    pub max_in_degree: usize,
    pub max_out_degree: usize,
    pub total_size: u64,
}

impl GraphStats {
    /// Compute statistics from a validated graph.
    #[must_use]
    pub fn from_graph(graph: &ClosureGraph) -> Self {
        let indices = || graph.iter().map(|(idx, _)| idx);

        Self {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            root_count: graph.roots().count(),
            leaf_count: indices()
                .filter(|&idx| graph.dependencies(idx).is_empty())
                .count(),
            max_level: levels(graph).into_iter().max().unwrap_or(0),
            max_in_degree: indices()
                .map(|idx| graph.dependents(idx).len())
                .max()
                .unwrap_or(0),
            max_out_degree: indices()
                .map(|idx| graph.dependencies(idx).len())
                .max()
                .unwrap_or(0),
            total_size: graph.total_size(),
        }
    }
}
