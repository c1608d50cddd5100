//! Level assignment for layered drawing.
//!
//! A node's level is the length of the longest chain of dependents above it:
//! roots sit at level 0, and every path sits strictly below everything that
//! references it. Graphviz exports pin each level to one rank so the closure
//! reads top-down.

use super::build::ClosureGraph;

/// Compute the level of every node, indexed by `NodeIndex::index()`.
#[must_use]
pub fn levels(graph: &ClosureGraph) -> Vec<usize> {
    let mut levels = vec![0usize; graph.node_count()];

    // Topological order visits every dependent before its dependencies.
    for &idx in graph.topo_order() {
        let level = graph
            .dependents(idx)
            .iter()
            .map(|parent| levels[parent.index()] + 1)
            .max()
            .unwrap_or(0);
        levels[idx.index()] = level;
    }

    levels
}
