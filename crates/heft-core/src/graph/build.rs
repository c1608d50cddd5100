//! Graph construction from path records.
//!
//! # Overview
//!
//! [`build`] indexes every record as a node, resolves each reference into a
//! directed edge, and rejects the input unless it forms a complete DAG:
//!
//! 1. **Duplicates**: two records with the same id fail with
//!    [`GraphError::DuplicateNode`].
//! 2. **Dangling references**: a reference to an id with no record fails with
//!    [`GraphError::DanglingReference`] naming both ids.
//! 3. **Cycles**: a failed topological sort fails with
//!    [`GraphError::CycleDetected`] naming the members of the offending cycle.
//!
//! Exclusive sizes must sum to at most `u64::MAX` ([`GraphError::SizeOverflow`]
//! otherwise). Every closure is a subset of the graph, so downstream size sums
//! cannot overflow either.
//!
//! The forward edges and the reverse `dependents` index are populated in the
//! same pass.
//!
//! ## Content Hash
//!
//! The graph carries a BLAKE3 hash of its sorted node/size/edge set. Two runs
//! over identical store snapshots produce identical hashes regardless of the
//! order the records arrived in.

#![allow(clippy::module_name_repetitions)]

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, instrument};

use crate::error::GraphError;
use crate::graph::cycles::cycle_error;
use crate::record::{NodeId, PathRecord};

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// One store path inside a [`ClosureGraph`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Store path.
    pub id: NodeId,
    /// Bytes occupied by this path alone.
    pub exclusive_size: u64,
}

// ---------------------------------------------------------------------------
// ClosureGraph
// ---------------------------------------------------------------------------

/// A validated dependency DAG over one store closure.
///
/// Node indices follow input record order, which is the reference order for
/// every stable sort downstream. The graph is never mutated after [`build`].
#[derive(Debug, Clone)]
pub struct ClosureGraph {
    graph: DiGraph<Node, ()>,
    node_map: HashMap<NodeId, NodeIndex>,
    /// Reverse edges: `dependents[i]` lists the nodes that reference node `i`,
    /// in ascending index order.
    dependents: Vec<Vec<NodeIndex>>,
    /// Forward edges in ascending index order.
    dependencies: Vec<Vec<NodeIndex>>,
    /// Dependents before dependencies.
    topo_order: Vec<NodeIndex>,
    content_hash: String,
}

impl ClosureGraph {
    /// Return the number of nodes (store paths) in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Return the number of edges (references) in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Return `true` when the closure holds no paths.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Look up the `NodeIndex` for a store path.
    #[must_use]
    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.node_map.get(id).copied()
    }

    /// Node stored at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` does not belong to this graph.
    #[must_use]
    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.graph[idx]
    }

    /// Node for a store path, if present.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.node_index(id).map(|idx| &self.graph[idx])
    }

    /// Direct dependencies of `idx`, in input order.
    #[must_use]
    pub fn dependencies(&self, idx: NodeIndex) -> &[NodeIndex] {
        &self.dependencies[idx.index()]
    }

    /// Direct dependents of `idx` (paths referencing it), in input order.
    #[must_use]
    pub fn dependents(&self, idx: NodeIndex) -> &[NodeIndex] {
        &self.dependents[idx.index()]
    }

    /// Nodes that nothing else in the closure references.
    pub fn roots(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph
            .node_indices()
            .filter(|idx| self.dependents[idx.index()].is_empty())
    }

    /// Topological order: every node appears before all of its dependencies.
    #[must_use]
    pub fn topo_order(&self) -> &[NodeIndex] {
        &self.topo_order
    }

    /// Iterate nodes in input order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &Node)> + '_ {
        self.graph
            .node_indices()
            .map(move |idx| (idx, &self.graph[idx]))
    }

    /// Sum of exclusive sizes over the whole closure. [`build`] guarantees it
    /// fits in a `u64`.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx].exclusive_size)
            .sum()
    }

    /// BLAKE3 fingerprint of the node/size/edge set.
    #[must_use]
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Underlying petgraph graph.
    #[must_use]
    pub const fn inner(&self) -> &DiGraph<Node, ()> {
        &self.graph
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Build a validated [`ClosureGraph`] from store path records.
///
/// # Errors
///
/// - [`GraphError::DuplicateNode`] when two records share an id.
/// - [`GraphError::DanglingReference`] for the first reference (in input
///   order) that names a path with no record.
/// - [`GraphError::CycleDetected`] when references form a cycle, including a
///   path referencing itself.
#[instrument(skip_all, fields(records = records.len()))]
pub fn build(records: Vec<PathRecord>) -> Result<ClosureGraph, GraphError> {
    let mut graph = DiGraph::<Node, ()>::with_capacity(records.len(), records.len());
    let mut node_map: HashMap<NodeId, NodeIndex> = HashMap::with_capacity(records.len());

    // Step 1: one node per record, in input order.
    let mut pending: Vec<(NodeIndex, Vec<NodeId>)> = Vec::with_capacity(records.len());
    let mut total_size: u64 = 0;
    for record in records {
        if node_map.contains_key(&record.id) {
            return Err(GraphError::DuplicateNode(record.id));
        }
        total_size = total_size
            .checked_add(record.size)
            .ok_or_else(|| GraphError::SizeOverflow(record.id.clone()))?;
        let idx = graph.add_node(Node {
            id: record.id.clone(),
            exclusive_size: record.size,
        });
        node_map.insert(record.id, idx);
        pending.push((idx, record.references.into_iter().collect()));
    }

    // Step 2: resolve references into edges plus the reverse index.
    let mut dependencies: Vec<Vec<NodeIndex>> = vec![Vec::new(); graph.node_count()];
    let mut dependents: Vec<Vec<NodeIndex>> = vec![Vec::new(); graph.node_count()];

    for (from, references) in pending {
        for reference in references {
            let Some(&to) = node_map.get(&reference) else {
                return Err(GraphError::DanglingReference {
                    missing: reference,
                    from: graph[from].id.clone(),
                });
            };
            graph.add_edge(from, to, ());
            dependencies[from.index()].push(to);
            dependents[to.index()].push(from);
        }
    }

    for list in dependencies.iter_mut().chain(dependents.iter_mut()) {
        list.sort_unstable();
    }

    // Step 3: reject cycles.
    let topo_order =
        toposort(&graph, None).map_err(|cycle| cycle_error(&graph, cycle.node_id()))?;

    let content_hash = compute_content_hash(&graph);

    debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        %content_hash,
        "closure graph built"
    );

    Ok(ClosureGraph {
        graph,
        node_map,
        dependents,
        dependencies,
        topo_order,
        content_hash,
    })
}

/// Compute a BLAKE3 hash of the sorted node/size/edge listing.
fn compute_content_hash(graph: &DiGraph<Node, ()>) -> String {
    let mut entries: Vec<(&str, u64, Vec<&str>)> = graph
        .node_indices()
        .map(|idx| {
            let mut deps: Vec<&str> = graph
                .neighbors(idx)
                .map(|dep| graph[dep].id.as_str())
                .collect();
            deps.sort_unstable();
            (graph[idx].id.as_str(), graph[idx].exclusive_size, deps)
        })
        .collect();
    entries.sort_unstable();

    let mut hasher = blake3::Hasher::new();
    for (id, size, deps) in entries {
        hasher.update(id.as_bytes());
        hasher.update(b"\x00");
        hasher.update(&size.to_le_bytes());
        for dep in deps {
            hasher.update(dep.as_bytes());
            hasher.update(b"\x00");
        }
        hasher.update(b"\x01");
    }
    format!("blake3:{}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
