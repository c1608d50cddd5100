//! Cycle reporting for reference graphs that fail topological sorting.
//!
//! A store closure is a DAG by construction, so a cycle means the snapshot
//! is corrupt or hand-edited. Diagnostics name every member of the strongly
//! connected component (SCC) holding the cycle, not just the node where the
//! sort gave up.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::GraphError;
use crate::graph::build::Node;
use crate::record::NodeId;

/// Find all cycles present in `graph`.
///
/// Each entry is a sorted list of ids in one strongly connected component.
/// Self-references are reported as a one-element cycle. The outer list is
/// sorted as well so diagnostics are stable across runs.
#[must_use]
pub fn find_cycles(graph: &DiGraph<Node, ()>) -> Vec<Vec<NodeId>> {
    let mut cycles: Vec<Vec<NodeId>> = cyclic_components(graph)
        .into_iter()
        .map(|component| sorted_ids(graph, &component))
        .collect();

    cycles.sort_unstable();
    cycles
}

/// Build the [`GraphError::CycleDetected`] for a failed topological sort.
///
/// `detected_at` is the node the sort stopped on. The reported members are
/// those of the cyclic SCC containing it, falling back to the smallest cyclic
/// SCC when the sort stopped on a node that only leads into a cycle.
pub(crate) fn cycle_error(graph: &DiGraph<Node, ()>, detected_at: NodeIndex) -> GraphError {
    let detected = &graph[detected_at].id;
    let mut cycles = find_cycles(graph);

    // `find_cycles` is sorted, so index 0 is the smallest cycle.
    let members = if cycles.is_empty() {
        vec![detected.clone()]
    } else {
        let position = cycles
            .iter()
            .position(|members| members.contains(detected))
            .unwrap_or(0);
        cycles.swap_remove(position)
    };

    let example = members.first().cloned().unwrap_or_else(|| detected.clone());

    GraphError::CycleDetected { example, members }
}

fn cyclic_components(graph: &DiGraph<Node, ()>) -> Vec<Vec<NodeIndex>> {
    tarjan_scc(graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1
                || component
                    .first()
                    .is_some_and(|node| has_self_loop(graph, *node))
        })
        .collect()
}

#[must_use]
fn has_self_loop(graph: &DiGraph<Node, ()>, node: NodeIndex) -> bool {
    graph.find_edge(node, node).is_some()
}

fn sorted_ids(graph: &DiGraph<Node, ()>, component: &[NodeIndex]) -> Vec<NodeId> {
    let mut ids: Vec<NodeId> = component.iter().map(|&idx| graph[idx].id.clone()).collect();
    ids.sort_unstable();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_from(nodes: &[&str], edges: &[(&str, &str)]) -> DiGraph<Node, ()> {
        let mut graph = DiGraph::new();
        let idx: Vec<NodeIndex> = nodes
            .iter()
            .map(|id| {
                graph.add_node(Node {
                    id: NodeId::from(*id),
                    exclusive_size: 1,
                })
            })
            .collect();
        let position = |id: &str| nodes.iter().position(|n| *n == id).expect("known node");
        for (a, b) in edges {
            graph.add_edge(idx[position(a)], idx[position(b)], ());
        }
        graph
    }

    fn ids(list: &[&str]) -> Vec<NodeId> {
        list.iter().map(|id| NodeId::from(*id)).collect()
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let graph = graph_from(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("a", "c")]);
        assert!(find_cycles(&graph).is_empty());
    }

    #[test]
    fn reports_each_cycle_sorted() {
        let graph = graph_from(
            &["d", "c", "b", "a", "x"],
            &[("a", "b"), ("b", "a"), ("d", "c"), ("c", "d"), ("x", "a")],
        );
        assert_eq!(find_cycles(&graph), vec![ids(&["a", "b"]), ids(&["c", "d"])]);
    }

    #[test]
    fn self_loop_is_a_single_member_cycle() {
        let graph = graph_from(&["a"], &[("a", "a")]);
        assert_eq!(find_cycles(&graph), vec![ids(&["a"])]);
    }

    #[test]
    fn cycle_error_prefers_component_of_detected_node() {
        let graph = graph_from(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("b", "a"), ("c", "d"), ("d", "c")],
        );
        let err = cycle_error(&graph, NodeIndex::new(3));
        assert_eq!(
            err,
            GraphError::CycleDetected {
                example: NodeId::from("c"),
                members: ids(&["c", "d"]),
            }
        );
    }

    #[test]
    fn cycle_error_falls_back_to_smallest_cycle() {
        let graph = graph_from(&["entry", "b", "a"], &[("entry", "a"), ("a", "b"), ("b", "a")]);
        let err = cycle_error(&graph, NodeIndex::new(0));
        assert_eq!(
            err,
            GraphError::CycleDetected {
                example: NodeId::from("a"),
                members: ids(&["a", "b"]),
            }
        );
    }
}
