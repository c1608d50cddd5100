//! End-to-end analysis: records in, ranked report out.

use tracing::{info, instrument};

use crate::attribute::{ApportionPolicy, AttributionTable, attribute_with};
use crate::config::HeftConfig;
use crate::error::GraphError;
use crate::graph::{ClosureGraph, GraphStats, build};
use crate::record::PathRecord;
use crate::report::{Report, SortKey, SortOrder, assemble};

/// Knobs for one [`analyze`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub sort_key: SortKey,
    pub order: SortOrder,
    pub policy: ApportionPolicy,
}

impl AnalysisOptions {
    /// Options taken from a loaded config.
    #[must_use]
    pub const fn from_config(config: &HeftConfig) -> Self {
        Self {
            sort_key: config.report.sort,
            order: config.report.order,
            policy: config.attribution.policy,
        }
    }
}

/// Everything produced by one analysis.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub graph: ClosureGraph,
    pub table: AttributionTable,
    pub report: Report,
    pub stats: GraphStats,
}

/// Build, attribute and rank a closure.
///
/// # Errors
///
/// Returns a [`GraphError`] when the records do not form a valid DAG. No
/// partial results are produced in that case.
#[instrument(skip_all, fields(records = records.len(), policy = %options.policy))]
pub fn analyze(
    records: Vec<PathRecord>,
    options: &AnalysisOptions,
) -> Result<Analysis, GraphError> {
    let graph = build(records)?;
    let stats = GraphStats::from_graph(&graph);
    let table = attribute_with(&graph, options.policy);
    let report = assemble(&table, options.sort_key, options.order);

    info!(
        nodes = stats.node_count,
        edges = stats.edge_count,
        total_size = stats.total_size,
        hash = graph.content_hash(),
        "closure analyzed"
    );

    Ok(Analysis {
        graph,
        table,
        report,
        stats,
    })
}
