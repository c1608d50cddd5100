//! Graphviz export of a ranked report.
//!
//! Every report row becomes one node labeled with its short name and
//! exclusive size; every reference between two exported rows becomes an arc
//! from dependent to dependency.
//!
//! Large closures turn into an unreadable hairball under the default dot
//! layout, so two optional presentation aids are available:
//!
//! - **styling**: fixed-size nodes scaled between 0.2 and 2.2 inches by
//!   exclusive size, thin arcs.
//! - **rank levels**: nodes of the same [level](crate::graph::levels) are
//!   pinned to one rank in chunks of [`RANK_CHUNK`], and the chunks are
//!   chained with invisible arcs so levels stack top-down.

use std::collections::HashMap;
use std::io::{self, Write};

use petgraph::graph::NodeIndex;

use crate::graph::{ClosureGraph, levels};
use crate::record::{StoreLayout, short_names};
use crate::report::{Report, human_size};

/// Maximum number of nodes pinned to one rank subgraph.
pub const RANK_CHUNK: usize = 20;

/// Presentation switches for [`write_dot`].
#[derive(Debug, Clone)]
pub struct DotOptions {
    /// Scale node size by exclusive size.
    pub styled: bool,
    /// Pin nodes of equal level to the same rank.
    pub rank_levels: bool,
    /// Store layout used to derive node labels.
    pub layout: StoreLayout,
}

impl Default for DotOptions {
    fn default() -> Self {
        Self {
            styled: true,
            rank_levels: true,
            layout: StoreLayout::default(),
        }
    }
}

/// Write `report` as a Graphviz digraph, taking arcs from `graph`.
///
/// Rows are emitted in report order. Arcs to paths missing from the report
/// (e.g. a truncated top-N report) are skipped.
///
/// # Errors
///
/// Returns any error raised by the underlying writer.
pub fn write_dot<W: Write>(
    report: &Report,
    graph: &ClosureGraph,
    options: &DotOptions,
    out: &mut W,
) -> io::Result<()> {
    let exported: Vec<NodeIndex> = report
        .rows
        .iter()
        .filter_map(|row| graph.node_index(row.id.as_str()))
        .collect();
    let name_of: HashMap<NodeIndex, usize> = exported
        .iter()
        .enumerate()
        .map(|(position, &idx)| (idx, position))
        .collect();

    let labels = short_names(report.rows.iter().map(|row| &row.id), &options.layout);
    let (min_size, max_size) = size_bounds(report);

    writeln!(out, "digraph closure {{")?;

    for (position, row) in report.rows.iter().enumerate() {
        let label = labels
            .get(&row.id)
            .map_or(row.id.as_str(), String::as_str);
        let mut attrs = vec![
            format!(
                "label = \"{}\\n{}\"",
                escape(label),
                human_size(row.exclusive_size)
            ),
            format!("tooltip = \"{}\"", escape(row.id.as_str())),
        ];
        if options.styled {
            let extent = node_extent(row.exclusive_size, min_size, max_size);
            attrs.push(format!(
                "fixedsize = true, height = {extent:.3}, width = {extent:.3}, penwidth = 2"
            ));
        }
        writeln!(out, "  n{position} [{}];", attrs.join(", "))?;
    }

    let edge_attrs = if options.styled { " [penwidth = 0.5]" } else { "" };
    for (position, &idx) in exported.iter().enumerate() {
        for dep in graph.dependencies(idx) {
            if let Some(target) = name_of.get(dep) {
                writeln!(out, "  n{position} -> n{target}{edge_attrs};")?;
            }
        }
    }

    if options.rank_levels {
        write_rank_levels(graph, &exported, out)?;
    }

    writeln!(out, "}}")?;
    out.flush()
}

fn write_rank_levels<W: Write>(
    graph: &ClosureGraph,
    exported: &[NodeIndex],
    out: &mut W,
) -> io::Result<()> {
    let levels = levels(graph);
    let depth = exported
        .iter()
        .map(|idx| levels[idx.index()] + 1)
        .max()
        .unwrap_or(0);

    let mut by_level: Vec<Vec<usize>> = vec![Vec::new(); depth];
    for (position, idx) in exported.iter().enumerate() {
        by_level[levels[idx.index()]].push(position);
    }

    let mut anchors: Vec<String> = Vec::new();
    for (level, members) in by_level.iter().enumerate() {
        for (sublevel, chunk) in members.chunks(RANK_CHUNK).enumerate() {
            let anchor = format!("level_{level}_{sublevel}");
            let names: Vec<String> = chunk.iter().map(|p| format!("n{p};")).collect();
            writeln!(out, "  subgraph {anchor} {{")?;
            writeln!(out, "    rank = same;")?;
            writeln!(out, "    {}", names.join(" "))?;
            writeln!(out, "    {anchor}_anchor [style = invis];")?;
            writeln!(out, "  }}")?;
            anchors.push(format!("{anchor}_anchor"));
        }
    }

    for pair in anchors.windows(2) {
        writeln!(out, "  {} -> {} [style = invis];", pair[0], pair[1])?;
    }

    Ok(())
}

fn size_bounds(report: &Report) -> (u64, u64) {
    let min = report.rows.iter().map(|row| row.exclusive_size).min().unwrap_or(0);
    let max = report.rows.iter().map(|row| row.exclusive_size).max().unwrap_or(0);
    (min, max)
}

/// Node height/width in inches: 0.2 plus up to 2.0 scaled by size.
#[allow(clippy::cast_precision_loss)]
fn node_extent(size: u64, min: u64, max: u64) -> f64 {
    if max <= min {
        return 0.2;
    }
    let ratio = (size.saturating_sub(min)) as f64 / (max - min) as f64;
    ratio.clamp(0.0, 1.0).mul_add(2.0, 0.2)
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
