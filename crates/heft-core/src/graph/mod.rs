//! Closure graph construction and structural analysis.
//!
//! # Overview
//!
//! This module turns the flat list of [`PathRecord`]s returned by the store
//! query boundary into a validated, immutable petgraph-based DAG. Every
//! downstream stage (size attribution, report assembly, Graphviz export)
//! reads from the same [`ClosureGraph`].
//!
//! ## Pipeline
//!
//! ```text
//! Vec<PathRecord>
//!        ↓  build::build()
//! ClosureGraph (DAG, dependents index, topological order)
//!        ├─ levels::levels()       rank of each path below the roots
//!        └─ stats::GraphStats      counts, degrees, total size
//! ```
//!
//! ## Edge Direction
//!
//! An edge `A → B` means "A depends on (references) B". Roots of the closure
//! have no incoming edges; leaves have no outgoing edges.
//!
//! [`PathRecord`]: crate::record::PathRecord

pub mod build;
pub mod cycles;
pub mod levels;
pub mod stats;

pub use build::{ClosureGraph, Node, build};
pub use cycles::find_cycles;
pub use levels::levels;
pub use stats::GraphStats;
