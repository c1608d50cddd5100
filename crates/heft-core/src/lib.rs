#![forbid(unsafe_code)]
//! heft-core library.
//!
//! Builds the dependency graph of a store closure and attributes on-disk
//! size to every path in it, splitting the cost of shared dependencies across
//! the paths that pull them in.
//!
//! ```text
//! StoreQuery ──► Vec<PathRecord>
//!                    ↓  graph::build()
//!               ClosureGraph (validated DAG + dependents index)
//!                    ↓  attribute::attribute()
//!               AttributionTable
//!                    ↓  report::assemble()
//!               Report ──► export::{csv, dot}
//! ```
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums ([`GraphError`], [`StoreError`],
//!   [`HeftError`]); the binary wraps them in `anyhow`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod attribute;
pub mod config;
pub mod error;
pub mod export;
pub mod graph;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod store;

pub use attribute::{ApportionPolicy, Attribution, AttributionTable, attribute};
pub use error::{ErrorCode, GraphError, HeftError, StoreError};
pub use graph::{ClosureGraph, GraphStats, build};
pub use pipeline::{Analysis, AnalysisOptions, analyze};
pub use record::{NodeId, PathRecord};
pub use report::{Report, SortKey, SortOrder, assemble};
pub use store::{RecordFile, StoreQuery};
