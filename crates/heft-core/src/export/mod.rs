//! Serializers for assembled reports.
//!
//! Both exporters write to any [`std::io::Write`] and produce byte-identical
//! output for identical input, so reruns over the same closure can be diffed.

pub mod csv;
pub mod dot;

pub use csv::write_csv;
pub use dot::{DotOptions, write_dot};
