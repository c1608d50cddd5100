//! Report assembly: ranking attribution rows for export.
//!
//! Sorting is stable, so rows with equal keys keep graph (input) order and
//! fixtures stay reproducible byte for byte.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::attribute::{Attribution, AttributionTable};

// ---------------------------------------------------------------------------
// Sort options
// ---------------------------------------------------------------------------

/// Field a report is ranked by.
///
/// Deserialization goes through [`FromStr`], so config files accept the same
/// spellings as the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum SortKey {
    ExclusiveSize,
    ClosureSize,
    #[default]
    SharedSize,
    Id,
}

impl SortKey {
    /// Stable name used in config files and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExclusiveSize => "exclusive-size",
            Self::ClosureSize => "closure-size",
            Self::SharedSize => "shared-size",
            Self::Id => "id",
        }
    }

    fn compare(self, a: &Attribution, b: &Attribution) -> Ordering {
        match self {
            Self::ExclusiveSize => a.exclusive_size.cmp(&b.exclusive_size),
            Self::ClosureSize => a.closure_size.cmp(&b.closure_size),
            Self::SharedSize => a.shared_size.total_cmp(&b.shared_size),
            Self::Id => a.id.cmp(&b.id),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "exclusive-size" | "exclusive" | "self" => Ok(Self::ExclusiveSize),
            "closure-size" | "closure" => Ok(Self::ClosureSize),
            "shared-size" | "shared" => Ok(Self::SharedSize),
            "id" | "path" => Ok(Self::Id),
            other => Err(format!(
                "unknown sort key '{other}' (expected exclusive-size, closure-size, shared-size or id)"
            )),
        }
    }
}

/// Direction of a report ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    /// Stable name used in config files and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            other => Err(format!("unknown sort order '{other}' (expected asc or desc)")),
        }
    }
}

impl TryFrom<String> for SortKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for SortOrder {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Ordered attribution rows ready for export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub key: SortKey,
    pub order: SortOrder,
    pub rows: Vec<Attribution>,
}

/// Aggregate figures over a report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReportTotals {
    pub rows: usize,
    pub exclusive_size: u64,
    pub shared_size: f64,
}

impl Report {
    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Return `true` when there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The first `n` rows of the ranking.
    #[must_use]
    pub fn top(&self, n: usize) -> &[Attribution] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// Totals over every row.
    #[must_use]
    pub fn totals(&self) -> ReportTotals {
        ReportTotals {
            rows: self.rows.len(),
            exclusive_size: self.rows.iter().map(|row| row.exclusive_size).sum(),
            shared_size: self.rows.iter().map(|row| row.shared_size).sum(),
        }
    }
}

/// Rank the rows of `table` by `key` in `order`.
///
/// Equal keys keep their relative table order in both directions.
#[must_use]
#[instrument(skip(table), fields(rows = table.len()))]
pub fn assemble(table: &AttributionTable, key: SortKey, order: SortOrder) -> Report {
    let mut rows = table.rows().to_vec();

    // `sort_by` is stable; reversing the comparator (not the output) keeps
    // ties in input order for descending reports too.
    match order {
        SortOrder::Ascending => rows.sort_by(|a, b| key.compare(a, b)),
        SortOrder::Descending => rows.sort_by(|a, b| key.compare(b, a)),
    }

    debug!(%key, %order, "report assembled");

    Report { key, order, rows }
}

// ---------------------------------------------------------------------------
// Size formatting
// ---------------------------------------------------------------------------

/// Format a byte count with binary units (`1.5 MiB`). Plain bytes stay exact.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::attribute;
    use crate::graph::build;
    use crate::record::PathRecord;

    fn sample_table() -> AttributionTable {
        let graph = build(vec![
            PathRecord::new("a", 10).with_references(["c"]),
            PathRecord::new("b", 20).with_references(["c"]),
            PathRecord::new("c", 5),
            PathRecord::new("d", 10),
        ])
        .expect("build graph");
        attribute(&graph)
    }

    fn ids(report: &Report) -> Vec<&str> {
        report.rows.iter().map(|row| row.id.as_str()).collect()
    }

    #[test]
    fn empty_table_gives_empty_report() {
        let report = assemble(&AttributionTable::default(), SortKey::Id, SortOrder::Ascending);
        assert!(report.is_empty());
        assert_eq!(report.totals().exclusive_size, 0);
    }

    #[test]
    fn descending_by_exclusive_keeps_ties_in_input_order() {
        let report = assemble(&sample_table(), SortKey::ExclusiveSize, SortOrder::Descending);
        // a and d tie at 10 bytes; a came first.
        assert_eq!(ids(&report), vec!["b", "a", "d", "c"]);
    }

    #[test]
    fn ascending_by_exclusive_keeps_ties_in_input_order() {
        let report = assemble(&sample_table(), SortKey::ExclusiveSize, SortOrder::Ascending);
        assert_eq!(ids(&report), vec!["c", "a", "d", "b"]);
    }

    #[test]
    fn closure_ranking() {
        let report = assemble(&sample_table(), SortKey::ClosureSize, SortOrder::Descending);
        assert_eq!(ids(&report), vec!["b", "a", "d", "c"]);
        assert_eq!(report.rows[1].closure_size, 15);
    }

    #[test]
    fn shared_ranking() {
        let report = assemble(&sample_table(), SortKey::SharedSize, SortOrder::Descending);
        assert_eq!(ids(&report), vec!["b", "a", "d", "c"]);
    }

    #[test]
    fn id_ranking() {
        let report = assemble(&sample_table(), SortKey::Id, SortOrder::Descending);
        assert_eq!(ids(&report), vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn top_clamps_to_length() {
        let report = assemble(&sample_table(), SortKey::Id, SortOrder::Ascending);
        assert_eq!(report.top(2).len(), 2);
        assert_eq!(report.top(99).len(), 4);
    }

    #[test]
    fn totals_conserve_size() {
        let totals = assemble(&sample_table(), SortKey::Id, SortOrder::Ascending).totals();
        assert_eq!(totals.rows, 4);
        assert_eq!(totals.exclusive_size, 45);
        assert!((totals.shared_size - 45.0).abs() < 1e-9);
    }

    #[test]
    fn sort_options_parse() {
        assert_eq!("closure".parse::<SortKey>(), Ok(SortKey::ClosureSize));
        assert_eq!("shared_size".parse::<SortKey>(), Ok(SortKey::SharedSize));
        assert_eq!("path".parse::<SortKey>(), Ok(SortKey::Id));
        assert_eq!("ASC".parse::<SortOrder>(), Ok(SortOrder::Ascending));
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn serde_accepts_every_spelling() {
        for (raw, key) in [
            ("\"closure-size\"", SortKey::ClosureSize),
            ("\"closure_size\"", SortKey::ClosureSize),
            ("\"closure\"", SortKey::ClosureSize),
            ("\"shared\"", SortKey::SharedSize),
            ("\"exclusive\"", SortKey::ExclusiveSize),
            ("\"path\"", SortKey::Id),
        ] {
            assert_eq!(serde_json::from_str::<SortKey>(raw).expect(raw), key);
        }
        assert_eq!(
            serde_json::from_str::<SortOrder>("\"asc\"").expect("asc"),
            SortOrder::Ascending
        );
        assert!(serde_json::from_str::<SortKey>("\"bogus\"").is_err());
    }

    #[test]
    fn serde_output_reads_back() {
        let json = serde_json::to_string(&SortKey::ExclusiveSize).expect("serialize");
        assert_eq!(json, "\"exclusive-size\"");
        assert_eq!(
            serde_json::from_str::<SortKey>(&json).expect("deserialize"),
            SortKey::ExclusiveSize
        );
        let json = serde_json::to_string(&SortOrder::Descending).expect("serialize");
        assert_eq!(
            serde_json::from_str::<SortOrder>(&json).expect("deserialize"),
            SortOrder::Descending
        );
    }

    #[test]
    fn human_sizes() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(1023), "1023 B");
        assert_eq!(human_size(1536), "1.5 KiB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MiB");
    }
}
