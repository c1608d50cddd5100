//! CSV export of a ranked report.
//!
//! Columns: `path,exclusive_size,closure_size,shared_size`. Sizes are decimal
//! byte counts; shared sizes carry three fractional digits.

use std::io::{self, Write};

use crate::attribute::format_shared;
use crate::report::Report;

/// Column headers, in output order.
pub const HEADER: [&str; 4] = ["path", "exclusive_size", "closure_size", "shared_size"];

/// Write `report` as CSV, one row per attribution in report order.
///
/// # Errors
///
/// Returns any error raised by the underlying writer.
pub fn write_csv<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
    writeln!(out, "{}", HEADER.join(","))?;
    for row in &report.rows {
        writeln!(
            out,
            "{},{},{},{}",
            escape_field(row.id.as_str()),
            row.exclusive_size,
            row.closure_size,
            format_shared(row.shared_size)
        )?;
    }
    out.flush()
}

/// Quote a field when it contains a comma, quote, or line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::attribute;
    use crate::graph::build;
    use crate::record::PathRecord;
    use crate::report::{SortKey, SortOrder, assemble};

    fn render(records: Vec<PathRecord>) -> String {
        let table = attribute(&build(records).expect("build graph"));
        let report = assemble(&table, SortKey::SharedSize, SortOrder::Descending);
        let mut buf = Vec::new();
        write_csv(&report, &mut buf).expect("write csv");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn empty_report_has_header_only() {
        assert_eq!(render(Vec::new()), "path,exclusive_size,closure_size,shared_size\n");
    }

    #[test]
    fn rows_follow_report_order() {
        let csv = render(vec![
            PathRecord::new("/a", 10).with_references(["/c"]),
            PathRecord::new("/b", 20).with_references(["/c"]),
            PathRecord::new("/c", 5),
        ]);
        assert_eq!(
            csv,
            "path,exclusive_size,closure_size,shared_size\n\
             /b,20,25,21.667\n\
             /a,10,15,11.667\n\
             /c,5,5,1.667\n"
        );
    }

    #[test]
    fn awkward_paths_are_quoted() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
