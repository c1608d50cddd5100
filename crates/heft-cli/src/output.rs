//! Output layer: pretty/text/JSON rendering of analysis summaries and errors.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--format` flag
//! 2. `FORMAT` env var → `"pretty"` | `"text"` | `"json"`
//! 3. Default: [`OutputMode::Pretty`] if stdout is a TTY; [`OutputMode::Text`] if piped.

use std::io::{self, IsTerminal, Write};

use clap::ValueEnum;
use heft_core::attribute::format_shared;
use heft_core::report::human_size;
use heft_core::{Analysis, Attribution, ErrorCode, HeftError};
use serde::Serialize;

/// Shared width for pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 72;

fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<12} {}", format!("{key}:"), value.as_ref())
}

/// The three output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Human-optimized output (tables, sections, visual framing).
    Pretty,
    /// Plain tab-separated text for pipes.
    Text,
    /// Machine-readable JSON.
    Json,
}

fn resolve_output_mode_inner(
    format_flag: Option<OutputMode>,
    format_env: Option<&str>,
    is_tty: bool,
) -> OutputMode {
    if let Some(mode) = format_flag {
        return mode;
    }

    if let Some(val) = format_env {
        match val.to_lowercase().as_str() {
            "json" => return OutputMode::Json,
            "text" => return OutputMode::Text,
            "pretty" => return OutputMode::Pretty,
            _ => {}
        }
    }

    if is_tty {
        OutputMode::Pretty
    } else {
        OutputMode::Text
    }
}

/// Resolve the output mode from the `--format` flag, `FORMAT` and the TTY.
pub fn resolve_output_mode(format_flag: Option<OutputMode>) -> OutputMode {
    let env_val = std::env::var("FORMAT").ok();
    let is_tty = io::stdout().is_terminal();
    resolve_output_mode_inner(format_flag, env_val.as_deref(), is_tty)
}

// ---------------------------------------------------------------------------
// Analysis summary
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Summary<'a> {
    nodes: usize,
    edges: usize,
    roots: usize,
    max_level: usize,
    total_size: u64,
    fingerprint: &'a str,
    policy: String,
    sort: String,
    order: String,
    rows: &'a [Attribution],
    written: &'a [String],
}

/// Write the summary of `analysis`, limited to `top` rows.
pub fn render_summary(
    mode: OutputMode,
    analysis: &Analysis,
    top: usize,
    written: &[String],
    w: &mut dyn Write,
) -> anyhow::Result<()> {
    let stats = &analysis.stats;
    let rows = analysis.report.top(top);

    match mode {
        OutputMode::Json => {
            let summary = Summary {
                nodes: stats.node_count,
                edges: stats.edge_count,
                roots: stats.root_count,
                max_level: stats.max_level,
                total_size: stats.total_size,
                fingerprint: analysis.graph.content_hash(),
                policy: analysis.table.policy().to_string(),
                sort: analysis.report.key.to_string(),
                order: analysis.report.order.to_string(),
                rows,
                written,
            };
            serde_json::to_writer_pretty(&mut *w, &summary)?;
            writeln!(w)?;
        }
        OutputMode::Pretty => {
            writeln!(w, "Closure")?;
            pretty_rule(w)?;
            pretty_kv(w, "paths", stats.node_count.to_string())?;
            pretty_kv(w, "references", stats.edge_count.to_string())?;
            pretty_kv(w, "roots", stats.root_count.to_string())?;
            pretty_kv(
                w,
                "total size",
                format!("{} ({} bytes)", human_size(stats.total_size), stats.total_size),
            )?;
            pretty_kv(w, "policy", analysis.table.policy().as_str())?;
            pretty_kv(w, "fingerprint", analysis.graph.content_hash())?;
            for path in written {
                pretty_kv(w, "wrote", path)?;
            }
            writeln!(w)?;
            writeln!(
                w,
                "{:>12} {:>12} {:>12}  path",
                "shared", "closure", "self"
            )?;
            pretty_rule(w)?;
            for row in rows {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let shared = row.shared_size.round() as u64;
                writeln!(
                    w,
                    "{:>12} {:>12} {:>12}  {}",
                    human_size(shared),
                    human_size(row.closure_size),
                    human_size(row.exclusive_size),
                    row.id
                )?;
            }
        }
        OutputMode::Text => {
            writeln!(
                w,
                "total\t{}\t{}\t{}",
                stats.node_count, stats.edge_count, stats.total_size
            )?;
            for row in rows {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}",
                    row.id,
                    row.exclusive_size,
                    row.closure_size,
                    format_shared(row.shared_size)
                )?;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structured error payload for terminal and JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip)]
    pub exit_status: u8,
}

impl From<&anyhow::Error> for CliError {
    fn from(err: &anyhow::Error) -> Self {
        err.downcast_ref::<HeftError>().map_or_else(
            || Self {
                message: format!("{err:#}"),
                hint: None,
                code: None,
                exit_status: 1,
            },
            |heft| Self::from_code(heft.code(), heft.to_string()),
        )
    }
}

impl CliError {
    fn from_code(code: ErrorCode, message: String) -> Self {
        Self {
            message,
            hint: code.hint().map(str::to_string),
            code: Some(code.code().to_string()),
            exit_status: code.exit_status(),
        }
    }
}

/// Render an error to `w`, adapting the format to the output mode.
pub fn render_error(mode: OutputMode, error: &CliError, w: &mut dyn Write) -> io::Result<()> {
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({ "error": error });
            serde_json::to_writer_pretty(&mut *w, &wrapper)?;
            writeln!(w)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            match &error.code {
                Some(code) => writeln!(w, "error[{code}]: {}", error.message)?,
                None => writeln!(w, "error: {}", error.message)?,
            }
            if let Some(hint) = &error.hint {
                writeln!(w, "  hint: {hint}")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use heft_core::error::GraphError;

    #[test]
    fn flag_beats_env_and_tty() {
        assert_eq!(
            resolve_output_mode_inner(Some(OutputMode::Json), Some("text"), true),
            OutputMode::Json
        );
    }

    #[test]
    fn env_beats_tty() {
        assert_eq!(
            resolve_output_mode_inner(None, Some("TEXT"), true),
            OutputMode::Text
        );
    }

    #[test]
    fn tty_default() {
        assert_eq!(resolve_output_mode_inner(None, None, true), OutputMode::Pretty);
        assert_eq!(resolve_output_mode_inner(None, Some("bogus"), false), OutputMode::Text);
    }

    #[test]
    fn heft_errors_carry_codes() {
        let err = anyhow::Error::new(HeftError::from(GraphError::DanglingReference {
            missing: "b".into(),
            from: "a".into(),
        }));
        let cli = CliError::from(&err);
        assert_eq!(cli.code.as_deref(), Some("E2002"));
        assert_eq!(cli.exit_status, 1);
        assert!(cli.hint.is_some());

        let mut buf = Vec::new();
        render_error(OutputMode::Text, &cli, &mut buf).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.starts_with("error[E2002]: "), "{text}");
        assert!(text.contains("  hint: "));
    }

    #[test]
    fn other_errors_exit_one() {
        let err = anyhow::anyhow!("boom");
        let cli = CliError::from(&err);
        assert_eq!(cli.code, None);
        assert_eq!(cli.exit_status, 1);
    }

    #[test]
    fn json_errors_are_wrapped() {
        let cli = CliError::from(&anyhow::anyhow!("boom"));
        let mut buf = Vec::new();
        render_error(OutputMode::Json, &cli, &mut buf).expect("render");
        let value: serde_json::Value = serde_json::from_slice(&buf).expect("json");
        assert_eq!(value["error"]["message"], "boom");
    }
}
