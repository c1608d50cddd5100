//! `heft analyze`: attribute closure size and write reports.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::Args;
use heft_core::config::{HeftConfig, load_config, load_config_file};
use heft_core::export::{write_csv, write_dot};
use heft_core::{
    AnalysisOptions, ApportionPolicy, HeftError, PathRecord, RecordFile, SortKey, SortOrder,
    StoreQuery, analyze,
};
use tracing::info;

use crate::nix::NixStore;
use crate::output::{OutputMode, render_summary};

/// Rows shown in the summary when neither `--top` nor the config sets it.
pub const DEFAULT_TOP: usize = 20;

/// File names used by `--out-dir`.
pub const CSV_FILE: &str = "closure.csv";
pub const DOT_FILE: &str = "closure.dot";

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Store path (or installable) whose closure is analyzed.
    #[arg(required_unless_present = "records")]
    pub target: Option<String>,

    /// Read closure metadata from a JSON snapshot instead of the live store.
    /// A TARGET given alongside restricts the analysis to its closure.
    #[arg(short, long, value_name = "FILE")]
    pub records: Option<PathBuf>,

    /// Write the CSV report to PATH.
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// Write the Graphviz report to PATH.
    #[arg(long, value_name = "PATH")]
    pub dot: Option<PathBuf>,

    /// Write closure.csv and closure.dot into DIR (created if missing).
    #[arg(short, long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Rank by: exclusive-size, closure-size, shared-size, id.
    #[arg(short, long, value_name = "KEY")]
    pub sort: Option<SortKey>,

    /// Ranking direction: asc or desc.
    #[arg(long, value_name = "ORD")]
    pub order: Option<SortOrder>,

    /// Shared-size apportionment: equal or exclusive-weighted.
    #[arg(long, value_name = "P")]
    pub policy: Option<ApportionPolicy>,

    /// Rows shown in the summary.
    #[arg(short = 'n', long, value_name = "N")]
    pub top: Option<usize>,

    /// Plain Graphviz output without size-scaled nodes.
    #[arg(long)]
    pub no_dot_style: bool,

    /// Use this config file instead of the usual lookup.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl AnalyzeArgs {
    fn options(&self, config: &HeftConfig) -> AnalysisOptions {
        let mut options = AnalysisOptions::from_config(config);
        if let Some(key) = self.sort {
            options.sort_key = key;
        }
        if let Some(order) = self.order {
            options.order = order;
        }
        if let Some(policy) = self.policy {
            options.policy = policy;
        }
        options
    }

    fn csv_path(&self) -> Option<PathBuf> {
        self.csv
            .clone()
            .or_else(|| self.out_dir.as_ref().map(|dir| dir.join(CSV_FILE)))
    }

    fn dot_path(&self) -> Option<PathBuf> {
        self.dot
            .clone()
            .or_else(|| self.out_dir.as_ref().map(|dir| dir.join(DOT_FILE)))
    }
}

pub fn run_analyze(
    args: &AnalyzeArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => load_config_file(path)?,
        None => load_config(project_root)?,
    };

    let records = query_records(args, &config)?;
    let analysis = analyze(records, &args.options(&config)).map_err(HeftError::from)?;

    let mut written = Vec::new();

    if let Some(path) = args.csv_path() {
        write_report(&path, |out| write_csv(&analysis.report, out))?;
        written.push(path.display().to_string());
    }

    if let Some(path) = args.dot_path() {
        let mut dot_options = config.dot_options();
        if args.no_dot_style {
            dot_options.styled = false;
        }
        write_report(&path, |out| {
            write_dot(&analysis.report, &analysis.graph, &dot_options, out)
        })?;
        written.push(path.display().to_string());
    }

    let top = args.top.or(config.report.top).unwrap_or(DEFAULT_TOP);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    render_summary(output, &analysis, top, &written, &mut out)?;
    Ok(())
}

fn query_records(args: &AnalyzeArgs, config: &HeftConfig) -> Result<Vec<PathRecord>, HeftError> {
    let target = args.target.as_deref().unwrap_or_default();
    let records = match &args.records {
        Some(path) => RecordFile::load(path)?.query_closure(target)?,
        None => NixStore::new(config.store.nix_store_bin.clone()).query_closure(target)?,
    };
    info!(records = records.len(), "closure queried");
    Ok(records)
}

fn write_report<F>(path: &Path, render: F) -> Result<(), HeftError>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    render(&mut out)?;
    out.flush()?;
    info!(path = %path.display(), "report written");
    Ok(())
}
