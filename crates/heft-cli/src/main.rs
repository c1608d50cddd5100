#![forbid(unsafe_code)]

mod cmd;
mod nix;
mod output;

use std::env;
use std::io;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "heft: who is paying for the bytes in your store closure",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format: pretty, text or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Attribute closure size to store paths",
        long_about = "Build the reference graph of a closure, attribute exclusive, closure and shared size to every path, and export the ranking.",
        after_help = "EXAMPLES:\n    # Analyze a live closure\n    heft analyze /run/current-system\n\n    # Analyze a snapshot and write closure.csv and closure.dot\n    heft analyze --records closure.json --out-dir report\n\n    # Rank by closure size, machine-readable summary\n    heft analyze ./result --sort closure-size --format json"
    )]
    Analyze(cmd::analyze::AnalyzeArgs),

    #[command(
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    heft completions bash\n\n    # Generate zsh completions\n    heft completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("HEFT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "heft=debug,info"
        } else {
            "heft=info,warn"
        })
    });

    let format = env::var("HEFT_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = output::resolve_output_mode(cli.format);

    let result = match &cli.command {
        Commands::Analyze(args) => env::current_dir()
            .map_err(anyhow::Error::from)
            .and_then(|root| cmd::analyze::run_analyze(args, output, &root)),
        Commands::Completions(args) => {
            cmd::completions::run_completions(args.shell, &mut Cli::command())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!(error = ?err, "command failed");
            let cli_error = CliError::from(&err);
            let _ = render_error(output, &cli_error, &mut io::stderr().lock());
            ExitCode::from(cli_error.exit_status)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_flag_parses_after_subcommand() {
        let cli = Cli::parse_from(["heft", "analyze", "--records", "c.json", "-v"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Analyze(_)));
    }

    #[test]
    fn format_flag_is_global() {
        let cli = Cli::parse_from(["heft", "--format", "json", "analyze", "x"]);
        assert_eq!(cli.format, Some(OutputMode::Json));
        let cli = Cli::parse_from(["heft", "analyze", "x", "--format", "text"]);
        assert_eq!(cli.format, Some(OutputMode::Text));
    }

    #[test]
    fn completions_subcommand_parses() {
        let cli = Cli::parse_from(["heft", "completions", "bash"]);
        assert!(matches!(cli.command, Commands::Completions(_)));
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
