//! Live store queries through the `nix-store` command.

use std::process::Command;

use heft_core::error::StoreError;
use heft_core::{PathRecord, StoreQuery};
use tracing::{debug, instrument, warn};

/// Paths per `nix-store --query --size` invocation.
const SIZE_BATCH: usize = 256;

/// [`StoreQuery`] backed by the `nix-store` binary.
#[derive(Debug, Clone)]
pub struct NixStore {
    bin: String,
}

impl NixStore {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    fn query(&self, args: &[&str]) -> Result<String, StoreError> {
        let output = Command::new(&self.bin).args(args).output()?;
        if !output.status.success() {
            return Err(StoreError::CommandFailed {
                command: format!("{} {}", self.bin, args.join(" ")),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        String::from_utf8(output.stdout).map_err(|err| StoreError::Parse {
            context: format!("running {} {}", self.bin, args.first().copied().unwrap_or("")),
            detail: err.to_string(),
        })
    }

    fn requisites(&self, target: &str) -> Result<Vec<String>, StoreError> {
        Ok(lines(&self.query(&["--query", "--requisites", target])?))
    }

    fn sizes(&self, paths: &[String]) -> Result<Vec<u64>, StoreError> {
        let mut sizes = Vec::with_capacity(paths.len());
        for batch in paths.chunks(SIZE_BATCH) {
            let mut args = vec!["--query", "--size"];
            args.extend(batch.iter().map(String::as_str));
            sizes.extend(parse_sizes(&self.query(&args)?, batch.len())?);
        }
        Ok(sizes)
    }

    fn references(&self, path: &str) -> Result<Vec<String>, StoreError> {
        Ok(lines(&self.query(&["--query", "--references", path])?))
    }
}

impl StoreQuery for NixStore {
    #[instrument(skip(self), fields(bin = %self.bin))]
    fn query_closure(&self, target: &str) -> Result<Vec<PathRecord>, StoreError> {
        let paths = self.requisites(target)?;
        if paths.is_empty() {
            return Err(StoreError::UnknownTarget(target.to_string()));
        }
        debug!(paths = paths.len(), "requisites queried");

        let sizes = self.sizes(&paths)?;

        paths
            .into_iter()
            .zip(sizes)
            .map(|(path, size)| {
                let references = self.references(&path)?;
                if references.iter().any(|r| r == &path) {
                    debug!(%path, "dropping self-reference");
                }
                Ok(PathRecord::new(path, size)
                    .with_references(references)
                    .without_self_reference())
            })
            .collect()
    }
}

fn lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_sizes(output: &str, expected: usize) -> Result<Vec<u64>, StoreError> {
    let sizes = lines(output)
        .iter()
        .map(|line| {
            line.parse::<u64>().map_err(|err| StoreError::Parse {
                context: "reading path sizes".to_string(),
                detail: format!("'{line}': {err}"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if sizes.len() != expected {
        warn!(expected, got = sizes.len(), "size count mismatch");
        return Err(StoreError::Parse {
            context: "reading path sizes".to_string(),
            detail: format!("expected {expected} sizes, got {}", sizes.len()),
        });
    }
    Ok(sizes)
}
