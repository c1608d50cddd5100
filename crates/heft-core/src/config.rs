//! Configuration loaded from TOML.
//!
//! Lookup order: `<project>/.heft.toml`, then `<config_dir>/heft/config.toml`,
//! then built-in defaults. The first file found wins; files are not merged.
//! Every key is optional, and command-line flags override whatever is loaded.
//!
//! ```toml
//! [report]
//! sort = "closure-size"
//! order = "desc"
//! top = 25
//!
//! [attribution]
//! policy = "equal"
//!
//! [export]
//! dot_styling = true
//! dot_rank_levels = true
//!
//! [store]
//! nix_store_bin = "nix-store"
//! prefix = "/nix/store/"
//! hash_len = 32
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attribute::ApportionPolicy;
use crate::error::HeftError;
use crate::export::DotOptions;
use crate::record::StoreLayout;
use crate::report::{SortKey, SortOrder};

/// Name of the per-project config file.
pub const PROJECT_CONFIG_FILE: &str = ".heft.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeftConfig {
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub attribution: AttributionConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub order: SortOrder,
    /// Rows shown in the terminal summary.
    #[serde(default)]
    pub top: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionConfig {
    #[serde(default)]
    pub policy: ApportionPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_true")]
    pub dot_styling: bool,
    #[serde(default = "default_true")]
    pub dot_rank_levels: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dot_styling: default_true(),
            dot_rank_levels: default_true(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_nix_store_bin")]
    pub nix_store_bin: String,
    #[serde(default = "default_store_prefix")]
    pub prefix: String,
    #[serde(default = "default_hash_len")]
    pub hash_len: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            nix_store_bin: default_nix_store_bin(),
            prefix: default_store_prefix(),
            hash_len: default_hash_len(),
        }
    }
}

impl StoreConfig {
    /// Store layout used for short display names.
    #[must_use]
    pub fn layout(&self) -> StoreLayout {
        StoreLayout {
            prefix: self.prefix.clone(),
            hash_len: self.hash_len,
        }
    }
}

impl HeftConfig {
    /// Graphviz options derived from `[export]` and `[store]`.
    #[must_use]
    pub fn dot_options(&self) -> DotOptions {
        DotOptions {
            styled: self.export.dot_styling,
            rank_levels: self.export.dot_rank_levels,
            layout: self.store.layout(),
        }
    }
}

const fn default_true() -> bool {
    true
}

fn default_nix_store_bin() -> String {
    "nix-store".to_string()
}

fn default_store_prefix() -> String {
    StoreLayout::default().prefix
}

fn default_hash_len() -> usize {
    StoreLayout::default().hash_len
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Path of the per-user config file, if the platform has a config dir.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("heft").join("config.toml"))
}

/// Load the effective configuration for `project_root`.
///
/// # Errors
///
/// Returns [`HeftError::Config`] when a config file exists but cannot be
/// read or parsed.
pub fn load_config(project_root: &Path) -> Result<HeftConfig, HeftError> {
    let candidates = [Some(project_root.join(PROJECT_CONFIG_FILE)), user_config_path()];
    load_first(candidates.iter().flatten())
}

/// Parse a single config file.
///
/// # Errors
///
/// Returns [`HeftError::Config`] when the file cannot be read or parsed.
pub fn load_config_file(path: &Path) -> Result<HeftConfig, HeftError> {
    let content = std::fs::read_to_string(path).map_err(|err| HeftError::Config {
        path: path.to_path_buf(),
        detail: err.to_string(),
    })?;

    toml::from_str::<HeftConfig>(&content).map_err(|err| HeftError::Config {
        path: path.to_path_buf(),
        detail: err.message().to_string(),
    })
}

fn load_first<'a, I>(candidates: I) -> Result<HeftConfig, HeftError>
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    for path in candidates {
        if path.exists() {
            debug!(path = %path.display(), "loading config");
            return load_config_file(path);
        }
    }
    Ok(HeftConfig::default())
}
