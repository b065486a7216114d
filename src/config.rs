use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use thiserror::Error;

use crate::slug::{SlugError, SlugRules, DEFAULT_MAX_LENGTH};
use crate::validity::Validity;

pub const DEFAULT_BASE_DIR: &str = "/export";
pub const DEFAULT_SUFFIX: &str = "-filestore";
pub const DEFAULT_EXCLUDE: &[&str] = &["_shared"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid max_length: {0}")]
    MaxLength(#[from] SlugError),
    #[error("suffix must not be empty")]
    EmptySuffix,
}

/// One layer of settings. The CLI and the optional JSON file each produce one;
/// unset fields fall through to the next layer. `force` is not a setting: it
/// only ever comes from the command line, so a file cannot turn a dry run into
/// a mutating one (the key is rejected like any other unknown key).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub base_dir: Option<PathBuf>,
    pub suffix: Option<String>,
    pub exclude_dir_lists: Option<Vec<String>>,
    pub prod_dirs: Option<Vec<PathBuf>>,
    pub max_length: Option<usize>,
    pub validity: Option<Validity>,
}

/// Everything a run needs, resolved and validated.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub base_dir: PathBuf,
    pub suffix: String,
    /// Without it nothing on disk changes.
    pub force: bool,
    pub exclude_dirs: Vec<String>,
    // When set, discovery under base_dir is skipped.
    pub prod_dirs: Vec<PathBuf>,
    pub rules: SlugRules,
}

pub fn load_settings(path: &Path) -> Result<Settings> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&s)
        .with_context(|| format!("Failed to parse config file {} (JSON)", path.display()))
}

impl MigrationConfig {
    /// Merge layers, first one wins, then validate.
    pub fn resolve(layers: &[Settings], force: bool) -> Result<Self, ConfigError> {
        fn pick<T: Clone>(layers: &[Settings], f: impl Fn(&Settings) -> Option<T>) -> Option<T> {
            layers.iter().find_map(f)
        }
        let suffix = pick(layers, |l| l.suffix.clone()).unwrap_or_else(|| DEFAULT_SUFFIX.to_string());
        if suffix.is_empty() { return Err(ConfigError::EmptySuffix); }
        let validity = pick(layers, |l| l.validity).unwrap_or_default();
        let max_length = pick(layers, |l| l.max_length).unwrap_or(DEFAULT_MAX_LENGTH);
        Ok(MigrationConfig {
            base_dir: pick(layers, |l| l.base_dir.clone()).unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_DIR)),
            suffix,
            force,
            exclude_dirs: pick(layers, |l| l.exclude_dir_lists.clone())
                .unwrap_or_else(|| DEFAULT_EXCLUDE.iter().map(|s| s.to_string()).collect()),
            prod_dirs: pick(layers, |l| l.prod_dirs.clone()).unwrap_or_default(),
            rules: SlugRules::new(validity, max_length)?,
        })
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        MigrationConfig {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            suffix: DEFAULT_SUFFIX.to_string(),
            force: false,
            exclude_dirs: DEFAULT_EXCLUDE.iter().map(|s| s.to_string()).collect(),
            prod_dirs: Vec::new(),
            rules: SlugRules::default(),
        }
    }
}
