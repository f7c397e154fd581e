//! Application configuration management.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. Built-in defaults
//! 2. `dgcatalog.toml` in the platform config directory, or the file given
//!    with `--config`
//! 3. Environment variables prefixed `DGCATALOG_` (nested keys split on
//!    `__`, e.g. `DGCATALOG_RETRY__MAX_ATTEMPTS=3`)
//!
//! CLI flags are applied on top by the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::catalog::RetryPolicy;
use crate::dedupe::DEFAULT_MAX_LINK_DEPTH;
use crate::scanner::DEFAULT_VIDEO_EXTENSIONS;

/// Config file name looked up in the platform config directory.
pub const CONFIG_FILE_NAME: &str = "dgcatalog.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "DGCATALOG_";

/// Retry settings for the catalog store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: u64::try_from(policy.base_delay.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where `.dg_consolidation` lives. Defaults to the scan root.
    pub consolidation_root: Option<PathBuf>,
    /// Catalog database file. Defaults to `.dg_consolidation/dg_catalog.db`.
    pub catalog_path: Option<PathBuf>,
    pub retry: RetryConfig,
    pub max_link_depth: usize,
    /// Errors listed in the deduplication summary.
    pub error_display_limit: usize,
    pub video_extensions: Vec<String>,
    pub skip_hash: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            consolidation_root: None,
            catalog_path: None,
            retry: RetryConfig::default(),
            max_link_depth: DEFAULT_MAX_LINK_DEPTH,
            error_display_limit: 10,
            video_extensions: DEFAULT_VIDEO_EXTENSIONS
                .iter()
                .map(|ext| (*ext).to_string())
                .collect(),
            skip_hash: false,
        }
    }
}

impl Config {
    /// Load from `explicit` if given, else from the platform config file if
    /// it exists, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Fails if `explicit` does not exist or any layer holds invalid values.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                if !path.is_file() {
                    anyhow::bail!("config file not found: {}", path.display());
                }
                Self::load_from_path(Some(path))
            }
            None => {
                let default = Self::default_path().filter(|p| p.is_file());
                if let Some(path) = &default {
                    log::debug!("Using config file {}", path.display());
                }
                Self::load_from_path(default.as_deref())
            }
        }
    }

    /// Defaults, then `path` (if any), then the environment.
    ///
    /// # Errors
    ///
    /// Fails if a layer cannot be parsed into [`Config`].
    pub fn load_from_path(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("invalid configuration")
    }

    /// Platform-specific location of [`CONFIG_FILE_NAME`].
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "dgcatalog", "dgcatalog")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}
