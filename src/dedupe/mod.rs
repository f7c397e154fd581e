//! Physical deduplication.
//!
//! This module provides functionality for:
//! - Checking that the consolidation tree is writable and large enough
//! - Moving files without duplicates into the sharded consolidation tree
//! - Replacing every duplicate with a relative link to its master
//! - Summarizing the run and recording its counters
//!
//! # Example
//!
//! ```no_run
//! use dgcatalog::catalog::{Catalog, CatalogOptions};
//! use dgcatalog::dedupe::{run_deduplication, DedupeConfig};
//!
//! let catalog = Catalog::initialize(CatalogOptions::new("/media")).unwrap();
//! let summary = run_deduplication(&catalog, DedupeConfig::default()).unwrap();
//! println!("{}", summary.render(10));
//! ```

pub mod engine;
pub mod layout;
pub mod preflight;
pub mod summary;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::actions::{LinkError, MoveError};
use crate::catalog::{Catalog, StoreError};

pub use engine::{DedupeConfig, Deduplicator, DEFAULT_MAX_LINK_DEPTH};
pub use preflight::{Confirm, PreflightError, StdinConfirm};
pub use summary::DedupeSummary;

/// A file or group that was skipped. The run continues.
#[derive(Debug, Error)]
pub enum DedupeError {
    /// The file to consolidate is gone from its original location.
    #[error("source file not found: {0}")]
    SourceMissing(PathBuf),

    /// The group's master record does not exist.
    #[error("master file not found for group {hash}")]
    MasterNotFound { hash: String },

    /// The master's file is missing on disk.
    #[error("master file missing: {0}")]
    MasterMissing(PathBuf),

    #[error("error moving {path}: {source}")]
    Consolidate {
        path: PathBuf,
        #[source]
        source: MoveError,
    },

    #[error(transparent)]
    Link(#[from] LinkError),
}

impl DedupeError {
    /// Path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::SourceMissing(path) | Self::MasterMissing(path) => Some(path),
            Self::Consolidate { path, .. } => Some(path),
            Self::Link(err) => Some(err.path()),
            Self::MasterNotFound { .. } => None,
        }
    }
}

/// Failures that stop a run.
#[derive(Debug, Error)]
pub enum DedupeRunError {
    #[error(transparent)]
    Preflight(#[from] PreflightError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Run the engine with stdin confirmation and no progress display.
///
/// # Errors
///
/// See [`Deduplicator::run`].
pub fn run_deduplication(
    catalog: &Catalog,
    config: DedupeConfig,
) -> Result<DedupeSummary, DedupeRunError> {
    Deduplicator::new(catalog, config).run()
}
