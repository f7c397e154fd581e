//! Scanner module for registering media files in the catalog.
//!
//! This module provides functionality for:
//! - Walking the `year/month/month_day/project` hierarchy
//! - Registering video files and their original paths
//! - Sampled BLAKE3 fingerprints on size collisions
//! - Triggering duplicate-group reconciliation
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Hierarchy traversal and video file discovery
//! - [`hasher`]: Sampled content fingerprint
//!
//! Hashing is lazy: a file is only fingerprinted once another file of the
//! same size has been seen in this scan, or the catalog already holds a
//! same-size file with the same name.
//!
//! # Example
//!
//! ```no_run
//! use dgcatalog::catalog::{Catalog, CatalogOptions};
//! use dgcatalog::scanner::{ScanConfig, Scanner};
//!
//! let catalog = Catalog::initialize(CatalogOptions::new("/mnt/media")).unwrap();
//! let summary = Scanner::new(&catalog, ScanConfig::default()).scan(None).unwrap();
//! println!("{} added, {} hashed", summary.files_added, summary.files_hashed);
//! ```

pub mod hasher;
pub mod walker;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::catalog::{Catalog, FileRecord, Hierarchy, NewFile, PathType, StoreError};
use crate::progress::{ProgressCallback, PHASE_SCAN};

pub use hasher::{is_usable_hash, Hasher, HASH_ERROR, HASH_SKIPPED};
pub use walker::{ProjectFolder, Walker};

/// Extensions treated as video files.
pub const DEFAULT_VIDEO_EXTENSIONS: [&str; 23] = [
    "mp4", "avi", "mov", "mkv", "wmv", "flv", "webm", "m4v", "3gp", "ogv", "mts", "m2ts", "ts",
    "vob", "asf", "rm", "rmvb", "divx", "xvid", "mpg", "mpeg", "m2v", "mpe",
];

/// Scanner settings.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Never fingerprint; files are registered without a hash.
    pub skip_hash: bool,
    /// Accepted extensions, without the leading dot.
    pub video_extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            skip_hash: false,
            video_extensions: DEFAULT_VIDEO_EXTENSIONS
                .iter()
                .map(|e| (*e).to_string())
                .collect(),
        }
    }
}

/// Outcome of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub projects: usize,
    pub files_seen: usize,
    pub files_added: usize,
    /// Already cataloged by path.
    pub files_skipped: usize,
    pub files_hashed: usize,
    /// Per-file problems that did not stop the scan.
    pub errors: Vec<String>,
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The subfolder resolves outside the scan root.
    #[error("Subfolder is not within the scan root: {0}")]
    OutsideRoot(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The catalog rejected an operation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    pub(crate) fn from_io(path: &Path, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// A file seen earlier in this scan, keyed by size.
#[derive(Debug, Clone)]
struct SeenFile {
    id: i64,
    path: PathBuf,
    hash: Option<String>,
}

/// Registers the media tree into the catalog.
pub struct Scanner<'a> {
    catalog: &'a Catalog,
    config: ScanConfig,
    hasher: Hasher,
    progress: Option<&'a dyn ProgressCallback>,
}

impl<'a> Scanner<'a> {
    #[must_use]
    pub fn new(catalog: &'a Catalog, config: ScanConfig) -> Self {
        Self {
            catalog,
            config,
            hasher: Hasher::new(),
            progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: &'a dyn ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Scan the whole tree under the catalog's scan root, or one `year/month`
    /// subfolder of it.
    ///
    /// # Errors
    ///
    /// Fails if the root or subfolder is invalid, or the catalog becomes
    /// unavailable. Unreadable files are recorded in the summary instead.
    pub fn scan(&self, subfolder: Option<&Path>) -> Result<ScanSummary, ScanError> {
        let walker = Walker::new(self.catalog.scan_root(), self.config.video_extensions.clone());
        let projects = walker.projects(subfolder)?;
        log::info!(
            "Scanning {} project folder(s) under {}",
            projects.len(),
            self.catalog.scan_root().display()
        );

        let mut summary = ScanSummary {
            projects: projects.len(),
            ..ScanSummary::default()
        };
        let mut by_size: HashMap<u64, Vec<SeenFile>> = HashMap::new();

        if let Some(p) = self.progress {
            p.on_phase_start(PHASE_SCAN, 0);
        }
        for project in &projects {
            let files: Vec<PathBuf> = walker
                .video_files(&project.path)
                .filter_map(|entry| match entry {
                    Ok(path) => Some(path),
                    Err(e) => {
                        summary.errors.push(e.to_string());
                        None
                    }
                })
                .collect();
            if files.is_empty() {
                continue;
            }
            log::info!(
                "Found {} video file(s) in {}",
                files.len(),
                project.hierarchy.project
            );

            for path in files {
                summary.files_seen += 1;
                if let Some(p) = self.progress {
                    p.on_progress(summary.files_seen, &path.to_string_lossy());
                }
                self.scan_file(&path, &project.hierarchy, &mut by_size, &mut summary)?;
            }
        }
        if let Some(p) = self.progress {
            p.on_phase_end(PHASE_SCAN);
        }

        log::info!(
            "Scan complete: {} added, {} already cataloged, {} hashed, {} error(s)",
            summary.files_added,
            summary.files_skipped,
            summary.files_hashed,
            summary.errors.len()
        );
        Ok(summary)
    }

    fn scan_file(
        &self,
        path: &Path,
        hierarchy: &Hierarchy,
        by_size: &mut HashMap<u64, Vec<SeenFile>>,
        summary: &mut ScanSummary,
    ) -> Result<(), ScanError> {
        let files = self.catalog.files();
        if files.exists_by_path(path)? {
            log::debug!("Already in catalog: {}", path.display());
            summary.files_skipped += 1;
            return Ok(());
        }

        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("Cannot read {}: {}", path.display(), e);
                summary.errors.push(format!("{}: {}", path.display(), e));
                return Ok(());
            }
        };
        let size = metadata.len();
        let created_at = metadata
            .created()
            .or_else(|_| metadata.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let id = files.upsert(&NewFile {
            original_path: path.to_path_buf(),
            file_name: file_name.clone(),
            size,
            created_at,
            hierarchy: hierarchy.clone(),
        })?;
        self.catalog.paths().add_path(id, path, PathType::Original)?;
        summary.files_added += 1;

        let earlier = by_size.entry(size).or_default();
        let mut seen = SeenFile {
            id,
            path: path.to_path_buf(),
            hash: None,
        };

        if !self.config.skip_hash {
            let catalog_matches: Vec<FileRecord> = files
                .find_by_size(size)?
                .into_iter()
                .filter(|r| r.id != id && r.file_name.to_lowercase() == file_name.to_lowercase())
                .filter(|r| !earlier.iter().any(|e| e.id == r.id))
                .collect();

            if !earlier.is_empty() || !catalog_matches.is_empty() {
                log::debug!(
                    "Potential duplicate (size {}): hashing {}",
                    size,
                    path.display()
                );
                seen.hash = self.resolve_candidates(path, id, earlier, &catalog_matches, summary)?;
            }
        }

        log::info!("Added to catalog: {} ({} bytes)", file_name, size);
        earlier.push(seen);
        Ok(())
    }

    /// Hash the new file and whichever candidates still need a hash, then
    /// reconcile every hash that was written.
    fn resolve_candidates(
        &self,
        path: &Path,
        id: i64,
        earlier: &mut [SeenFile],
        catalog_matches: &[FileRecord],
        summary: &mut ScanSummary,
    ) -> Result<Option<String>, ScanError> {
        let Some(hash) = self.hash_and_record(id, path, summary)? else {
            return Ok(None);
        };

        let already_known = earlier.iter().any(|e| e.hash.as_deref() == Some(hash.as_str()))
            || catalog_matches
                .iter()
                .any(|r| r.hash.as_deref() == Some(hash.as_str()));
        if already_known {
            self.catalog.duplicates().reconcile_group(&hash)?;
            return Ok(Some(hash));
        }

        for entry in earlier.iter_mut().filter(|e| e.hash.is_none()) {
            log::debug!("Hashing earlier file: {}", entry.path.display());
            if let Some(existing) = self.hash_and_record(entry.id, &entry.path, summary)? {
                self.catalog.duplicates().reconcile_group(&existing)?;
                entry.hash = Some(existing);
            }
        }
        for record in catalog_matches {
            if record.hash.as_deref().is_some_and(is_usable_hash) {
                continue;
            }
            log::debug!("Hashing cataloged file: {}", record.original_path.display());
            if let Some(existing) =
                self.hash_and_record(record.id, &record.original_path, summary)?
            {
                self.catalog.duplicates().reconcile_group(&existing)?;
            }
        }

        self.catalog.duplicates().reconcile_group(&hash)?;
        Ok(Some(hash))
    }

    fn hash_and_record(
        &self,
        id: i64,
        path: &Path,
        summary: &mut ScanSummary,
    ) -> Result<Option<String>, ScanError> {
        match self.hasher.fingerprint(path) {
            Ok(hash) => {
                summary.files_hashed += 1;
                self.catalog.files().set_hash(id, &hash)?;
                Ok(Some(hash))
            }
            Err(e) => {
                log::warn!("Error calculating hash: {}", e);
                summary.errors.push(e.to_string());
                Ok(None)
            }
        }
    }
}
