//! Persistent catalog of scanned files.
//!
//! # Overview
//!
//! The catalog lives in a hidden `.dg_consolidation` directory at the
//! consolidation root, next to the sharded `files/` tree of consolidated
//! originals. All access goes through a retrying [`store::Store`]; the
//! repositories below expose the operations each entity family needs and
//! only ever hand out value snapshots.
//!
//! - [`FileRepository`] - file records, hashes and deduplication status
//! - [`PathRepository`] - original, consolidated and symlink paths
//! - [`DuplicateRepository`] - duplicate groups and their reconciliation
//! - [`StatisticsRepository`] - aggregate counters
//!
//! # Example
//!
//! ```no_run
//! use dgcatalog::catalog::{Catalog, CatalogOptions};
//!
//! let catalog = Catalog::initialize(CatalogOptions::new("/mnt/media")).unwrap();
//! for file in catalog.files().list_pending().unwrap() {
//!     println!("{}", file.original_path.display());
//! }
//! catalog.statistics().refresh().unwrap();
//! ```

pub mod duplicates;
pub mod files;
pub mod models;
pub mod paths;
pub mod schema;
pub mod statistics;
pub mod store;

use std::fs;
use std::path::{Path, PathBuf};

pub use duplicates::DuplicateRepository;
pub use files::FileRepository;
pub use models::{DedupStatus, DuplicateGroup, FileRecord, Hierarchy, NewFile, PathEntry, PathType};
pub use paths::PathRepository;
pub use statistics::{DedupCounters, StatisticsRepository};
pub use store::{FailureKind, RetryPolicy, Store, StoreError};

/// Hidden directory holding the catalog and the consolidated files.
pub const CONSOLIDATION_DIR_NAME: &str = ".dg_consolidation";

/// Catalog file name inside [`CONSOLIDATION_DIR_NAME`].
pub const DB_FILENAME: &str = "dg_catalog.db";

/// Root of the sharded consolidated tree inside [`CONSOLIDATION_DIR_NAME`].
pub const FILES_DIR_NAME: &str = "files";

/// Where the catalog lives and how it is accessed.
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    scan_root: PathBuf,
    consolidation_root: Option<PathBuf>,
    catalog_path: Option<PathBuf>,
    retry: RetryPolicy,
}

impl CatalogOptions {
    /// Options for a catalog at the scan root.
    pub fn new(scan_root: impl Into<PathBuf>) -> Self {
        Self {
            scan_root: scan_root.into(),
            consolidation_root: None,
            catalog_path: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Consolidate into a different root than the one being scanned.
    #[must_use]
    pub fn with_consolidation_root(mut self, root: Option<PathBuf>) -> Self {
        self.consolidation_root = root;
        self
    }

    /// Keep the catalog file somewhere other than the consolidation directory.
    #[must_use]
    pub fn with_catalog_path(mut self, path: Option<PathBuf>) -> Self {
        self.catalog_path = path;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// An open catalog.
#[derive(Debug)]
pub struct Catalog {
    store: Store,
    scan_root: PathBuf,
    consolidation_dir: PathBuf,
}

impl Catalog {
    /// Resolve the roots, create the consolidation directory and open the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the consolidation directory
    /// cannot be created, or any error from [`Store::open`].
    pub fn initialize(options: CatalogOptions) -> Result<Self, StoreError> {
        let scan_root = absolutize(&options.scan_root);
        let consolidation_root = options
            .consolidation_root
            .as_deref()
            .map_or_else(|| scan_root.clone(), absolutize);
        let consolidation_dir = consolidation_root.join(CONSOLIDATION_DIR_NAME);

        fs::create_dir_all(&consolidation_dir).map_err(|source| StoreError::Unavailable {
            path: consolidation_dir.clone(),
            source,
        })?;

        let catalog_path = options
            .catalog_path
            .unwrap_or_else(|| consolidation_dir.join(DB_FILENAME));
        let store = Store::open(&catalog_path, options.retry)?;

        log::info!("Catalog ready at {}", catalog_path.display());
        Ok(Self {
            store,
            scan_root,
            consolidation_dir,
        })
    }

    #[must_use]
    pub fn files(&self) -> FileRepository<'_> {
        FileRepository::new(&self.store)
    }

    #[must_use]
    pub fn paths(&self) -> PathRepository<'_> {
        PathRepository::new(&self.store)
    }

    #[must_use]
    pub fn duplicates(&self) -> DuplicateRepository<'_> {
        DuplicateRepository::new(&self.store)
    }

    #[must_use]
    pub fn statistics(&self) -> StatisticsRepository<'_> {
        StatisticsRepository::new(&self.store)
    }

    /// The underlying store, for read-only aggregate queries.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub fn scan_root(&self) -> &Path {
        &self.scan_root
    }

    /// The hidden `.dg_consolidation` directory.
    #[must_use]
    pub fn consolidation_dir(&self) -> &Path {
        &self.consolidation_dir
    }

    /// Root of the sharded consolidated tree. Not created until first use.
    #[must_use]
    pub fn files_dir(&self) -> PathBuf {
        self.consolidation_dir.join(FILES_DIR_NAME)
    }

    #[must_use]
    pub fn catalog_path(&self) -> &Path {
        self.store.path()
    }

    /// Release the store. Idempotent.
    pub fn close(&self) {
        self.store.close();
    }
}

fn absolutize(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
