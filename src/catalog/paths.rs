//! Path variants recorded per file.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::files::path_text;
use super::models::{PathEntry, PathType};
use super::store::{Store, StoreError};

/// Operations over the `paths` table. Entries are insert-only.
#[derive(Debug, Clone, Copy)]
pub struct PathRepository<'a> {
    store: &'a Store,
}

impl<'a> PathRepository<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Record a path for a file. Repeating the same triple is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be written.
    pub fn add_path(&self, file_id: i64, path: &Path, path_type: PathType) -> Result<(), StoreError> {
        let path = path_text(path);
        self.store.execute(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO paths (file_id, path_type, path, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![file_id, path_type, path, Utc::now()],
            )
            .map(|_| ())
        })
    }

    /// Whether any file already owns this consolidated path.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be read.
    pub fn consolidated_path_exists(&self, path: &Path) -> Result<bool, StoreError> {
        let path = path_text(path);
        self.store.execute(|conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM paths WHERE path_type = ?1 AND path = ?2)",
                params![PathType::Consolidated, path],
                |row| row.get(0),
            )
        })
    }

    /// The consolidated location recorded for a file, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be read.
    pub fn master_consolidated_path(&self, file_id: i64) -> Result<Option<PathBuf>, StoreError> {
        self.store.execute(|conn| {
            conn.query_row(
                "SELECT path FROM paths WHERE file_id = ?1 AND path_type = ?2
                 ORDER BY id LIMIT 1",
                params![file_id, PathType::Consolidated],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map(|path| path.map(PathBuf::from))
        })
    }

    /// Every path recorded for a file, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be read.
    pub fn list_for_file(&self, file_id: i64) -> Result<Vec<PathEntry>, StoreError> {
        self.store.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, file_id, path_type, path, created_at FROM paths
                 WHERE file_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![file_id], PathEntry::from_row)?;
            rows.collect()
        })
    }
}
