//! File records: registration, hashing and deduplication status.

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{to_db_size, DedupStatus, FileRecord, NewFile, FILE_COLUMNS};
use super::store::{Store, StoreError};
use crate::scanner::hasher::is_usable_hash;

/// Operations over the `files` table.
#[derive(Debug, Clone, Copy)]
pub struct FileRepository<'a> {
    store: &'a Store,
}

impl<'a> FileRepository<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Insert a file or refresh the existing record for the same path.
    ///
    /// The scan timestamp is always refreshed. Hash, duplicate and
    /// deduplication fields are left untouched on update.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be written.
    pub fn upsert(&self, file: &NewFile) -> Result<i64, StoreError> {
        let path = path_text(&file.original_path);
        let size = to_db_size(file.size);
        self.store.execute(|conn| {
            conn.query_row(
                "INSERT INTO files (original_path, file_name, file_size_bytes, created_at,
                                    year, month, month_day, project_name, scan_timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(original_path) DO UPDATE SET
                     file_name = excluded.file_name,
                     file_size_bytes = excluded.file_size_bytes,
                     created_at = excluded.created_at,
                     year = excluded.year,
                     month = excluded.month,
                     month_day = excluded.month_day,
                     project_name = excluded.project_name,
                     scan_timestamp = excluded.scan_timestamp
                 RETURNING id",
                params![
                    path,
                    file.file_name,
                    size,
                    file.created_at,
                    file.hierarchy.year,
                    file.hierarchy.month,
                    file.hierarchy.month_day,
                    file.hierarchy.project,
                    Utc::now(),
                ],
                |row| row.get(0),
            )
        })
    }

    /// Whether a record exists for this original path.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be read.
    pub fn exists_by_path(&self, path: &Path) -> Result<bool, StoreError> {
        let path = path_text(path);
        self.store.execute(|conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM files WHERE original_path = ?1)",
                params![path],
                |row| row.get(0),
            )
        })
    }

    /// All records of exactly this size, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be read.
    pub fn find_by_size(&self, size: u64) -> Result<Vec<FileRecord>, StoreError> {
        let size = to_db_size(size);
        self.store.execute(|conn| {
            query_files(
                conn,
                "WHERE file_size_bytes = ?1 ORDER BY id",
                params![size],
            )
        })
    }

    /// Look up a record by id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be read.
    pub fn find(&self, id: i64) -> Result<Option<FileRecord>, StoreError> {
        self.store.execute(|conn| find_file(conn, id))
    }

    /// Record the fingerprint of a file.
    ///
    /// Sentinel values and empty strings are ignored; returns whether a hash
    /// was written.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be written.
    pub fn set_hash(&self, id: i64, hash: &str) -> Result<bool, StoreError> {
        if !is_usable_hash(hash) {
            log::debug!("Ignoring unusable hash {:?} for file {}", hash, id);
            return Ok(false);
        }
        self.store.execute(|conn| {
            conn.execute(
                "UPDATE files SET file_hash = ?1 WHERE id = ?2",
                params![hash, id],
            )
            .map(|n| n > 0)
        })
    }

    /// Every record still waiting for deduplication.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be read.
    pub fn list_pending(&self) -> Result<Vec<FileRecord>, StoreError> {
        self.store.execute(|conn| {
            query_files(
                conn,
                "WHERE deduplication_status = ?1 ORDER BY id",
                params![DedupStatus::NotProcessed],
            )
        })
    }

    /// Pending records that are neither duplicates nor linked to a master.
    ///
    /// Group masters qualify, so they are consolidated in the same pass as
    /// files without duplicates.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be read.
    pub fn list_unique_pending(&self) -> Result<Vec<FileRecord>, StoreError> {
        self.store.execute(|conn| {
            query_files(
                conn,
                "WHERE deduplication_status = ?1 AND is_duplicate = 0
                   AND master_file_id IS NULL ORDER BY id",
                params![DedupStatus::NotProcessed],
            )
        })
    }

    /// Set the deduplication status and timestamp of a record.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be written.
    pub fn mark_deduplicated(&self, id: i64, status: DedupStatus) -> Result<(), StoreError> {
        self.store.execute(|conn| {
            conn.execute(
                "UPDATE files SET deduplication_status = ?1, deduplication_timestamp = ?2
                 WHERE id = ?3",
                params![status, Utc::now(), id],
            )
            .map(|_| ())
        })
    }
}

pub(crate) fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub(crate) fn find_file(conn: &Connection, id: i64) -> rusqlite::Result<Option<FileRecord>> {
    conn.query_row(
        &format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1"),
        params![id],
        FileRecord::from_row,
    )
    .optional()
}

pub(crate) fn query_files<P: rusqlite::Params>(
    conn: &Connection,
    clause: &str,
    params: P,
) -> rusqlite::Result<Vec<FileRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {FILE_COLUMNS} FROM files {clause}"))?;
    let rows = stmt.query_map(params, FileRecord::from_row)?;
    rows.collect()
}
