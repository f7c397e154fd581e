//! Aggregate statistics.
//!
//! Most rows are recomputed from `files` and `duplicate_groups` on every
//! [`StatisticsRepository::refresh`]. The deduplication counters are owned
//! by the engine: they only ever change through
//! [`StatisticsRepository::record_deduplication_counters`], and a refresh
//! carries their current value forward.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{StatKind, StatRecord};
use super::store::{Store, StoreError};

pub const TOTAL_FILES: &str = "total_files";
pub const TOTAL_SIZE_BYTES: &str = "total_size_bytes";
pub const UNIQUE_FILES: &str = "unique_files";
pub const DUPLICATE_FILES: &str = "duplicate_files";
pub const DUPLICATE_GROUPS: &str = "duplicate_groups";
pub const SPACE_SAVED_BYTES: &str = "space_saved_bytes";
pub const SPACE_SAVED_PERCENTAGE: &str = "space_saved_percentage";
pub const FILES_DEDUPLICATED: &str = "files_deduplicated";
pub const SYMLINKS_CREATED: &str = "symlinks_created";
pub const FILES_CONSOLIDATED: &str = "files_consolidated";
pub const LAST_SCAN_TIMESTAMP: &str = "last_scan_timestamp";

/// Counters owned by the deduplication engine.
pub const ENGINE_COUNTERS: [&str; 3] = [FILES_CONSOLIDATED, SYMLINKS_CREATED, FILES_DEDUPLICATED];

/// Per-run deltas of the engine-owned counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupCounters {
    pub files_consolidated: u64,
    pub symlinks_created: u64,
    pub files_deduplicated: u64,
}

impl DedupCounters {
    fn pairs(self) -> [(&'static str, u64); 3] {
        [
            (FILES_CONSOLIDATED, self.files_consolidated),
            (SYMLINKS_CREATED, self.symlinks_created),
            (FILES_DEDUPLICATED, self.files_deduplicated),
        ]
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Operations over the `statistics` table.
#[derive(Debug, Clone, Copy)]
pub struct StatisticsRepository<'a> {
    store: &'a Store,
}

impl<'a> StatisticsRepository<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Recompute derived aggregates and rewrite every statistics row.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be written.
    pub fn refresh(&self) -> Result<(), StoreError> {
        self.store.execute(refresh_all)?;
        log::debug!("Statistics refreshed");
        Ok(())
    }

    /// Current value of an integer counter; 0 when absent or unparsable.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be read.
    pub fn get_counter(&self, name: &str) -> Result<i64, StoreError> {
        self.store.execute(|conn| read_counter(conn, name))
    }

    /// Add a run's deltas to the engine-owned counters.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be written.
    pub fn record_deduplication_counters(&self, counters: DedupCounters) -> Result<(), StoreError> {
        self.store.execute(|conn| {
            let now = Utc::now();
            for (name, delta) in counters.pairs() {
                let value = read_counter(conn, name)?.saturating_add(delta as i64);
                upsert_stat(conn, name, &value.to_string(), StatKind::Integer, now)?;
            }
            Ok(())
        })
    }

    /// Look up one statistic.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be read.
    pub fn get(&self, name: &str) -> Result<Option<StatRecord>, StoreError> {
        self.store.execute(|conn| {
            conn.query_row(
                "SELECT stat_name, stat_value, stat_type, updated_at FROM statistics
                 WHERE stat_name = ?1",
                params![name],
                StatRecord::from_row,
            )
            .optional()
        })
    }

    /// All statistics, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be read.
    pub fn list(&self) -> Result<Vec<StatRecord>, StoreError> {
        self.store.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT stat_name, stat_value, stat_type, updated_at FROM statistics
                 ORDER BY stat_name",
            )?;
            let rows = stmt.query_map([], StatRecord::from_row)?;
            rows.collect()
        })
    }
}

fn read_counter(conn: &Connection, name: &str) -> rusqlite::Result<i64> {
    let value: Option<String> = conn
        .query_row(
            "SELECT stat_value FROM statistics WHERE stat_name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
}

fn upsert_stat(
    conn: &Connection,
    name: &str,
    value: &str,
    kind: StatKind,
    now: chrono::DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO statistics (stat_name, stat_value, stat_type, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(stat_name) DO UPDATE SET
             stat_value = excluded.stat_value,
             stat_type = excluded.stat_type,
             updated_at = excluded.updated_at",
        params![name, value, kind, now],
    )?;
    Ok(())
}

fn count(conn: &Connection, sql: &str) -> rusqlite::Result<i64> {
    conn.query_row(sql, [], |row| row.get(0))
}

fn refresh_all(conn: &Connection) -> rusqlite::Result<()> {
    let total_files = count(conn, "SELECT COUNT(*) FROM files")?;
    let total_size = count(conn, "SELECT COALESCE(SUM(file_size_bytes), 0) FROM files")?;
    let duplicate_files = count(conn, "SELECT COUNT(*) FROM files WHERE is_duplicate = 1")?;
    let duplicate_groups = count(
        conn,
        "SELECT COUNT(*) FROM duplicate_groups WHERE duplicate_count > 0",
    )?;
    let space_saved = count(
        conn,
        "SELECT COALESCE(SUM(space_saved_bytes), 0) FROM duplicate_groups",
    )?;
    let last_scan: Option<String> =
        conn.query_row("SELECT MAX(scan_timestamp) FROM files", [], |row| row.get(0))?;

    let percentage = if total_size > 0 {
        space_saved as f64 / total_size as f64 * 100.0
    } else {
        0.0
    };

    let now = Utc::now();
    let derived = [
        (TOTAL_FILES, total_files.to_string(), StatKind::Integer),
        (TOTAL_SIZE_BYTES, total_size.to_string(), StatKind::Integer),
        (
            UNIQUE_FILES,
            (total_files - duplicate_files).to_string(),
            StatKind::Integer,
        ),
        (DUPLICATE_FILES, duplicate_files.to_string(), StatKind::Integer),
        (DUPLICATE_GROUPS, duplicate_groups.to_string(), StatKind::Integer),
        (SPACE_SAVED_BYTES, space_saved.to_string(), StatKind::Integer),
        (
            SPACE_SAVED_PERCENTAGE,
            format!("{percentage:.2}"),
            StatKind::Float,
        ),
    ];
    for (name, value, kind) in derived {
        upsert_stat(conn, name, &value, kind, now)?;
    }

    for name in ENGINE_COUNTERS {
        let value = read_counter(conn, name)?;
        upsert_stat(conn, name, &value.to_string(), StatKind::Integer, now)?;
    }

    if let Some(last_scan) = last_scan {
        upsert_stat(conn, LAST_SCAN_TIMESTAMP, &last_scan, StatKind::Datetime, now)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::duplicates::DuplicateRepository;
    use crate::catalog::files::FileRepository;
    use crate::catalog::models::{Hierarchy, NewFile};
    use crate::catalog::store::RetryPolicy;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Store) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = Store::open(
            &dir.path().join("catalog.db"),
            RetryPolicy::new(1, Duration::from_millis(1)),
        )
        .expect("Failed to open store");
        (dir, store)
    }

    fn add(store: &Store, name: &str, size: u64, hash: &str) {
        let files = FileRepository::new(store);
        let id = files
            .upsert(&NewFile {
                original_path: PathBuf::from(format!("/v/{name}")),
                file_name: name.to_string(),
                size,
                created_at: None,
                hierarchy: Hierarchy::default(),
            })
            .expect("upsert");
        files.set_hash(id, hash).expect("set_hash");
    }

    #[test]
    fn test_refresh_on_empty_catalog() {
        let (_dir, store) = setup();
        let stats = StatisticsRepository::new(&store);

        stats.refresh().unwrap();

        assert_eq!(stats.get_counter(TOTAL_FILES).unwrap(), 0);
        let pct = stats.get(SPACE_SAVED_PERCENTAGE).unwrap().unwrap();
        assert_eq!(pct.value, "0.00");
        assert_eq!(pct.kind, Some(StatKind::Float));
        assert!(stats.get(LAST_SCAN_TIMESTAMP).unwrap().is_none());
    }

    #[test]
    fn test_refresh_derives_aggregates() {
        let (_dir, store) = setup();
        let hash = "0123456789abcdef0123456789abcdef";
        add(&store, "a.mp4", 100, hash);
        add(&store, "b.mp4", 100, hash);
        add(&store, "c.mp4", 200, "fedcba9876543210fedcba9876543210");
        DuplicateRepository::new(&store).reconcile_group(hash).unwrap();

        let stats = StatisticsRepository::new(&store);
        stats.refresh().unwrap();

        assert_eq!(stats.get_counter(TOTAL_FILES).unwrap(), 3);
        assert_eq!(stats.get_counter(TOTAL_SIZE_BYTES).unwrap(), 400);
        assert_eq!(stats.get_counter(UNIQUE_FILES).unwrap(), 2);
        assert_eq!(stats.get_counter(DUPLICATE_FILES).unwrap(), 1);
        assert_eq!(stats.get_counter(DUPLICATE_GROUPS).unwrap(), 1);
        assert_eq!(stats.get_counter(SPACE_SAVED_BYTES).unwrap(), 100);
        assert_eq!(
            stats.get(SPACE_SAVED_PERCENTAGE).unwrap().unwrap().value,
            "25.00"
        );
        assert!(stats.get(LAST_SCAN_TIMESTAMP).unwrap().is_some());
    }

    #[test]
    fn test_counters_are_additive_and_survive_refresh() {
        let (_dir, store) = setup();
        let stats = StatisticsRepository::new(&store);

        stats
            .record_deduplication_counters(DedupCounters {
                files_consolidated: 1,
                symlinks_created: 2,
                files_deduplicated: 3,
            })
            .unwrap();
        stats
            .record_deduplication_counters(DedupCounters {
                files_consolidated: 1,
                ..DedupCounters::default()
            })
            .unwrap();
        stats.refresh().unwrap();

        assert_eq!(stats.get_counter(FILES_CONSOLIDATED).unwrap(), 2);
        assert_eq!(stats.get_counter(SYMLINKS_CREATED).unwrap(), 2);
        assert_eq!(stats.get_counter(FILES_DEDUPLICATED).unwrap(), 3);
    }

    #[test]
    fn test_zero_deltas_leave_counters_unchanged() {
        let (_dir, store) = setup();
        let stats = StatisticsRepository::new(&store);
        stats
            .record_deduplication_counters(DedupCounters {
                files_deduplicated: 5,
                ..DedupCounters::default()
            })
            .unwrap();

        stats
            .record_deduplication_counters(DedupCounters::default())
            .unwrap();

        assert_eq!(stats.get_counter(FILES_DEDUPLICATED).unwrap(), 5);
        assert!(DedupCounters::default().is_empty());
    }

    #[test]
    fn test_list_is_sorted() {
        let (_dir, store) = setup();
        let stats = StatisticsRepository::new(&store);
        stats.refresh().unwrap();

        let names: Vec<_> = stats.list().unwrap().into_iter().map(|s| s.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(names.iter().any(|n| n == FILES_DEDUPLICATED));
    }
}
