//! Typed snapshots of catalog rows.
//!
//! Repositories hand out these values; nothing outside the catalog module
//! touches rows directly.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Row;

/// Deduplication progress of a single file. `Deduplicated` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DedupStatus {
    #[default]
    NotProcessed,
    Deduplicated,
}

impl DedupStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotProcessed => "not_processed",
            Self::Deduplicated => "deduplicated",
        }
    }
}

/// Kind of path recorded for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathType {
    /// Where the scanner found the file.
    Original,
    /// Canonical location inside the consolidation tree.
    Consolidated,
    /// The original location, now a symbolic link to the master.
    Symlink,
}

impl PathType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Consolidated => "consolidated",
            Self::Symlink => "symlink",
        }
    }
}

/// Declared value kind of a statistics row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKind {
    Integer,
    Float,
    Datetime,
}

impl StatKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Datetime => "datetime",
        }
    }
}

/// Error returned when a stored enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

macro_rules! text_enum {
    ($ty:ident, $kind:literal, { $($text:literal => $variant:ident),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum!(DedupStatus, "deduplication status", {
    "not_processed" => NotProcessed,
    "deduplicated" => Deduplicated,
});

text_enum!(PathType, "path type", {
    "original" => Original,
    "consolidated" => Consolidated,
    "symlink" => Symlink,
});

text_enum!(StatKind, "statistic type", {
    "integer" => Integer,
    "float" => Float,
    "datetime" => Datetime,
});

/// Columns selected for every [`FileRecord`] query, in [`FileRecord::from_row`] order.
pub(crate) const FILE_COLUMNS: &str = "id, original_path, file_name, file_size_bytes, file_hash, \
     created_at, year, month, month_day, project_name, scan_timestamp, is_duplicate, \
     master_file_id, deduplication_status, deduplication_timestamp";

/// Columns selected for every [`DuplicateGroup`] query.
pub(crate) const GROUP_COLUMNS: &str = "id, group_hash, file_size_bytes, master_file_id, \
     duplicate_count, total_size_bytes, space_saved_bytes, created_at, deduplicated_at";

/// Position of a file in the year/month/day/project hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Hierarchy {
    pub year: String,
    pub month: String,
    pub month_day: String,
    pub project: String,
}

/// Input to [`FileRepository::upsert`](super::FileRepository::upsert).
#[derive(Debug, Clone)]
pub struct NewFile {
    pub original_path: PathBuf,
    pub file_name: String,
    pub size: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub hierarchy: Hierarchy,
}

/// One cataloged file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub id: i64,
    pub original_path: PathBuf,
    pub file_name: String,
    pub size: u64,
    /// Content fingerprint, `None` until computed.
    pub hash: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub hierarchy: Hierarchy,
    pub scanned_at: DateTime<Utc>,
    pub is_duplicate: bool,
    /// Set only on duplicates; always points at a non-duplicate record.
    pub master_file_id: Option<i64>,
    pub status: DedupStatus,
    pub deduplicated_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            original_path: PathBuf::from(row.get::<_, String>(1)?),
            file_name: row.get(2)?,
            size: from_db_size(row.get(3)?),
            hash: row.get(4)?,
            created_at: row.get(5)?,
            hierarchy: Hierarchy {
                year: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                month: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                month_day: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                project: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
            },
            scanned_at: row.get(10)?,
            is_duplicate: row.get(11)?,
            master_file_id: row.get(12)?,
            status: row.get(13)?,
            deduplicated_at: row.get(14)?,
        })
    }

    /// Neither a duplicate nor pointing at a master.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        !self.is_duplicate && self.master_file_id.is_none()
    }

    #[must_use]
    pub fn is_deduplicated(&self) -> bool {
        self.status == DedupStatus::Deduplicated
    }
}

/// A recorded path variant of a file.
#[derive(Debug, Clone, PartialEq)]
pub struct PathEntry {
    pub id: i64,
    pub file_id: i64,
    pub path_type: PathType,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl PathEntry {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            file_id: row.get(1)?,
            path_type: row.get(2)?,
            path: PathBuf::from(row.get::<_, String>(3)?),
            created_at: row.get(4)?,
        })
    }
}

/// Files sharing one content hash, with one designated master.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub id: i64,
    pub hash: String,
    pub file_size: u64,
    pub master_file_id: Option<i64>,
    /// Member count minus one.
    pub duplicate_count: u64,
    pub total_size: u64,
    /// `total_size` minus the master's size.
    pub space_saved: u64,
    pub created_at: DateTime<Utc>,
    /// Terminal marker: set once every member has been processed.
    pub deduplicated_at: Option<DateTime<Utc>>,
}

impl DuplicateGroup {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            hash: row.get(1)?,
            file_size: from_db_size(row.get(2)?),
            master_file_id: row.get(3)?,
            duplicate_count: from_db_size(row.get(4)?),
            total_size: from_db_size(row.get(5)?),
            space_saved: from_db_size(row.get(6)?),
            created_at: row.get(7)?,
            deduplicated_at: row.get(8)?,
        })
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.deduplicated_at.is_some()
    }
}

/// One named aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct StatRecord {
    pub name: String,
    pub value: String,
    pub kind: Option<StatKind>,
    pub updated_at: DateTime<Utc>,
}

impl StatRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            value: row.get(1)?,
            kind: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }

    /// Integer value, or `None` if the stored text is not an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.value.parse().ok()
    }
}

pub(crate) fn from_db_size(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

pub(crate) fn to_db_size(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
