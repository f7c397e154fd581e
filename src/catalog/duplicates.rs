//! Duplicate groups and the reconciliation that maintains them.
//!
//! # Overview
//!
//! Every time a hash is recorded the scanner calls
//! [`DuplicateRepository::reconcile_group`]. Reconciliation is split in two:
//! [`plan_reconciliation`] is a pure function from the current members of a
//! hash to the desired group state, and the repository applies that plan in
//! one unit of work. The oldest record (lowest id) is always the master.
//!
//! ```
//! use dgcatalog::catalog::duplicates::{plan_reconciliation, GroupMember, Reconciliation};
//!
//! let plan = plan_reconciliation(&[
//!     GroupMember { id: 3, size: 100 },
//!     GroupMember { id: 7, size: 100 },
//! ]);
//! match plan {
//!     Reconciliation::Group(group) => {
//!         assert_eq!(group.master_id, 3);
//!         assert_eq!(group.duplicates, vec![7]);
//!         assert_eq!(group.space_saved, 100);
//!     }
//!     Reconciliation::Dissolve => unreachable!(),
//! }
//! ```

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::files::query_files;
use super::models::{from_db_size, to_db_size, DuplicateGroup, FileRecord, GROUP_COLUMNS};
use super::store::{Store, StoreError};
use crate::scanner::hasher::is_usable_hash;

/// The part of a file record reconciliation looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupMember {
    pub id: i64,
    pub size: u64,
}

/// Desired state of a group with at least two members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPlan {
    pub master_id: i64,
    pub file_size: u64,
    pub duplicate_count: u64,
    pub total_size: u64,
    pub space_saved: u64,
    /// Non-master member ids, ascending.
    pub duplicates: Vec<i64>,
}

/// Outcome of reconciling one hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Fewer than two members: drop the group and clear duplicate markers.
    Dissolve,
    Group(GroupPlan),
}

/// Compute the group state for the current members of a hash.
///
/// Member order does not matter; the lowest id becomes master.
#[must_use]
pub fn plan_reconciliation(members: &[GroupMember]) -> Reconciliation {
    let mut members = members.to_vec();
    members.sort_by_key(|m| m.id);
    members.dedup_by_key(|m| m.id);

    let Some((master, rest)) = members.split_first() else {
        return Reconciliation::Dissolve;
    };
    if rest.is_empty() {
        return Reconciliation::Dissolve;
    }

    let total_size = members.iter().map(|m| m.size).sum::<u64>();
    Reconciliation::Group(GroupPlan {
        master_id: master.id,
        file_size: master.size,
        duplicate_count: rest.len() as u64,
        total_size,
        space_saved: total_size.saturating_sub(master.size),
        duplicates: rest.iter().map(|m| m.id).collect(),
    })
}

/// Operations over `duplicate_groups` and the duplicate markers on `files`.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateRepository<'a> {
    store: &'a Store,
}

impl<'a> DuplicateRepository<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Bring the group for `hash` in line with the files currently holding it.
    ///
    /// Sentinel hashes are ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be written.
    pub fn reconcile_group(&self, hash: &str) -> Result<Reconciliation, StoreError> {
        if !is_usable_hash(hash) {
            return Ok(Reconciliation::Dissolve);
        }
        let plan = self.store.execute(|conn| apply_reconciliation(conn, hash))?;
        match &plan {
            Reconciliation::Dissolve => log::debug!("No duplicate group for {}", hash),
            Reconciliation::Group(group) => log::debug!(
                "Group {}: master {} with {} duplicate(s)",
                hash,
                group.master_id,
                group.duplicate_count
            ),
        }
        Ok(plan)
    }

    /// Records holding `hash`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be read.
    pub fn group_members(&self, hash: &str) -> Result<Vec<FileRecord>, StoreError> {
        self.store
            .execute(|conn| query_files(conn, "WHERE file_hash = ?1 ORDER BY id", params![hash]))
    }

    /// Groups with at least one duplicate, complete or not, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be read.
    pub fn pending_groups(&self) -> Result<Vec<DuplicateGroup>, StoreError> {
        self.store.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {GROUP_COLUMNS} FROM duplicate_groups
                 WHERE duplicate_count > 0 ORDER BY id"
            ))?;
            let rows = stmt.query_map([], DuplicateGroup::from_row)?;
            rows.collect()
        })
    }

    /// Look up the group for a hash.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be read.
    pub fn find_group(&self, hash: &str) -> Result<Option<DuplicateGroup>, StoreError> {
        self.store.execute(|conn| {
            conn.query_row(
                &format!("SELECT {GROUP_COLUMNS} FROM duplicate_groups WHERE group_hash = ?1"),
                params![hash],
                DuplicateGroup::from_row,
            )
            .optional()
        })
    }

    /// Mark a group complete. The first timestamp wins.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be written.
    pub fn mark_group_deduplicated(&self, hash: &str) -> Result<(), StoreError> {
        self.store.execute(|conn| {
            conn.execute(
                "UPDATE duplicate_groups SET deduplicated_at = ?1
                 WHERE group_hash = ?2 AND deduplicated_at IS NULL",
                params![Utc::now(), hash],
            )
            .map(|_| ())
        })
    }
}

fn apply_reconciliation(conn: &Connection, hash: &str) -> rusqlite::Result<Reconciliation> {
    let members = {
        let mut stmt =
            conn.prepare("SELECT id, file_size_bytes FROM files WHERE file_hash = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![hash], |row| {
            Ok(GroupMember {
                id: row.get(0)?,
                size: from_db_size(row.get(1)?),
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    let plan = plan_reconciliation(&members);
    match &plan {
        Reconciliation::Dissolve => {
            conn.execute(
                "DELETE FROM duplicate_groups WHERE group_hash = ?1",
                params![hash],
            )?;
            conn.execute(
                "UPDATE files SET is_duplicate = 0, master_file_id = NULL WHERE file_hash = ?1",
                params![hash],
            )?;
        }
        Reconciliation::Group(group) => {
            conn.execute(
                "UPDATE files SET is_duplicate = 0, master_file_id = NULL WHERE id = ?1",
                params![group.master_id],
            )?;
            conn.execute(
                "UPDATE files SET is_duplicate = 1, master_file_id = ?1
                 WHERE file_hash = ?2 AND id != ?1",
                params![group.master_id, hash],
            )?;
            conn.execute(
                "INSERT INTO duplicate_groups (group_hash, file_size_bytes, master_file_id,
                     duplicate_count, total_size_bytes, space_saved_bytes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(group_hash) DO UPDATE SET
                     file_size_bytes = excluded.file_size_bytes,
                     master_file_id = excluded.master_file_id,
                     duplicate_count = excluded.duplicate_count,
                     total_size_bytes = excluded.total_size_bytes,
                     space_saved_bytes = excluded.space_saved_bytes",
                params![
                    hash,
                    to_db_size(group.file_size),
                    group.master_id,
                    to_db_size(group.duplicate_count),
                    to_db_size(group.total_size),
                    to_db_size(group.space_saved),
                    Utc::now(),
                ],
            )?;
        }
    }
    Ok(plan)
}
