//! Markdown catalog report.
//!
//! [`Report::collect`] runs read-only aggregate queries; [`Report::render`]
//! turns the result into Markdown.

use std::fmt::Write as _;
use std::path::PathBuf;

use bytesize::ByteSize;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::catalog::models::{from_db_size, StatRecord};
use crate::catalog::{Catalog, StoreError};

/// Rows shown in each top-projects table.
pub const TOP_PROJECTS: usize = 10;

/// Files and bytes for one year folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearRow {
    pub year: String,
    pub files: u64,
    pub bytes: u64,
}

/// Files and bytes for one project folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRow {
    pub year: String,
    pub month: String,
    pub month_day: String,
    pub project: String,
    pub files: u64,
    pub bytes: u64,
}

/// Snapshot of the catalog.
#[derive(Debug, Clone)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub scan_root: PathBuf,
    pub total_files: u64,
    pub total_bytes: u64,
    pub total_projects: u64,
    pub duplicate_files: u64,
    pub duplicate_groups: u64,
    pub space_saved: u64,
    pub by_year: Vec<YearRow>,
    pub top_by_count: Vec<ProjectRow>,
    pub top_by_size: Vec<ProjectRow>,
    /// `(status, files)` pairs.
    pub status: Vec<(String, u64)>,
    pub statistics: Vec<StatRecord>,
}

impl Report {
    /// Gather every aggregate in one unit of work.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the catalog cannot be read.
    pub fn collect(catalog: &Catalog) -> Result<Self, StoreError> {
        let statistics = catalog.statistics().list()?;
        let scan_root = catalog.scan_root().to_path_buf();
        catalog.store().execute(|conn| {
            Ok(Self {
                generated_at: Utc::now(),
                scan_root: scan_root.clone(),
                total_files: scalar(conn, "SELECT COUNT(*) FROM files")?,
                total_bytes: scalar(conn, "SELECT COALESCE(SUM(file_size_bytes), 0) FROM files")?,
                total_projects: scalar(
                    conn,
                    "SELECT COUNT(*) FROM (SELECT DISTINCT year, month, month_day, project_name
                     FROM files)",
                )?,
                duplicate_files: scalar(conn, "SELECT COUNT(*) FROM files WHERE is_duplicate = 1")?,
                duplicate_groups: scalar(
                    conn,
                    "SELECT COUNT(*) FROM duplicate_groups WHERE duplicate_count > 0",
                )?,
                space_saved: scalar(
                    conn,
                    "SELECT COALESCE(SUM(space_saved_bytes), 0) FROM duplicate_groups",
                )?,
                by_year: by_year(conn)?,
                top_by_count: top_projects(conn, "files DESC, bytes DESC")?,
                top_by_size: top_projects(conn, "bytes DESC, files DESC")?,
                status: status_breakdown(conn)?,
                statistics: statistics.clone(),
            })
        })
    }

    #[must_use]
    pub fn average_size(&self) -> u64 {
        self.total_bytes.checked_div(self.total_files).unwrap_or(0)
    }

    #[must_use]
    pub fn duplicate_percentage(&self) -> f64 {
        percentage(self.duplicate_files, self.total_files)
    }

    #[must_use]
    pub fn space_saved_percentage(&self) -> f64 {
        percentage(self.space_saved, self.total_bytes)
    }

    /// Render as Markdown.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Video Catalog Report\n");
        let _ = writeln!(
            out,
            "Generated: {}  ",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(out, "Root: `{}`\n", self.scan_root.display());

        let _ = writeln!(out, "## Summary\n");
        let _ = writeln!(out, "| Metric | Value |");
        let _ = writeln!(out, "|---|---|");
        let _ = writeln!(out, "| Total files | {} |", self.total_files);
        let _ = writeln!(out, "| Total size | {} |", ByteSize::b(self.total_bytes));
        let _ = writeln!(out, "| Projects | {} |", self.total_projects);
        let _ = writeln!(out, "| Average file size | {} |", ByteSize::b(self.average_size()));
        let _ = writeln!(
            out,
            "| Duplicate files | {} ({:.2}%) |",
            self.duplicate_files,
            self.duplicate_percentage()
        );
        let _ = writeln!(out, "| Duplicate groups | {} |", self.duplicate_groups);
        let _ = writeln!(
            out,
            "| Space saved | {} ({:.2}%) |",
            ByteSize::b(self.space_saved),
            self.space_saved_percentage()
        );

        if !self.by_year.is_empty() {
            let _ = writeln!(out, "\n## Files by Year\n");
            let _ = writeln!(out, "| Year | Files | Size |");
            let _ = writeln!(out, "|---|---|---|");
            for row in &self.by_year {
                let _ = writeln!(out, "| {} | {} | {} |", row.year, row.files, ByteSize::b(row.bytes));
            }
        }

        for (title, rows) in [
            ("Top Projects by File Count", &self.top_by_count),
            ("Top Projects by Size", &self.top_by_size),
        ] {
            if rows.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n## {title}\n");
            let _ = writeln!(out, "| Project | Date | Files | Size |");
            let _ = writeln!(out, "|---|---|---|---|");
            for row in rows {
                let _ = writeln!(
                    out,
                    "| {} | {}/{}/{} | {} | {} |",
                    row.project,
                    row.year,
                    row.month,
                    row.month_day,
                    row.files,
                    ByteSize::b(row.bytes)
                );
            }
        }

        if !self.status.is_empty() {
            let _ = writeln!(out, "\n## Deduplication Status\n");
            let _ = writeln!(out, "| Status | Files |");
            let _ = writeln!(out, "|---|---|");
            for (status, files) in &self.status {
                let _ = writeln!(out, "| {status} | {files} |");
            }
        }

        if !self.statistics.is_empty() {
            let _ = writeln!(out, "\n## Stored Statistics\n");
            let _ = writeln!(out, "| Name | Value | Updated |");
            let _ = writeln!(out, "|---|---|---|");
            for stat in &self.statistics {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} |",
                    stat.name,
                    stat.value,
                    stat.updated_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        out
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn scalar(conn: &Connection, sql: &str) -> rusqlite::Result<u64> {
    conn.query_row(sql, [], |row| row.get::<_, i64>(0))
        .map(from_db_size)
}

fn by_year(conn: &Connection) -> rusqlite::Result<Vec<YearRow>> {
    let mut stmt = conn.prepare(
        "SELECT COALESCE(year, ''), COUNT(*), COALESCE(SUM(file_size_bytes), 0)
         FROM files GROUP BY year ORDER BY year",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(YearRow {
            year: row.get(0)?,
            files: from_db_size(row.get(1)?),
            bytes: from_db_size(row.get(2)?),
        })
    })?;
    rows.collect()
}

fn top_projects(conn: &Connection, order: &str) -> rusqlite::Result<Vec<ProjectRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT COALESCE(year, ''), COALESCE(month, ''), COALESCE(month_day, ''),
                COALESCE(project_name, ''), COUNT(*) AS files,
                COALESCE(SUM(file_size_bytes), 0) AS bytes
         FROM files
         GROUP BY year, month, month_day, project_name
         ORDER BY {order}
         LIMIT {TOP_PROJECTS}"
    ))?;
    let rows = stmt.query_map([], |row| {
        Ok(ProjectRow {
            year: row.get(0)?,
            month: row.get(1)?,
            month_day: row.get(2)?,
            project: row.get(3)?,
            files: from_db_size(row.get(4)?),
            bytes: from_db_size(row.get(5)?),
        })
    })?;
    rows.collect()
}

fn status_breakdown(conn: &Connection) -> rusqlite::Result<Vec<(String, u64)>> {
    let mut stmt = conn.prepare(
        "SELECT deduplication_status, COUNT(*) FROM files
         GROUP BY deduplication_status ORDER BY deduplication_status",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, from_db_size(row.get(1)?))))?;
    rows.collect()
}
