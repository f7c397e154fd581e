//! The deduplication engine.
//!
//! A run has four steps: pre-flight checks, consolidation of files that are
//! not duplicates, linking of every pending duplicate group, and recording
//! of the run's counters. Every file transition is filesystem-first: the
//! move or link happens, then the catalog is updated. A crash in between
//! leaves a file that the next run picks up again.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use super::layout::{consolidated_base_path, first_free_path};
use super::preflight::{available_space, check_space, probe_writable, Confirm, StdinConfirm};
use super::summary::DedupeSummary;
use super::{DedupeError, DedupeRunError};
use crate::actions::link::{planned_link_target, relative_link_target, replace_with_symlink};
use crate::actions::relocate::move_file;
use crate::catalog::{Catalog, DedupStatus, DuplicateGroup, FileRecord, PathType, StoreError};
use crate::progress::{ProgressCallback, PHASE_CONSOLIDATE, PHASE_LINK};

/// Default limit on `..` components in a link target.
pub const DEFAULT_MAX_LINK_DEPTH: usize = 20;

/// Deduplication options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupeConfig {
    /// Simulate every step without touching the filesystem or the catalog.
    pub dry_run: bool,
    /// Links needing this many `..` steps or more are refused.
    pub max_link_depth: usize,
    /// Skip the low-disk-space confirmation.
    pub assume_yes: bool,
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_link_depth: DEFAULT_MAX_LINK_DEPTH,
            assume_yes: false,
        }
    }
}

/// Why a single file or group was not processed.
enum StepError {
    Skipped(DedupeError),
    Store(StoreError),
}

impl From<DedupeError> for StepError {
    fn from(err: DedupeError) -> Self {
        Self::Skipped(err)
    }
}

impl From<StoreError> for StepError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<crate::actions::LinkError> for StepError {
    fn from(err: crate::actions::LinkError) -> Self {
        Self::Skipped(err.into())
    }
}

type StepResult<T> = Result<T, StepError>;

/// Mutable state of one run.
struct RunState {
    summary: DedupeSummary,
    /// Dry-run destinations by file id.
    planned: HashMap<i64, PathBuf>,
    /// Destinations claimed by the dry-run plan.
    reserved: HashSet<PathBuf>,
}

impl RunState {
    fn new(dry_run: bool) -> Self {
        Self {
            summary: DedupeSummary::new(dry_run),
            planned: HashMap::new(),
            reserved: HashSet::new(),
        }
    }

    /// Record a skipped step, or propagate a store failure.
    fn settle<T>(&mut self, result: StepResult<T>) -> Result<Option<T>, StoreError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(StepError::Skipped(err)) => {
                log::warn!("{err}");
                self.summary.errors.push(err);
                Ok(None)
            }
            Err(StepError::Store(err)) => Err(err),
        }
    }
}

/// Converts catalog grouping state into consolidated files and links.
pub struct Deduplicator<'a> {
    catalog: &'a Catalog,
    config: DedupeConfig,
    confirm: Box<dyn Confirm + 'a>,
    progress: Option<&'a dyn ProgressCallback>,
}

impl<'a> Deduplicator<'a> {
    /// Engine asking for confirmation on stdin.
    #[must_use]
    pub fn new(catalog: &'a Catalog, config: DedupeConfig) -> Self {
        Self {
            catalog,
            config,
            confirm: Box::new(StdinConfirm),
            progress: None,
        }
    }

    #[must_use]
    pub fn with_confirm(mut self, confirm: impl Confirm + 'a) -> Self {
        self.confirm = Box::new(confirm);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: &'a dyn ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run every step and return the summary.
    ///
    /// Per-file failures are collected in the summary and do not stop the run.
    ///
    /// # Errors
    ///
    /// - `Preflight` if the consolidation tree is not writable or the
    ///   operator refuses to continue on low disk space; nothing was changed
    /// - `Store` if the catalog becomes unavailable mid-run
    pub fn run(&self) -> Result<DedupeSummary, DedupeRunError> {
        if self.config.dry_run {
            log::info!("[DRY RUN] No files or catalog rows will be changed");
        }
        self.preflight()?;

        let mut run = RunState::new(self.config.dry_run);
        self.consolidate_unique(&mut run)?;
        self.process_groups(&mut run)?;

        let summary = run.summary;
        let counters = summary.counters();
        if !self.config.dry_run && !counters.is_empty() {
            self.catalog
                .statistics()
                .record_deduplication_counters(counters)?;
        }
        log::info!(
            "Deduplication finished: {} consolidated, {} linked, {} error(s)",
            summary.files_consolidated,
            summary.symlinks_created,
            summary.errors.len()
        );
        Ok(summary)
    }

    fn preflight(&self) -> Result<(), DedupeRunError> {
        let files_dir = self.catalog.files_dir();
        let target = if files_dir.is_dir() {
            files_dir
        } else {
            self.catalog.consolidation_dir().to_path_buf()
        };
        if self.config.dry_run {
            log::info!("[DRY RUN] Skipping write probe in {}", target.display());
        } else {
            probe_writable(&target)?;
        }

        let required: u64 = self
            .catalog
            .files()
            .list_pending()?
            .iter()
            .map(|f| f.size)
            .sum();
        log::debug!("Pending files need up to {} bytes", required);

        let available = available_space(&target);
        if self.config.assume_yes || self.config.dry_run {
            check_space(required, available, &|_: &str| true)?;
        } else {
            check_space(required, available, self.confirm.as_ref())?;
        }
        Ok(())
    }

    fn consolidate_unique(&self, run: &mut RunState) -> Result<(), StoreError> {
        let files = self.catalog.files().list_unique_pending()?;
        log::info!("Consolidating {} file(s) without duplicates", files.len());

        self.phase_start(PHASE_CONSOLIDATE, files.len());
        for (i, file) in files.iter().enumerate() {
            if let Some(p) = self.progress {
                p.on_progress(i + 1, &file.original_path.to_string_lossy());
            }
            let result = self.consolidate(file, run);
            run.settle(result)?;
        }
        self.phase_end(PHASE_CONSOLIDATE);
        Ok(())
    }

    fn process_groups(&self, run: &mut RunState) -> Result<(), StoreError> {
        let groups: Vec<DuplicateGroup> = self
            .catalog
            .duplicates()
            .pending_groups()?
            .into_iter()
            .filter(|g| !g.is_complete())
            .collect();
        log::info!("Processing {} duplicate group(s)", groups.len());

        self.phase_start(PHASE_LINK, groups.len());
        for (i, group) in groups.iter().enumerate() {
            if let Some(p) = self.progress {
                p.on_progress(i + 1, &group.hash);
            }
            self.process_group(group, run)?;
        }
        self.phase_end(PHASE_LINK);
        Ok(())
    }

    fn process_group(&self, group: &DuplicateGroup, run: &mut RunState) -> Result<(), StoreError> {
        let located = self.master_location(group, run);
        let Some(master_path) = run.settle(located)? else {
            return Ok(());
        };
        log::debug!("Group {} master at {}", group.hash, master_path.display());

        let members = self.catalog.duplicates().group_members(&group.hash)?;
        let mut complete = true;
        for member in members
            .iter()
            .filter(|m| Some(m.id) != group.master_file_id && !m.is_deduplicated())
        {
            let linked = self.link_duplicate(member, &master_path, run);
            if run.settle(linked)?.is_none() {
                complete = false;
            }
        }

        if complete {
            if !self.config.dry_run {
                self.catalog
                    .duplicates()
                    .mark_group_deduplicated(&group.hash)?;
            }
            run.summary.groups_processed += 1;
        }
        Ok(())
    }

    /// Move a file to its consolidated path and record it.
    fn consolidate(&self, file: &FileRecord, run: &mut RunState) -> StepResult<PathBuf> {
        if let Some(existing) = self.recorded_consolidation(file, run)? {
            return Ok(existing);
        }
        if fs::symlink_metadata(&file.original_path).is_err() {
            return Err(DedupeError::SourceMissing(file.original_path.clone()).into());
        }
        let destination = self.consolidated_path(file, &run.reserved)?;

        if self.config.dry_run {
            log::info!(
                "[DRY RUN] Would move {} -> {}",
                file.original_path.display(),
                destination.display()
            );
            run.reserved.insert(destination.clone());
            run.planned.insert(file.id, destination.clone());
        } else {
            move_file(&file.original_path, &destination).map_err(|source| {
                DedupeError::Consolidate {
                    path: file.original_path.clone(),
                    source,
                }
            })?;
            self.catalog
                .paths()
                .add_path(file.id, &destination, PathType::Consolidated)?;
            self.catalog
                .files()
                .mark_deduplicated(file.id, DedupStatus::Deduplicated)?;
            log::info!(
                "Moved {} -> {}",
                file.original_path.display(),
                destination.display()
            );
        }

        run.summary.files_consolidated += 1;
        if !file.is_deduplicated() {
            run.summary.files_deduplicated += 1;
        }
        Ok(destination)
    }

    /// First collision-free consolidated path for `file`.
    fn consolidated_path(
        &self,
        file: &FileRecord,
        reserved: &HashSet<PathBuf>,
    ) -> Result<PathBuf, StoreError> {
        let base = consolidated_base_path(
            &self.catalog.files_dir(),
            file.hash.as_deref(),
            &file.file_name,
        );
        let paths = self.catalog.paths();
        first_free_path(&base, |candidate| {
            if reserved.contains(candidate) || fs::symlink_metadata(candidate).is_ok() {
                return Ok(true);
            }
            paths.consolidated_path_exists(candidate)
        })
    }

    /// Consolidated location of the group's master, consolidating it if needed.
    fn master_location(&self, group: &DuplicateGroup, run: &mut RunState) -> StepResult<PathBuf> {
        let not_found = || DedupeError::MasterNotFound {
            hash: group.hash.clone(),
        };
        let master_id = group.master_file_id.ok_or_else(not_found)?;
        if let Some(planned) = run.planned.get(&master_id) {
            return Ok(planned.clone());
        }

        let master = self.catalog.files().find(master_id)?.ok_or_else(not_found)?;
        if let Some(existing) = self.recorded_consolidation(&master, run)? {
            return Ok(existing);
        }

        if fs::symlink_metadata(&master.original_path).is_err() {
            return Err(DedupeError::MasterMissing(master.original_path.clone()).into());
        }
        self.consolidate(&master, run)
    }

    /// Consolidated path already recorded for `file` and still on disk.
    ///
    /// A file moved by an interrupted run has this path while its status is
    /// still `not_processed`; it is marked here without moving anything.
    fn recorded_consolidation(
        &self,
        file: &FileRecord,
        run: &mut RunState,
    ) -> Result<Option<PathBuf>, StoreError> {
        let Some(existing) = self.catalog.paths().master_consolidated_path(file.id)? else {
            return Ok(None);
        };
        if !existing.exists() {
            log::warn!(
                "Recorded consolidated file {} is gone, consolidating again",
                existing.display()
            );
            return Ok(None);
        }

        if !file.is_deduplicated() {
            if self.config.dry_run {
                run.planned.insert(file.id, existing.clone());
            } else {
                self.catalog
                    .files()
                    .mark_deduplicated(file.id, DedupStatus::Deduplicated)?;
            }
            log::info!(
                "Already consolidated at {}, marking as deduplicated",
                existing.display()
            );
            run.summary.files_deduplicated += 1;
        }
        Ok(Some(existing))
    }

    /// Replace one duplicate with a relative link to `master_path`.
    fn link_duplicate(
        &self,
        member: &FileRecord,
        master_path: &Path,
        run: &mut RunState,
    ) -> StepResult<()> {
        let master_on_disk = master_path.exists();
        if !master_on_disk && !run.reserved.contains(master_path) {
            return Err(DedupeError::MasterMissing(master_path.to_path_buf()).into());
        }

        if fs::symlink_metadata(&member.original_path).is_err() {
            log::info!(
                "Duplicate already removed, marking as deduplicated: {}",
                member.original_path.display()
            );
            if !self.config.dry_run {
                self.catalog
                    .files()
                    .mark_deduplicated(member.id, DedupStatus::Deduplicated)?;
            }
            return Ok(());
        }

        let depth = self.config.max_link_depth;
        let target = if master_on_disk {
            relative_link_target(&member.original_path, master_path, depth)?
        } else {
            planned_link_target(&member.original_path, master_path, depth)?
        };

        if self.config.dry_run {
            log::info!(
                "[DRY RUN] Would link {} -> {}",
                member.original_path.display(),
                target.display()
            );
        } else {
            replace_with_symlink(&member.original_path, &target)?;
            self.catalog
                .paths()
                .add_path(member.id, &member.original_path, PathType::Symlink)?;
            self.catalog
                .files()
                .mark_deduplicated(member.id, DedupStatus::Deduplicated)?;
            log::info!(
                "Linked {} -> {}",
                member.original_path.display(),
                target.display()
            );
        }

        run.summary.symlinks_created += 1;
        run.summary.files_deduplicated += 1;
        run.summary.bytes_reclaimed += member.size;
        Ok(())
    }

    fn phase_start(&self, phase: &str, total: usize) {
        if let Some(p) = self.progress {
            p.on_phase_start(phase, total);
        }
    }

    fn phase_end(&self, phase: &str) {
        if let Some(p) = self.progress {
            p.on_phase_end(phase);
        }
    }
}
