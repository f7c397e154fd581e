//! Outcome of one deduplication run.

use std::fmt::Write as _;

use bytesize::ByteSize;

use super::DedupeError;
use crate::catalog::DedupCounters;
use crate::error::ExitCode;

const RULE_WIDTH: usize = 60;

/// Counts and recoverable errors accumulated during a run.
#[derive(Debug, Default)]
pub struct DedupeSummary {
    pub dry_run: bool,
    /// Files moved into the consolidation tree.
    pub files_consolidated: u64,
    pub symlinks_created: u64,
    /// Files that reached the `deduplicated` state.
    pub files_deduplicated: u64,
    /// Bytes freed by replacing duplicates with links.
    pub bytes_reclaimed: u64,
    /// Groups marked complete during this run.
    pub groups_processed: u64,
    pub errors: Vec<DedupeError>,
}

impl DedupeSummary {
    #[must_use]
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    /// The run's deltas for the persisted counters.
    #[must_use]
    pub fn counters(&self) -> DedupCounters {
        DedupCounters {
            files_consolidated: self.files_consolidated,
            symlinks_created: self.symlinks_created,
            files_deduplicated: self.files_deduplicated,
        }
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// [`ExitCode::PartialSuccess`] when any error was recorded.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        if self.has_errors() {
            ExitCode::PartialSuccess
        } else {
            ExitCode::Success
        }
    }

    /// Human-readable summary showing at most `error_limit` errors.
    #[must_use]
    pub fn render(&self, error_limit: usize) -> String {
        let rule = "=".repeat(RULE_WIDTH);
        let mut out = String::new();
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Deduplication Summary");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Files consolidated: {}", self.files_consolidated);
        let _ = writeln!(out, "Symlinks created: {}", self.symlinks_created);
        let _ = writeln!(out, "Total files processed: {}", self.files_deduplicated);
        let _ = writeln!(out, "Groups completed: {}", self.groups_processed);
        let _ = writeln!(out, "Space reclaimed: {}", ByteSize::b(self.bytes_reclaimed));

        if self.has_errors() {
            let _ = writeln!(out, "Errors encountered: {}", self.errors.len());
            for err in self.errors.iter().take(error_limit) {
                let _ = writeln!(out, "  - {err}");
            }
            if self.errors.len() > error_limit {
                let _ = writeln!(
                    out,
                    "  ... and {} more errors",
                    self.errors.len() - error_limit
                );
            }
        }

        if self.dry_run {
            let _ = writeln!(out, "[DRY RUN] No actual changes were made");
        }
        out
    }
}
