//! Pre-flight checks run before any file is moved.
//!
//! Two checks: the consolidation tree must be writable (probed with a
//! write + delete), and the volume should have room for every pending file.
//! The first is fatal; the second asks for confirmation.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use sysinfo::Disks;
use thiserror::Error;

/// Name of the probe file written during the writability check.
const PROBE_FILE_NAME: &str = ".test_write";

/// Fatal precondition failures. Nothing has been modified when one is returned.
#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("cannot write to consolidation folder {path}: {source}")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("insufficient disk space: {available} bytes available, {required} bytes needed")]
    InsufficientSpace { available: u64, required: u64 },
}

/// Asks the operator to approve a risky step.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Prompts on stderr and reads a `y`/`yes` answer from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        let mut stderr = io::stderr();
        if write!(stderr, "{prompt} (y/N): ").and_then(|()| stderr.flush()).is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

/// Write and delete a probe file in `dir`.
///
/// # Errors
///
/// Returns [`PreflightError::NotWritable`] if either step fails.
pub fn probe_writable(dir: &Path) -> Result<(), PreflightError> {
    let probe = dir.join(PROBE_FILE_NAME);
    let not_writable = |source| PreflightError::NotWritable {
        path: dir.to_path_buf(),
        source,
    };
    fs::write(&probe, b"test").map_err(not_writable)?;
    fs::remove_file(&probe).map_err(not_writable)?;
    Ok(())
}

/// Free space on the volume holding `path`, if it can be determined.
#[must_use]
pub fn available_space(path: &Path) -> Option<u64> {
    let path = fs::canonicalize(path).ok()?;
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}

/// Compare `required` bytes against `available`, asking `confirm` when short.
///
/// Unknown free space passes with a warning.
///
/// # Errors
///
/// Returns [`PreflightError::InsufficientSpace`] when space is short and the
/// operator declines.
pub fn check_space(
    required: u64,
    available: Option<u64>,
    confirm: &dyn Confirm,
) -> Result<(), PreflightError> {
    let Some(available) = available else {
        log::warn!("Could not determine free space on the consolidation volume");
        return Ok(());
    };
    if available >= required {
        return Ok(());
    }

    log::warn!(
        "Available space ({}) may be insufficient; estimated need {}",
        ByteSize::b(available),
        ByteSize::b(required)
    );
    if confirm.confirm("Continue anyway?") {
        log::warn!("Continuing despite low disk space");
        Ok(())
    } else {
        Err(PreflightError::InsufficientSpace {
            available,
            required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    #[test]
    fn test_probe_leaves_no_trace() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        probe_writable(dir.path()).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_probe_missing_directory_fails() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let err = probe_writable(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, PreflightError::NotWritable { .. }));
    }

    #[test]
    fn test_enough_space_does_not_ask() {
        let asked = Cell::new(false);
        let confirm = |_: &str| {
            asked.set(true);
            false
        };
        check_space(100, Some(1000), &confirm).unwrap();
        assert!(!asked.get());
    }

    #[test]
    fn test_low_space_requires_confirmation() {
        let decline = |_: &str| false;
        let err = check_space(1000, Some(10), &decline).unwrap_err();
        assert!(matches!(
            err,
            PreflightError::InsufficientSpace {
                available: 10,
                required: 1000
            }
        ));

        let accept = |_: &str| true;
        check_space(1000, Some(10), &accept).unwrap();
    }

    #[test]
    fn test_unknown_space_passes() {
        let decline = |_: &str| false;
        check_space(u64::MAX, None, &decline).unwrap();
    }

}
