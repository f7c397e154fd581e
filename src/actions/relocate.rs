//! Moving files into the consolidation tree.
//!
//! # Overview
//!
//! [`move_file`] never overwrites: the destination must not exist. It tries
//! a plain rename first and falls back to copy + remove when the source and
//! destination live on different volumes. A failed copy leaves the source
//! untouched and removes the partial destination.
//!
//! # Example
//!
//! ```no_run
//! use dgcatalog::actions::relocate::move_file;
//! use std::path::Path;
//!
//! let moved = move_file(
//!     Path::new("/media/2024/01/0115/shoot/clip.mp4"),
//!     Path::new("/media/.dg_consolidation/files/ab/cd/abcd_clip.mp4"),
//! )
//! .unwrap();
//! println!("moved {} bytes", moved.size);
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Error type for move operations.
#[derive(Debug, Error)]
pub enum MoveError {
    /// Source file was not found.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Destination already exists; nothing is overwritten.
    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),

    /// Permission denied at the source or destination.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MoveError {
    /// Get the path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p)
            | Self::DestinationExists(p)
            | Self::PermissionDenied(p)
            | Self::Io { path: p, .. } => p,
        }
    }

    fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            io::ErrorKind::AlreadyExists => Self::DestinationExists(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// Result of a successful move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveResult {
    pub destination: PathBuf,
    pub size: u64,
    /// The rename failed and the file was copied instead.
    pub copied: bool,
}

/// Move `source` to `destination`, creating parent directories as needed.
///
/// # Errors
///
/// - `NotFound` if the source doesn't exist
/// - `DestinationExists` if something is already at the destination
/// - `PermissionDenied` / `Io` for other failures
pub fn move_file(source: &Path, destination: &Path) -> Result<MoveResult, MoveError> {
    let metadata = fs::metadata(source).map_err(|e| MoveError::from_io(source, e))?;
    if fs::symlink_metadata(destination).is_ok() {
        return Err(MoveError::DestinationExists(destination.to_path_buf()));
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| MoveError::from_io(parent, e))?;
    }

    let size = metadata.len();
    match fs::rename(source, destination) {
        Ok(()) => {
            log::debug!("Renamed {} -> {}", source.display(), destination.display());
            Ok(MoveResult {
                destination: destination.to_path_buf(),
                size,
                copied: false,
            })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(MoveError::NotFound(source.to_path_buf())),
        Err(e) => {
            log::debug!(
                "Rename failed for {} ({}), copying instead",
                source.display(),
                e
            );
            copy_then_remove(source, destination)?;
            Ok(MoveResult {
                destination: destination.to_path_buf(),
                size,
                copied: true,
            })
        }
    }
}

fn copy_then_remove(source: &Path, destination: &Path) -> Result<(), MoveError> {
    let mut reader = fs::File::open(source).map_err(|e| MoveError::from_io(source, e))?;
    let mut writer = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)
        .map_err(|e| MoveError::from_io(destination, e))?;

    let copied = io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all());
    if let Err(e) = copied {
        drop(writer);
        if let Err(cleanup) = fs::remove_file(destination) {
            log::warn!(
                "Failed to remove partial copy {}: {}",
                destination.display(),
                cleanup
            );
        }
        return Err(MoveError::from_io(destination, e));
    }
    if let Ok(metadata) = fs::metadata(source) {
        if let Err(e) = fs::set_permissions(destination, metadata.permissions()) {
            log::debug!("Could not copy permissions to {}: {}", destination.display(), e);
        }
    }

    fs::remove_file(source).map_err(|e| MoveError::from_io(source, e))
}
