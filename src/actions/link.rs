//! Replacing duplicates with relative symbolic links.
//!
//! # Overview
//!
//! Links always use a target relative to the link's own directory, so a
//! tree stays valid when it is mounted under a different absolute root.
//! [`relative_link_target`] canonicalizes both ends and refuses targets that
//! climb too many parent directories; [`replace_with_symlink`] swaps the
//! file for the link by renaming a freshly created link over it.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Error type for link operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// A path could not be resolved to canonical form.
    #[error("cannot resolve {path}: {source}")]
    Unresolvable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No relative path exists between the two locations (e.g. different volumes).
    #[error("cannot compute relative path from {from} to {to}")]
    NoRelativePath { from: PathBuf, to: PathBuf },

    /// The relative target climbs too many parent directories.
    #[error("relative path too deep for {path}: {depth} levels")]
    TooDeep { path: PathBuf, depth: usize },

    /// Creating the link or swapping it into place failed.
    #[error("error creating symlink {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LinkError {
    /// Get the path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Unresolvable { path, .. }
            | Self::TooDeep { path, .. }
            | Self::Create { path, .. } => path,
            Self::NoRelativePath { from, .. } => from,
        }
    }
}

/// Relative path from directory `base` to `target`, both absolute.
///
/// Returns `None` when the paths have different roots or prefixes, or when
/// either contains `..` components.
#[must_use]
pub fn relative_path(target: &Path, base: &Path) -> Option<PathBuf> {
    if !target.is_absolute() || !base.is_absolute() {
        return None;
    }
    let target: Vec<Component<'_>> = target.components().collect();
    let base: Vec<Component<'_>> = base.components().collect();
    if [&target, &base]
        .iter()
        .any(|c| c.iter().any(|c| matches!(c, Component::ParentDir)))
    {
        return None;
    }
    if target.first() != base.first() {
        return None;
    }

    let common = target
        .iter()
        .zip(&base)
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &target[common..] {
        relative.push(component.as_os_str());
    }
    Some(relative)
}

/// Number of leading `..` components.
#[must_use]
pub fn parent_depth(path: &Path) -> usize {
    path.components()
        .take_while(|c| matches!(c, Component::ParentDir))
        .count()
}

/// Relative target for a link at `link_path` pointing at `target`.
///
/// # Errors
///
/// - `Unresolvable` if either end cannot be canonicalized
/// - `NoRelativePath` if no relative path exists
/// - `TooDeep` if the path needs `max_depth` or more `..` steps
pub fn relative_link_target(
    link_path: &Path,
    target: &Path,
    max_depth: usize,
) -> Result<PathBuf, LinkError> {
    let target_abs = fs::canonicalize(target).map_err(|source| LinkError::Unresolvable {
        path: target.to_path_buf(),
        source,
    })?;
    link_target_from(link_path, &target_abs, max_depth)
}

/// Same as [`relative_link_target`] for a target that does not exist yet.
///
/// The deepest existing ancestor of `target` is canonicalized and the
/// remaining components are appended unchanged.
///
/// # Errors
///
/// Same as [`relative_link_target`].
pub fn planned_link_target(
    link_path: &Path,
    target: &Path,
    max_depth: usize,
) -> Result<PathBuf, LinkError> {
    let target_abs = canonicalize_existing_prefix(target).map_err(|source| {
        LinkError::Unresolvable {
            path: target.to_path_buf(),
            source,
        }
    })?;
    link_target_from(link_path, &target_abs, max_depth)
}

fn link_target_from(
    link_path: &Path,
    target_abs: &Path,
    max_depth: usize,
) -> Result<PathBuf, LinkError> {
    let link_dir = link_path.parent().unwrap_or_else(|| Path::new("."));
    let link_dir = fs::canonicalize(link_dir).map_err(|source| LinkError::Unresolvable {
        path: link_path.to_path_buf(),
        source,
    })?;

    let relative = relative_path(target_abs, &link_dir).ok_or_else(|| LinkError::NoRelativePath {
        from: link_path.to_path_buf(),
        to: target_abs.to_path_buf(),
    })?;

    let depth = parent_depth(&relative);
    if depth >= max_depth {
        return Err(LinkError::TooDeep {
            path: link_path.to_path_buf(),
            depth,
        });
    }
    Ok(relative)
}

fn canonicalize_existing_prefix(path: &Path) -> io::Result<PathBuf> {
    for ancestor in path.ancestors() {
        if let (Ok(base), Ok(rest)) = (fs::canonicalize(ancestor), path.strip_prefix(ancestor)) {
            return Ok(if rest.as_os_str().is_empty() {
                base
            } else {
                base.join(rest)
            });
        }
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no existing ancestor of {}", path.display()),
    ))
}

/// Replace the file at `path` with a symbolic link to `target`.
///
/// The link is created beside the file and renamed over it, so `path` is
/// never left missing.
///
/// # Errors
///
/// Returns `Create` if the link cannot be created or moved into place.
pub fn replace_with_symlink(path: &Path, target: &Path) -> Result<(), LinkError> {
    let temp = temp_link_path(path);
    let create_err = |source| LinkError::Create {
        path: path.to_path_buf(),
        source,
    };

    if fs::symlink_metadata(&temp).is_ok() {
        fs::remove_file(&temp).map_err(create_err)?;
    }
    symlink(target, &temp).map_err(create_err)?;

    if let Err(e) = fs::rename(&temp, path) {
        if let Err(cleanup) = fs::remove_file(&temp) {
            log::warn!("Failed to remove temporary link {}: {}", temp.display(), cleanup);
        }
        return Err(create_err(e));
    }
    Ok(())
}

fn temp_link_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.dglink{}", std::process::id()))
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}
