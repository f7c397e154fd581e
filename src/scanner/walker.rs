//! Hierarchy walker using walkdir.
//!
//! # Overview
//!
//! Media trees are laid out as `root/<year>/<month>/<month_day>/<project>/`.
//! [`Walker::projects`] enumerates the project folders at exactly that depth
//! (or below one `<year>/<month>` subfolder), skipping dot-directories at
//! every level. [`Walker::video_files`] then walks one project recursively,
//! skipping symlinks, and keeps files with a configured video extension.
//!
//! # Example
//!
//! ```no_run
//! use dgcatalog::scanner::walker::Walker;
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/mnt/media"), vec!["mp4".into(), "mov".into()]);
//! for project in walker.projects(None).unwrap() {
//!     for file in walker.video_files(&project.path) {
//!         println!("{}: {}", project.hierarchy.project, file.unwrap().display());
//!     }
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::ScanError;
use crate::catalog::Hierarchy;

/// A project folder and its position in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFolder {
    pub path: PathBuf,
    pub hierarchy: Hierarchy,
}

/// Walks the fixed four-level media hierarchy.
#[derive(Debug, Clone)]
pub struct Walker {
    root: PathBuf,
    /// Lower-case extensions without the leading dot.
    extensions: HashSet<String>,
}

impl Walker {
    /// Create a walker for `root` accepting the given extensions.
    ///
    /// Extensions are matched case-insensitively; a leading dot is optional.
    #[must_use]
    pub fn new(root: &Path, extensions: Vec<String>) -> Self {
        Self {
            root: root.to_path_buf(),
            extensions: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Project folders under the root, or under `subfolder` (`<year>/<month>`).
    ///
    /// # Errors
    ///
    /// - [`ScanError::NotFound`] if the root or subfolder does not exist
    /// - [`ScanError::NotADirectory`] if it is not a directory
    /// - [`ScanError::OutsideRoot`] if the subfolder resolves outside the root
    pub fn projects(&self, subfolder: Option<&Path>) -> Result<Vec<ProjectFolder>, ScanError> {
        let root = checked_dir(&self.root)?;

        let Some(subfolder) = subfolder else {
            let mut projects = Vec::new();
            for year in subdirs(&root)? {
                for month in subdirs(&year)? {
                    self.collect_month(&month, &mut projects)?;
                }
            }
            return Ok(projects);
        };

        let month_dir = checked_dir(&root.join(subfolder))?;
        if !month_dir.starts_with(&root) {
            return Err(ScanError::OutsideRoot(subfolder.to_path_buf()));
        }
        let mut projects = Vec::new();
        self.collect_month(&month_dir, &mut projects)?;
        Ok(projects)
    }

    fn collect_month(&self, month: &Path, out: &mut Vec<ProjectFolder>) -> Result<(), ScanError> {
        let year_name = month.parent().map(dir_name).unwrap_or_default();
        let month_name = dir_name(month);
        for day in subdirs(month)? {
            let day_name = dir_name(&day);
            for project in subdirs(&day)? {
                out.push(ProjectFolder {
                    hierarchy: Hierarchy {
                        year: year_name.clone(),
                        month: month_name.clone(),
                        month_day: day_name.clone(),
                        project: dir_name(&project),
                    },
                    path: project,
                });
            }
        }
        Ok(())
    }

    /// Video files anywhere below a project folder, sorted by path.
    ///
    /// Unreadable entries are yielded as errors rather than stopping the walk.
    pub fn video_files<'a>(
        &'a self,
        project: &Path,
    ) -> impl Iterator<Item = Result<PathBuf, ScanError>> + 'a {
        WalkDir::new(project)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) => {
                    let file_type = entry.file_type();
                    if file_type.is_symlink() {
                        log::trace!("Skipping symlink: {}", entry.path().display());
                        return None;
                    }
                    if !file_type.is_file() || !self.is_video(entry.path()) {
                        return None;
                    }
                    Some(Ok(entry.into_path()))
                }
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    log::warn!("Walker error for {}: {}", path.display(), e);
                    Some(Err(ScanError::Io {
                        path,
                        source: std::io::Error::other(e.to_string()),
                    }))
                }
            })
    }

    /// Whether the path carries a configured video extension.
    #[must_use]
    pub fn is_video(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.contains(&e.to_lowercase()))
    }
}

fn checked_dir(path: &Path) -> Result<PathBuf, ScanError> {
    let resolved = fs::canonicalize(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ScanError::NotFound(path.to_path_buf()),
        std::io::ErrorKind::PermissionDenied => ScanError::PermissionDenied(path.to_path_buf()),
        _ => ScanError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    if !resolved.is_dir() {
        return Err(ScanError::NotADirectory(path.to_path_buf()));
    }
    Ok(resolved)
}

/// Non-hidden subdirectories, sorted by name. Symlinked directories are skipped.
fn subdirs(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let entries = fs::read_dir(dir).map_err(|source| ScanError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.path())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
