//! Filesystem actions performed by the deduplication engine.
//!
//! This module provides functionality for:
//! - Moving files into the consolidation tree without overwriting
//! - Replacing duplicates with relative symbolic links
//!
//! ```no_run
//! use dgcatalog::actions::link::{relative_link_target, replace_with_symlink};
//! use std::path::Path;
//!
//! let dup = Path::new("/media/2024/01/0115/shoot/clip.mp4");
//! let master = Path::new("/media/.dg_consolidation/files/ab/cd/abcd_clip.mp4");
//! let target = relative_link_target(dup, master, 20).unwrap();
//! replace_with_symlink(dup, &target).unwrap();
//! ```

pub mod link;
pub mod relocate;

pub use link::{planned_link_target, relative_link_target, replace_with_symlink, LinkError};
pub use relocate::{move_file, MoveError, MoveResult};
