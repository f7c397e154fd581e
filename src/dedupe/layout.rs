//! Naming inside the consolidation tree.
//!
//! Consolidated files live at `files/<h0h1>/<h2h3>/<hash>_<name>`. Files
//! without a usable hash go to `files/00/00/no_hash_<name>`. Names are
//! sanitized and collisions get a numeric suffix before the extension.

use std::path::{Path, PathBuf};

use unicode_normalization::UnicodeNormalization;

use crate::scanner::hasher::is_usable_hash;

/// Longest sanitized name, in characters, extension included.
pub const MAX_NAME_CHARS: usize = 200;

/// Shard and prefix used when a file has no usable hash.
pub const NO_HASH_SHARD: &str = "00";
pub const NO_HASH_PREFIX: &str = "no_hash";

const REPLACED: [char; 9] = ['/', '\\', '<', '>', ':', '"', '|', '?', '*'];

/// Make a file name safe for any common filesystem.
///
/// Separators and `< > : " | ? *` become `_`, the result is NFC-normalized
/// and truncated to [`MAX_NAME_CHARS`] characters keeping the extension.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if REPLACED.contains(&c) { '_' } else { c })
        .nfc()
        .collect();

    if cleaned.chars().count() <= MAX_NAME_CHARS {
        return cleaned;
    }

    let (stem, ext) = split_extension(&cleaned);
    let keep = MAX_NAME_CHARS.saturating_sub(ext.chars().count());
    let mut truncated: String = stem.chars().take(keep).collect();
    truncated.push_str(ext);
    if truncated.chars().count() > MAX_NAME_CHARS {
        // Extension alone exceeds the limit.
        return truncated.chars().take(MAX_NAME_CHARS).collect();
    }
    truncated
}

/// Consolidated location before collision handling.
#[must_use]
pub fn consolidated_base_path(files_dir: &Path, hash: Option<&str>, file_name: &str) -> PathBuf {
    let name = sanitize_file_name(file_name);
    let sharded = hash
        .filter(|h| is_usable_hash(h))
        .and_then(|h| Some((h.get(0..2)?, h.get(2..4)?, h)));

    match sharded {
        Some((first, second, hash)) => files_dir
            .join(first)
            .join(second)
            .join(format!("{hash}_{name}")),
        None => files_dir
            .join(NO_HASH_SHARD)
            .join(NO_HASH_SHARD)
            .join(format!("{NO_HASH_PREFIX}_{name}")),
    }
}

/// `dir/stem_N.ext` for `dir/stem.ext`.
#[must_use]
pub fn with_suffix(path: &Path, n: u32) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = split_extension(&name);
    path.with_file_name(format!("{stem}_{n}{ext}"))
}

/// First free path among `base`, `base_1`, `base_2`, ...
///
/// # Errors
///
/// Propagates the first error returned by `is_taken`.
pub fn first_free_path<E>(
    base: &Path,
    mut is_taken: impl FnMut(&Path) -> Result<bool, E>,
) -> Result<PathBuf, E> {
    if !is_taken(base)? {
        return Ok(base.to_path_buf());
    }
    let mut n = 1;
    loop {
        let candidate = with_suffix(base, n);
        if !is_taken(&candidate)? {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Split at the last dot, ignoring leading dots. The extension keeps its dot.
fn split_extension(name: &str) -> (&str, &str) {
    let leading = name.len() - name.trim_start_matches('.').len();
    match name[leading..].rfind('.') {
        Some(i) => name.split_at(leading + i),
        None => (name, ""),
    }
}
