//! Sampled BLAKE3 content fingerprint.
//!
//! # Overview
//!
//! Small files (under [`FULL_HASH_THRESHOLD`] bytes) are hashed in full.
//! Larger files are fingerprinted from three [`SAMPLE_SIZE`]-byte windows:
//! the start, the window centred on the midpoint, and the end. Each window
//! is digested separately, the three hex digests are concatenated in that
//! order and the concatenation is digested again.
//!
//! Digests are BLAKE3 truncated to [`FINGERPRINT_HEX_LEN`] lower-case hex
//! characters.
//!
//! # Example
//!
//! ```no_run
//! use dgcatalog::scanner::hasher::Hasher;
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let fingerprint = hasher.fingerprint(Path::new("clip.mp4")).unwrap();
//! assert_eq!(fingerprint.len(), 32);
//! ```

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use super::HashError;

/// Bytes per sampled window.
pub const SAMPLE_SIZE: u64 = 1024;

/// Files smaller than this are hashed in full.
pub const FULL_HASH_THRESHOLD: u64 = 5 * SAMPLE_SIZE;

/// Length of a fingerprint in hex characters (128 bits).
pub const FINGERPRINT_HEX_LEN: usize = 32;

/// Sentinel recorded when a file could not be read.
pub const HASH_ERROR: &str = "Error";

/// Sentinel recorded when hashing was turned off.
pub const HASH_SKIPPED: &str = "Skipped";

/// Whether a value may be stored and compared as a real fingerprint.
#[must_use]
pub fn is_usable_hash(hash: &str) -> bool {
    !hash.is_empty() && hash != HASH_ERROR && hash != HASH_SKIPPED
}

/// Computes content fingerprints. Holds no state between files.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hasher;

impl Hasher {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Fingerprint the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be opened or read.
    pub fn fingerprint(&self, path: &Path) -> Result<String, HashError> {
        self.read_fingerprint(path)
            .map_err(|e| HashError::from_io(path, e))
    }

    /// Fingerprint, or [`HASH_ERROR`] when the file cannot be read.
    #[must_use]
    pub fn fingerprint_or_sentinel(&self, path: &Path) -> String {
        match self.fingerprint(path) {
            Ok(hash) => hash,
            Err(e) => {
                log::warn!("{}", e);
                HASH_ERROR.to_string()
            }
        }
    }

    fn read_fingerprint(&self, path: &Path) -> io::Result<String> {
        let mut file = File::open(path)?;
        let size = file.metadata()?.len();

        if size < FULL_HASH_THRESHOLD {
            let mut hasher = blake3::Hasher::new();
            io::copy(&mut file, &mut hasher)?;
            return Ok(short_hex(&hasher.finalize()));
        }

        let mut joined = String::with_capacity(FINGERPRINT_HEX_LEN * 3);
        for offset in window_offsets(size) {
            let window = read_window(&mut file, offset)?;
            joined.push_str(&digest(&window));
        }
        Ok(digest(joined.as_bytes()))
    }
}

/// Start offsets of the first, middle and last windows for a sampled file.
#[must_use]
pub fn window_offsets(size: u64) -> [u64; 3] {
    let half = SAMPLE_SIZE / 2;
    [
        0,
        (size / 2).saturating_sub(half),
        size.saturating_sub(SAMPLE_SIZE),
    ]
}

fn read_window(file: &mut File, offset: u64) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::with_capacity(SAMPLE_SIZE as usize);
    file.take(SAMPLE_SIZE).read_to_end(&mut buf)?;
    Ok(buf)
}

fn digest(bytes: &[u8]) -> String {
    short_hex(&blake3::hash(bytes))
}

fn short_hex(hash: &blake3::Hash) -> String {
    let mut hex = hash.to_hex().to_string();
    hex.truncate(FINGERPRINT_HEX_LEN);
    hex
}
