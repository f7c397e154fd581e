//! Retrying SQLite access layer for the catalog.
//!
//! # Overview
//!
//! [`Store`] owns the single connection to the catalog file and exposes one
//! entry point, [`Store::execute`]. Every unit of work runs inside an
//! immediate transaction that either commits in full or rolls back.
//!
//! # Retry Policy
//!
//! Failures are classified into a closed set of [`FailureKind`]s. Only
//! `Locked`, `HandleInvalid` and `SchemaNotReady` are retried; everything
//! else propagates on the first attempt. Between attempts the store sleeps
//! for `base_delay * 2^attempt` and, when the handle itself is suspect,
//! re-opens the connection before trying again.
//!
//! ```no_run
//! use dgcatalog::catalog::store::{RetryPolicy, Store};
//! use std::path::Path;
//!
//! let store = Store::open(Path::new("/tmp/catalog.db"), RetryPolicy::default()).unwrap();
//! let count: i64 = store
//!     .execute(|conn| conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0)))
//!     .unwrap();
//! println!("{count} files");
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use rusqlite::{Connection, ErrorCode, TransactionBehavior};
use thiserror::Error;

use super::schema;

/// How long SQLite waits on a busy database before reporting `Locked`.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Classified failure of a single store attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Another connection holds the lock.
    Locked,
    /// The connection or the backing file is unusable; reconnect before retrying.
    HandleInvalid,
    /// Tables are not visible yet (initialization race).
    SchemaNotReady,
    /// Constraint violations, type errors and other logic failures.
    Permanent,
}

impl FailureKind {
    /// Map a rusqlite error onto a failure kind.
    #[must_use]
    pub fn classify(err: &rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, message) => match failure.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => Self::Locked,
                ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::ApiMisuse => Self::HandleInvalid,
                ErrorCode::SchemaChanged => Self::SchemaNotReady,
                ErrorCode::Unknown
                    if message
                        .as_deref()
                        .is_some_and(|m| m.contains("no such table")) =>
                {
                    Self::SchemaNotReady
                }
                _ => Self::Permanent,
            },
            _ => Self::Permanent,
        }
    }

    /// Whether another attempt may succeed.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Permanent)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => write!(f, "locked"),
            Self::HandleInvalid => write!(f, "handle invalid"),
            Self::SchemaNotReady => write!(f, "schema not ready"),
            Self::Permanent => write!(f, "permanent"),
        }
    }
}

/// Errors surfaced by the catalog store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The catalog directory or file could not be created.
    #[error("catalog unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Transient failures persisted past the retry ceiling.
    #[error("catalog unavailable after {attempts} attempts ({kind}): {source}")]
    RetriesExhausted {
        attempts: u32,
        kind: FailureKind,
        #[source]
        source: rusqlite::Error,
    },

    /// Non-retryable database failure.
    #[error("catalog operation failed: {0}")]
    Permanent(#[source] rusqlite::Error),

    /// The store was closed.
    #[error("catalog store is closed")]
    Closed,
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles on each further failure.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given ceiling and base delay.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay to wait after the failed attempt with the given zero-based index.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }
}

/// The catalog store. Owns its connection; callers only see units of work.
pub struct Store {
    path: PathBuf,
    policy: RetryPolicy,
    conn: RefCell<Option<Connection>>,
    closed: Cell<bool>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("policy", &self.policy)
            .field("closed", &self.closed.get())
            .finish()
    }
}

impl Store {
    /// Open (or create) the catalog at `path` and make sure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the parent directory cannot be
    /// created, or a retry/permanent error if the schema cannot be applied.
    pub fn open(path: &Path, policy: RetryPolicy) -> Result<Self, StoreError> {
        ensure_parent_dir(path)?;

        let store = Self {
            path: path.to_path_buf(),
            policy,
            conn: RefCell::new(None),
            closed: Cell::new(false),
        };

        store.execute(|conn| conn.execute_batch(schema::SCHEMA))?;
        log::debug!("Catalog opened at {}", path.display());
        Ok(store)
    }

    /// Path of the backing catalog file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The retry policy in effect.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Release the connection. Calling it again is a no-op.
    pub fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        if let Some(conn) = self.conn.borrow_mut().take() {
            if let Err((_, e)) = conn.close() {
                log::warn!("Error closing catalog {}: {}", self.path.display(), e);
            }
        }
        log::debug!("Catalog closed: {}", self.path.display());
    }

    /// Run a unit of work inside a transaction, retrying transient failures.
    ///
    /// The closure may run more than once, so it must not carry side effects
    /// outside the database.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Permanent`] for non-retryable failures (first attempt)
    /// - [`StoreError::RetriesExhausted`] when every attempt failed transiently
    /// - [`StoreError::Closed`] after [`Store::close`]
    pub fn execute<T, F>(&self, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut(&Connection) -> rusqlite::Result<T>,
    {
        if self.closed.get() {
            return Err(StoreError::Closed);
        }

        let mut attempt = 0;
        loop {
            let err = match self.attempt(&mut op) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let kind = FailureKind::classify(&err);
            if !kind.is_retryable() {
                return Err(StoreError::Permanent(err));
            }

            attempt += 1;
            if attempt >= self.policy.max_attempts {
                log::error!(
                    "Catalog operation failed after {} attempts ({}): {}",
                    attempt,
                    kind,
                    err
                );
                return Err(StoreError::RetriesExhausted {
                    attempts: attempt,
                    kind,
                    source: err,
                });
            }

            let delay = self.policy.delay_for(attempt - 1);
            log::warn!(
                "Catalog {} (attempt {}/{}), retrying in {:?}: {}",
                kind,
                attempt,
                self.policy.max_attempts,
                delay,
                err
            );

            if kind == FailureKind::HandleInvalid || !self.connection_healthy() {
                self.reconnect();
            }
            thread::sleep(delay);
        }
    }

    fn attempt<T, F>(&self, op: &mut F) -> rusqlite::Result<T>
    where
        F: FnMut(&Connection) -> rusqlite::Result<T>,
    {
        let mut slot = self.conn.borrow_mut();
        let conn = match slot.take() {
            Some(conn) => conn,
            None => open_connection(&self.path)?,
        };
        let conn = slot.insert(conn);

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = op(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn connection_healthy(&self) -> bool {
        match self.conn.borrow().as_ref() {
            Some(conn) => conn
                .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .is_ok(),
            None => false,
        }
    }

    /// Drop the current handle; the next attempt opens a fresh one.
    fn reconnect(&self) {
        if let Some(conn) = self.conn.borrow_mut().take() {
            let _ = conn.close();
        }
        if let Err(e) = ensure_parent_dir(&self.path) {
            log::warn!("{}", e);
        }
        log::debug!("Catalog connection reset: {}", self.path.display());
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.close();
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| StoreError::Unavailable {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

fn open_connection(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(CONNECTION_TIMEOUT)?;
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;",
    )?;
    Ok(conn)
}
