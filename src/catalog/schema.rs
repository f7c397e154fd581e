//! Catalog schema. Applied on every open; every statement is idempotent.

/// Tables and indexes of the catalog.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    original_path TEXT NOT NULL UNIQUE,
    file_name TEXT NOT NULL,
    file_size_bytes INTEGER NOT NULL,
    file_hash TEXT,
    created_at TEXT,
    year TEXT,
    month TEXT,
    month_day TEXT,
    project_name TEXT,
    scan_timestamp TEXT NOT NULL,
    is_duplicate INTEGER NOT NULL DEFAULT 0,
    master_file_id INTEGER,
    deduplication_status TEXT NOT NULL DEFAULT 'not_processed',
    deduplication_timestamp TEXT,
    FOREIGN KEY(master_file_id) REFERENCES files(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS paths (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id INTEGER NOT NULL,
    path_type TEXT NOT NULL CHECK (path_type IN ('original', 'consolidated', 'symlink')),
    path TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(file_id, path_type, path),
    FOREIGN KEY(file_id) REFERENCES files(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS duplicate_groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_hash TEXT NOT NULL UNIQUE,
    file_size_bytes INTEGER NOT NULL,
    master_file_id INTEGER,
    duplicate_count INTEGER NOT NULL DEFAULT 0,
    total_size_bytes INTEGER NOT NULL DEFAULT 0,
    space_saved_bytes INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    deduplicated_at TEXT,
    FOREIGN KEY(master_file_id) REFERENCES files(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS statistics (
    stat_name TEXT PRIMARY KEY,
    stat_value TEXT NOT NULL,
    stat_type TEXT,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_files_hash ON files(file_hash);
CREATE INDEX IF NOT EXISTS idx_files_size ON files(file_size_bytes);
CREATE INDEX IF NOT EXISTS idx_files_master ON files(master_file_id);
CREATE INDEX IF NOT EXISTS idx_files_status ON files(deduplication_status);
CREATE INDEX IF NOT EXISTS idx_paths_file ON paths(file_id);
CREATE INDEX IF NOT EXISTS idx_paths_type_path ON paths(path_type, path);
CREATE INDEX IF NOT EXISTS idx_dup_groups_master ON duplicate_groups(master_file_id);
";
