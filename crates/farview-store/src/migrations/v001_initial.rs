//! v001 -- Initial schema creation.
//!
//! Creates the five catalog tables: `folder`, `device`, `directory`, `file`
//! and `block`. Deletion cascades folder -> directory -> file -> block and
//! folder -> device.

use rusqlite::Connection;

/// SQL executed when creating a fresh database.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Folders
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS folder (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    id_string TEXT NOT NULL UNIQUE,            -- peer-assigned folder id
    label     TEXT NOT NULL DEFAULT '',
    path      TEXT NOT NULL DEFAULT '',        -- local mount label
    flags     INTEGER NOT NULL DEFAULT 0
);

-- ----------------------------------------------------------------
-- Devices (per folder)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS device (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    device_id             BLOB NOT NULL,       -- 32-byte certificate fingerprint
    folder_id             INTEGER NOT NULL,
    name                  TEXT NOT NULL DEFAULT '',
    addresses             TEXT NOT NULL DEFAULT '',  -- comma-joined
    max_sequence          INTEGER NOT NULL DEFAULT 0,
    max_sequence_internal INTEGER NOT NULL DEFAULT 0,
    index_id              BLOB NOT NULL,       -- 8 big-endian bytes

    UNIQUE (device_id, folder_id),
    FOREIGN KEY (folder_id) REFERENCES folder(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Directories (absolute names, `/` is the folder root)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS directory (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    folder_id   INTEGER NOT NULL,
    name        TEXT NOT NULL,
    permissions INTEGER NOT NULL DEFAULT 0,
    modified_s  INTEGER NOT NULL DEFAULT 0,
    modified_ns INTEGER NOT NULL DEFAULT 0,
    modified_by BLOB,
    flags       INTEGER NOT NULL DEFAULT 0,    -- bit0 deleted, bit1 invalid, bit2 no-permissions
    sequence    INTEGER NOT NULL DEFAULT 0,
    version     TEXT NOT NULL DEFAULT '',
    sync        INTEGER NOT NULL DEFAULT 2,    -- 0 none, 1 download, 2 full

    UNIQUE (folder_id, name),
    FOREIGN KEY (folder_id) REFERENCES folder(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Files (and symlinks: non-empty symlink_target)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS file (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    directory_id   INTEGER NOT NULL,
    name           TEXT NOT NULL,
    size           INTEGER NOT NULL DEFAULT 0,
    permissions    INTEGER NOT NULL DEFAULT 0,
    modified_s     INTEGER NOT NULL DEFAULT 0,
    modified_ns    INTEGER NOT NULL DEFAULT 0,
    modified_by    BLOB,
    flags          INTEGER NOT NULL DEFAULT 0,
    sequence       INTEGER NOT NULL DEFAULT 0,
    block_size     INTEGER NOT NULL DEFAULT 0,
    version        TEXT NOT NULL DEFAULT '',
    symlink_target TEXT NOT NULL DEFAULT '',
    sync           INTEGER NOT NULL DEFAULT 2,

    UNIQUE (directory_id, name),
    FOREIGN KEY (directory_id) REFERENCES directory(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Blocks (content-addressed slices of files)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS block (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id INTEGER NOT NULL,
    offset  INTEGER NOT NULL,
    size    INTEGER NOT NULL DEFAULT 0,
    hash    BLOB NOT NULL,
    cached  INTEGER NOT NULL DEFAULT 0,        -- 0 absent, 1 present, 2 stale

    -- No UNIQUE on (file_id, offset): a stale size-0 tail may briefly share
    -- an offset with a live row until cache cleanup removes it.
    FOREIGN KEY (file_id) REFERENCES file(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_directory_folder_name ON directory(folder_id, name);
CREATE INDEX IF NOT EXISTS idx_file_directory_name ON file(directory_id, name);
CREATE INDEX IF NOT EXISTS idx_block_file_offset ON block(file_id, offset);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
