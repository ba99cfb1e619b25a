//! Index application: one exclusive transaction per wire message.
//!
//! Every mutation gets a fresh local sequence drawn from the peer device's
//! `max_sequence_internal`, written back at commit. The return value reports
//! whether anything under a full-sync parent was added or modified, which is
//! the signal that cached data may need a refresh.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use farview_proto::index::{BlockRecord, DirectoryRecord, EntryMeta, FileRecord, IndexMessage};
use farview_shared::types::{SyncLevel, FLAG_DELETED};

use crate::cluster::ensure_root_directory;
use crate::database::Store;
use crate::error::{Result, StoreError};
use crate::models::CacheState;

impl Store {
    /// Apply one `Index` or `IndexUpdate` message atomically.
    ///
    /// Returns `true` iff an entry under a full-sync parent was added or
    /// modified. Re-applying the same message is a no-op returning `false`.
    pub fn apply_index(&self, index: &IndexMessage) -> Result<bool> {
        let mut conn = self.writer();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Exclusive)?;

        let folder_id: i64 = tx
            .query_row(
                "SELECT id FROM folder WHERE id_string = ?1",
                params![index.folder],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StoreError::UnknownFolder(index.folder.clone()))?;
        ensure_root_directory(&tx, folder_id)?;

        // The ingest counter lives on the peer's device row for this folder.
        let (device_row, mut seq): (i64, i64) = tx
            .query_row(
                "SELECT id, max_sequence_internal FROM device
                 WHERE folder_id = ?1 AND device_id != ?2",
                params![folder_id, self.local_id().as_bytes().as_slice()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| StoreError::MissingDevice(index.folder.clone(), "peer"))?;

        let mut updated = false;
        for dir in &index.directories {
            let parent_sync = parent_sync(&tx, folder_id, &dir.name)?;
            let applied = apply_directory(&tx, folder_id, dir, parent_sync, &mut seq, &mut updated)?;
            let Some((dir_row, dir_sync)) = applied else {
                continue;
            };
            for file in &dir.files {
                if let Some(file_row) =
                    apply_file(&tx, dir_row, dir_sync, file, &mut seq, &mut updated)?
                {
                    reconcile_blocks(&tx, file_row, &file.blocks)?;
                }
            }
        }

        tx.execute(
            "UPDATE device SET max_sequence_internal = ?2 WHERE id = ?1",
            params![device_row, seq],
        )?;
        tx.commit()?;

        tracing::debug!(folder = %index.folder, updated, "applied index message");
        Ok(updated)
    }
}

struct ExistingEntry {
    id: i64,
    size: i64,
    permissions: i64,
    modified_s: i64,
    modified_ns: i64,
    modified_by: Option<Vec<u8>>,
    flags: i64,
    block_size: i64,
    version: String,
    symlink_target: String,
    sync: SyncLevel,
}

impl ExistingEntry {
    fn matches_dir(&self, meta: &EntryMeta) -> bool {
        self.permissions == meta.permissions as i64
            && self.modified_s == meta.modified_s
            && self.modified_ns == meta.modified_ns as i64
            && self.modified_by.as_deref() == Some(&meta.modified_by[..])
            && self.flags == meta.flags as i64
            && self.version == meta.version
    }

    fn matches_file(&self, file: &FileRecord) -> bool {
        self.matches_dir(&file.meta)
            && self.size == file.size
            && self.block_size == file.block_size as i64
            && self.symlink_target == file.symlink_target
    }
}

/// Sync level of the parent directory, falling back to the folder root.
fn parent_sync(conn: &Connection, folder_id: i64, name: &str) -> Result<SyncLevel> {
    let parent = match name.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &name[..i],
    };
    for candidate in [parent, "/"] {
        let sync: Option<i64> = conn
            .query_row(
                "SELECT sync FROM directory WHERE folder_id = ?1 AND name = ?2",
                params![folder_id, candidate],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(v) = sync {
            return Ok(SyncLevel::from_db(v));
        }
    }
    Ok(SyncLevel::Full)
}

fn load_directory(
    conn: &Connection,
    folder_id: i64,
    name: &str,
) -> Result<Option<ExistingEntry>> {
    let row = conn
        .query_row(
            "SELECT id, permissions, modified_s, modified_ns, modified_by, flags, version, sync
             FROM directory WHERE folder_id = ?1 AND name = ?2",
            params![folder_id, name],
            |row| {
                Ok(ExistingEntry {
                    id: row.get(0)?,
                    size: 0,
                    permissions: row.get(1)?,
                    modified_s: row.get(2)?,
                    modified_ns: row.get(3)?,
                    modified_by: row.get(4)?,
                    flags: row.get(5)?,
                    block_size: 0,
                    version: row.get(6)?,
                    symlink_target: String::new(),
                    sync: SyncLevel::from_db(row.get(7)?),
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Apply one directory entry. Returns the row id and effective sync level,
/// or `None` when the entry (and therefore its children) must be skipped.
fn apply_directory(
    conn: &Connection,
    folder_id: i64,
    dir: &DirectoryRecord,
    parent_sync: SyncLevel,
    seq: &mut i64,
    updated: &mut bool,
) -> Result<Option<(i64, SyncLevel)>> {
    let existing = load_directory(conn, folder_id, &dir.name)?;

    if dir.placeholder {
        // A placeholder only reserves the name for its files.
        if let Some(row) = existing {
            return Ok(Some((row.id, row.sync)));
        }
        *seq += 1;
        let id = insert_directory(conn, folder_id, &dir.name, &EntryMeta::default(), *seq, parent_sync)?;
        *updated |= parent_sync == SyncLevel::Full;
        return Ok(Some((id, parent_sync)));
    }

    match existing {
        None if dir.meta.flags & FLAG_DELETED != 0 => Ok(None),
        None => {
            *seq += 1;
            let id = insert_directory(conn, folder_id, &dir.name, &dir.meta, *seq, parent_sync)?;
            *updated |= parent_sync == SyncLevel::Full;
            Ok(Some((id, parent_sync)))
        }
        Some(row) => {
            if !row.matches_dir(&dir.meta) {
                *seq += 1;
                conn.execute(
                    "UPDATE directory SET permissions = ?2, modified_s = ?3, modified_ns = ?4,
                     modified_by = ?5, flags = ?6, version = ?7, sequence = ?8 WHERE id = ?1",
                    params![
                        row.id,
                        dir.meta.permissions,
                        dir.meta.modified_s,
                        dir.meta.modified_ns,
                        dir.meta.modified_by.as_slice(),
                        dir.meta.flags,
                        dir.meta.version,
                        *seq,
                    ],
                )?;
                *updated |= row.sync == SyncLevel::Full;
            }
            Ok(Some((row.id, row.sync)))
        }
    }
}

fn insert_directory(
    conn: &Connection,
    folder_id: i64,
    name: &str,
    meta: &EntryMeta,
    seq: i64,
    sync: SyncLevel,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO directory
         (folder_id, name, permissions, modified_s, modified_ns, modified_by, flags, sequence, version, sync)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            folder_id,
            name,
            meta.permissions,
            meta.modified_s,
            meta.modified_ns,
            meta.modified_by.as_slice(),
            meta.flags,
            seq,
            meta.version,
            sync as u8,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn load_file(conn: &Connection, directory_id: i64, name: &str) -> Result<Option<ExistingEntry>> {
    let row = conn
        .query_row(
            "SELECT id, size, permissions, modified_s, modified_ns, modified_by, flags,
                    block_size, version, symlink_target, sync
             FROM file WHERE directory_id = ?1 AND name = ?2",
            params![directory_id, name],
            |row| {
                Ok(ExistingEntry {
                    id: row.get(0)?,
                    size: row.get(1)?,
                    permissions: row.get(2)?,
                    modified_s: row.get(3)?,
                    modified_ns: row.get(4)?,
                    modified_by: row.get(5)?,
                    flags: row.get(6)?,
                    block_size: row.get(7)?,
                    version: row.get(8)?,
                    symlink_target: row.get(9)?,
                    sync: SyncLevel::from_db(row.get(10)?),
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Apply one file entry. Returns the row id when blocks should be
/// reconciled, `None` when the entry was skipped.
fn apply_file(
    conn: &Connection,
    directory_id: i64,
    dir_sync: SyncLevel,
    file: &FileRecord,
    seq: &mut i64,
    updated: &mut bool,
) -> Result<Option<i64>> {
    let existing = load_file(conn, directory_id, &file.name)?;

    match existing {
        None if file.meta.flags & FLAG_DELETED != 0 => Ok(None),
        None => {
            *seq += 1;
            conn.execute(
                "INSERT INTO file
                 (directory_id, name, size, permissions, modified_s, modified_ns, modified_by,
                  flags, sequence, block_size, version, symlink_target, sync)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    directory_id,
                    file.name,
                    file.size,
                    file.meta.permissions,
                    file.meta.modified_s,
                    file.meta.modified_ns,
                    file.meta.modified_by.as_slice(),
                    file.meta.flags,
                    *seq,
                    file.block_size,
                    file.meta.version,
                    file.symlink_target,
                    dir_sync as u8,
                ],
            )?;
            *updated |= dir_sync == SyncLevel::Full;
            Ok(Some(conn.last_insert_rowid()))
        }
        Some(row) => {
            if !row.matches_file(file) {
                *seq += 1;
                conn.execute(
                    "UPDATE file SET size = ?2, permissions = ?3, modified_s = ?4,
                     modified_ns = ?5, modified_by = ?6, flags = ?7, sequence = ?8,
                     block_size = ?9, version = ?10, symlink_target = ?11 WHERE id = ?1",
                    params![
                        row.id,
                        file.size,
                        file.meta.permissions,
                        file.meta.modified_s,
                        file.meta.modified_ns,
                        file.meta.modified_by.as_slice(),
                        file.meta.flags,
                        *seq,
                        file.block_size,
                        file.meta.version,
                        file.symlink_target,
                    ],
                )?;
                *updated |= row.sync == SyncLevel::Full;
            }
            Ok(Some(row.id))
        }
    }
}

/// Reconcile the stored block list with the authoritative one, pairwise in
/// offset order. A changed block that was cached is downgraded to stale; a
/// removed block that was cached keeps a size-0 stale row for cleanup.
fn reconcile_blocks(conn: &Connection, file_id: i64, new_blocks: &[BlockRecord]) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT id, offset, size, hash, cached FROM block WHERE file_id = ?1 ORDER BY offset",
    )?;
    let existing: Vec<(i64, i64, i64, Vec<u8>, i64)> = stmt
        .query_map(params![file_id], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
            ))
        })?
        .collect::<std::result::Result<_, _>>()?;

    let pairs = existing.len().max(new_blocks.len());
    for i in 0..pairs {
        match (existing.get(i), new_blocks.get(i)) {
            (Some((id, offset, size, hash, cached)), Some(new)) => {
                let unchanged =
                    *offset == new.offset && *size == new.size as i64 && hash == &new.hash;
                if !unchanged {
                    let cached = match CacheState::from_db(*cached) {
                        CacheState::Present => CacheState::Stale,
                        other => other,
                    };
                    conn.execute(
                        "UPDATE block SET offset = ?2, size = ?3, hash = ?4, cached = ?5
                         WHERE id = ?1",
                        params![id, new.offset, new.size, new.hash, cached as u8],
                    )?;
                }
            }
            (None, Some(new)) => {
                conn.execute(
                    "INSERT INTO block (file_id, offset, size, hash, cached)
                     VALUES (?1, ?2, ?3, ?4, 0)",
                    params![file_id, new.offset, new.size, new.hash],
                )?;
            }
            (Some((id, _, _, _, cached)), None) => {
                if CacheState::from_db(*cached) == CacheState::Absent {
                    conn.execute("DELETE FROM block WHERE id = ?1", params![id])?;
                } else {
                    conn.execute(
                        "UPDATE block SET size = 0, cached = ?2 WHERE id = ?1",
                        params![id, CacheState::Stale as u8],
                    )?;
                }
            }
            (None, None) => {}
        }
    }
    Ok(())
}
