//! Read planning and directory listings.

use rusqlite::{params, Connection, OptionalExtension};

use farview_shared::types::{EntryKind, ListEntry, FLAG_DELETED};

use crate::database::Store;
use crate::error::{Result, StoreError};
use crate::models::{CacheState, PlannedBlock, StaleBlock};

impl Store {
    /// Resolve a `(path, position, length)` read to the ordered blocks whose
    /// ranges overlap it.
    pub fn blocks_for_read(
        &self,
        path: &str,
        position: u64,
        length: u64,
    ) -> Result<Vec<PlannedBlock>> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let (folder, dir_name, file_name) = split_file_path(path)?;
        let conn = self.reader()?;

        let Some((file_id, relative)) =
            resolve_file(&conn, &folder, &dir_name, &file_name)?
        else {
            return Ok(Vec::new());
        };

        let end = position.saturating_add(length);
        let mut stmt = conn.prepare(
            "SELECT id, offset, size, hash, cached FROM block
             WHERE file_id = ?1 AND offset < ?2 AND offset + size > ?3
             ORDER BY offset",
        )?;
        let blocks = stmt
            .query_map(params![file_id, end as i64, position as i64], |row| {
                Ok(PlannedBlock {
                    block_id: row.get(0)?,
                    file_id,
                    folder: folder.clone(),
                    file_name: relative.clone(),
                    offset: row.get(1)?,
                    size: row.get(2)?,
                    hash: row.get(3)?,
                    cached: CacheState::from_db(row.get(4)?),
                })
            })?
            .collect::<std::result::Result<_, _>>()?;
        Ok(blocks)
    }

    /// Record the cache state of a block after cache I/O.
    pub fn update_block_cache_state(&self, block_id: i64, state: CacheState) -> Result<()> {
        self.writer().execute(
            "UPDATE block SET cached = ?2 WHERE id = ?1",
            params![block_id, state as u8],
        )?;
        Ok(())
    }

    /// All blocks currently marked stale, for cache cleanup.
    pub fn stale_blocks(&self) -> Result<Vec<StaleBlock>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT b.id, b.file_id, f.id_string, b.offset, b.size
             FROM block b
             JOIN file fi ON fi.id = b.file_id
             JOIN directory d ON d.id = fi.directory_id
             JOIN folder f ON f.id = d.folder_id
             WHERE b.cached = 2",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StaleBlock {
                    block_id: row.get(0)?,
                    file_id: row.get(1)?,
                    folder: row.get(2)?,
                    offset: row.get(3)?,
                    size: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<_, _>>()?;
        Ok(rows)
    }

    /// Finish cleanup of one stale block: size-0 tails disappear entirely,
    /// live rows fall back to absent.
    pub fn reset_stale_block(&self, block_id: i64) -> Result<()> {
        let conn = self.writer();
        let changed = conn.execute(
            "DELETE FROM block WHERE id = ?1 AND size = 0 AND cached = 2",
            params![block_id],
        )?;
        if changed == 0 {
            conn.execute(
                "UPDATE block SET cached = 0 WHERE id = ?1 AND cached = 2",
                params![block_id],
            )?;
        }
        Ok(())
    }

    /// List a directory. `/` lists one synthetic directory per folder;
    /// deleted entries are omitted. An unknown path yields an empty list.
    pub fn list(&self, path: &str) -> Result<Vec<ListEntry>> {
        let conn = self.reader()?;
        let components = split_abs_path(path)?;

        if components.is_empty() {
            let mut stmt = conn.prepare("SELECT path FROM folder ORDER BY path")?;
            let folders = stmt
                .query_map([], |row| {
                    Ok(ListEntry {
                        kind: EntryKind::Directory,
                        name: row.get(0)?,
                        size: 0,
                        permissions: 0,
                        modified: 0,
                        modified_by: None,
                    })
                })?
                .collect::<std::result::Result<_, _>>()?;
            return Ok(folders);
        }

        let Some(folder_id) = folder_by_id_string(&conn, components[0])? else {
            return Ok(Vec::new());
        };
        let dir_name = join_dir_name(&components[1..]);
        let Some(dir_row_id) = directory_id(&conn, folder_id, &dir_name)? else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();

        // Immediate subdirectories; names are absolute, so filter on the parent.
        let mut stmt = conn.prepare(
            "SELECT name, permissions, modified_s, modified_by, flags
             FROM directory WHERE folder_id = ?1 AND name != '/'",
        )?;
        let dirs = stmt.query_map(params![folder_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<Vec<u8>>>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;
        for dir in dirs {
            let (name, permissions, modified_s, modified_by, flags) = dir?;
            if parent_of(&name) != dir_name || flags as u32 & FLAG_DELETED != 0 {
                continue;
            }
            entries.push(ListEntry {
                kind: EntryKind::Directory,
                name: base_of(&name).to_string(),
                size: 0,
                permissions: permissions as u32,
                modified: modified_s,
                modified_by: modified_by_bytes(modified_by),
            });
        }

        let mut stmt = conn.prepare(
            "SELECT name, size, permissions, modified_s, modified_by, flags, symlink_target
             FROM file WHERE directory_id = ?1",
        )?;
        let files = stmt.query_map(params![dir_row_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Option<Vec<u8>>>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;
        for file in files {
            let (name, size, permissions, modified_s, modified_by, flags, symlink_target) = file?;
            if flags as u32 & FLAG_DELETED != 0 {
                continue;
            }
            entries.push(ListEntry {
                kind: if symlink_target.is_empty() {
                    EntryKind::File
                } else {
                    EntryKind::Symlink
                },
                name,
                size: size.max(0) as u64,
                permissions: permissions as u32,
                modified: modified_s,
                modified_by: modified_by_bytes(modified_by),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Attributes of one entry, or `None` when absent or deleted.
    pub fn attributes(&self, path: &str) -> Result<Option<ListEntry>> {
        let conn = self.reader()?;
        let components = split_abs_path(path)?;
        if components.is_empty() {
            return Ok(None);
        }

        let Some(folder_id) = folder_by_id_string(&conn, components[0])? else {
            return Ok(None);
        };

        let dir_name = join_dir_name(&components[1..]);
        let display_name = components.last().map(|s| s.to_string()).unwrap_or_default();

        // Directory first, then file.
        let dir_row: Option<(i64, i64, Option<Vec<u8>>, i64)> = conn
            .query_row(
                "SELECT permissions, modified_s, modified_by, flags
                 FROM directory WHERE folder_id = ?1 AND name = ?2",
                params![folder_id, dir_name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        if let Some((permissions, modified_s, modified_by, flags)) = dir_row {
            if flags as u32 & FLAG_DELETED != 0 {
                return Ok(None);
            }
            return Ok(Some(ListEntry {
                kind: EntryKind::Directory,
                name: display_name,
                size: 0,
                permissions: permissions as u32,
                modified: modified_s,
                modified_by: modified_by_bytes(modified_by),
            }));
        }

        if components.len() < 2 {
            return Ok(None);
        }
        let parent = join_dir_name(&components[1..components.len() - 1]);
        let base = components[components.len() - 1];
        let Some(parent_id) = directory_id(&conn, folder_id, &parent)? else {
            return Ok(None);
        };
        let file_row: Option<(i64, i64, i64, Option<Vec<u8>>, i64, String)> = conn
            .query_row(
                "SELECT size, permissions, modified_s, modified_by, flags, symlink_target
                 FROM file WHERE directory_id = ?1 AND name = ?2",
                params![parent_id, base],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;
        let Some((size, permissions, modified_s, modified_by, flags, symlink_target)) = file_row
        else {
            return Ok(None);
        };
        if flags as u32 & FLAG_DELETED != 0 {
            return Ok(None);
        }
        Ok(Some(ListEntry {
            kind: if symlink_target.is_empty() {
                EntryKind::File
            } else {
                EntryKind::Symlink
            },
            name: base.to_string(),
            size: size.max(0) as u64,
            permissions: permissions as u32,
            modified: modified_s,
            modified_by: modified_by_bytes(modified_by),
        }))
    }
}

fn modified_by_bytes(raw: Option<Vec<u8>>) -> Option<[u8; 8]> {
    raw.and_then(|v| <[u8; 8]>::try_from(v.as_slice()).ok())
}

/// Split an absolute path into its components. `/` yields an empty list.
fn split_abs_path(path: &str) -> Result<Vec<&str>> {
    if !path.starts_with('/') {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(path.split('/').filter(|c| !c.is_empty()).collect())
}

/// Split `/folder/dir.../name` into (folder, directory name, base name).
fn split_file_path(path: &str) -> Result<(String, String, String)> {
    let components = split_abs_path(path)?;
    if components.len() < 2 {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    let folder = components[0].to_string();
    let dir = join_dir_name(&components[1..components.len() - 1]);
    let base = components[components.len() - 1].to_string();
    Ok((folder, dir, base))
}

fn join_dir_name(components: &[&str]) -> String {
    if components.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", components.join("/"))
    }
}

fn parent_of(name: &str) -> &str {
    match name.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &name[..i],
    }
}

fn base_of(name: &str) -> &str {
    match name.rfind('/') {
        Some(i) => &name[i + 1..],
        None => name,
    }
}

fn folder_by_id_string(conn: &Connection, id_string: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM folder WHERE id_string = ?1",
            params![id_string],
            |row| row.get(0),
        )
        .optional()?)
}

fn directory_id(conn: &Connection, folder_id: i64, name: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM directory WHERE folder_id = ?1 AND name = ?2",
            params![folder_id, name],
            |row| row.get(0),
        )
        .optional()?)
}

/// Resolve a file row, returning its id and folder-relative path.
fn resolve_file(
    conn: &Connection,
    folder: &str,
    dir_name: &str,
    file_name: &str,
) -> Result<Option<(i64, String)>> {
    let Some(folder_id) = folder_by_id_string(conn, folder)? else {
        return Ok(None);
    };
    let Some(dir_id) = directory_id(conn, folder_id, dir_name)? else {
        return Ok(None);
    };
    let file_id: Option<i64> = conn
        .query_row(
            "SELECT id FROM file WHERE directory_id = ?1 AND name = ?2",
            params![dir_id, file_name],
            |row| row.get(0),
        )
        .optional()?;
    let relative = if dir_name == "/" {
        file_name.to_string()
    } else {
        format!("{}/{}", &dir_name[1..], file_name)
    };
    Ok(file_id.map(|id| (id, relative)))
}
