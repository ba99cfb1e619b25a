//! Reshaping of wire index records into per-directory form.
//!
//! The wire carries a flat list of file entries with relative names. The
//! catalog wants directories with their immediate children, absolute names
//! starting with `/`. Files may arrive before their parent directory's own
//! entry; a placeholder directory is created for them and replaced if the
//! real entry shows up later in the same message.

use farview_shared::types::{EntryKind, FLAG_DELETED, FLAG_INVALID, FLAG_NO_PERMISSIONS};
use std::collections::HashMap;

use crate::bep::{self, FileInfoType, Vector};

/// Metadata shared by directory and file entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryMeta {
    pub permissions: u32,
    pub modified_s: i64,
    pub modified_ns: i32,
    /// Big-endian bytes of the wire `modified_by` id.
    pub modified_by: [u8; 8],
    pub flags: u32,
    /// Sequence assigned by the sending device, kept for resync bookkeeping.
    pub wire_sequence: i64,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockRecord {
    pub offset: i64,
    pub size: i32,
    pub hash: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    /// Base name within the directory.
    pub name: String,
    pub kind: EntryKind,
    pub size: i64,
    pub block_size: i32,
    pub symlink_target: String,
    pub meta: EntryMeta,
    /// Ordered by offset.
    pub blocks: Vec<BlockRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryRecord {
    /// Absolute name, starting with `/`.
    pub name: String,
    pub meta: EntryMeta,
    /// True until the directory's own wire entry is seen.
    pub placeholder: bool,
    pub files: Vec<FileRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexMessage {
    pub folder: String,
    pub directories: Vec<DirectoryRecord>,
}

/// Reshape a decoded wire index into per-directory records.
pub fn reshape(index: bep::Index) -> IndexMessage {
    let mut directories: Vec<DirectoryRecord> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for file in index.files {
        if file.name.is_empty() {
            tracing::warn!(folder = %index.folder, "skipping index entry with empty name");
            continue;
        }
        let name = format!("/{}", file.name);
        let meta = meta_of(&file);
        match FileInfoType::try_from(file.r#type) {
            Ok(FileInfoType::Directory) => {
                let idx = dir_index(&mut directories, &mut by_name, &name);
                let dir = &mut directories[idx];
                dir.meta = meta;
                dir.placeholder = false;
            }
            Ok(FileInfoType::File) => {
                attach_file(&mut directories, &mut by_name, &name, file, meta, EntryKind::File);
            }
            Ok(
                FileInfoType::Symlink
                | FileInfoType::SymlinkFile
                | FileInfoType::SymlinkDirectory,
            ) => {
                attach_file(
                    &mut directories,
                    &mut by_name,
                    &name,
                    file,
                    meta,
                    EntryKind::Symlink,
                );
            }
            Err(_) => {
                tracing::warn!(
                    folder = %index.folder,
                    entry_type = file.r#type,
                    "skipping index entry of unknown type"
                );
            }
        }
    }

    IndexMessage {
        folder: index.folder,
        directories,
    }
}

fn attach_file(
    directories: &mut Vec<DirectoryRecord>,
    by_name: &mut HashMap<String, usize>,
    name: &str,
    file: bep::FileInfo,
    meta: EntryMeta,
    kind: EntryKind,
) {
    let (parent, base) = split_name(name);
    let idx = dir_index(directories, by_name, parent);
    let mut blocks: Vec<BlockRecord> = file
        .blocks
        .into_iter()
        .map(|b| BlockRecord {
            offset: b.offset,
            size: b.size,
            hash: b.hash,
        })
        .collect();
    blocks.sort_by_key(|b| b.offset);
    directories[idx].files.push(FileRecord {
        name: base.to_string(),
        kind,
        size: file.size,
        block_size: file.block_size,
        symlink_target: file.symlink_target,
        meta,
        blocks,
    });
}

fn dir_index(
    directories: &mut Vec<DirectoryRecord>,
    by_name: &mut HashMap<String, usize>,
    name: &str,
) -> usize {
    if let Some(&idx) = by_name.get(name) {
        return idx;
    }
    directories.push(DirectoryRecord {
        name: name.to_string(),
        meta: EntryMeta::default(),
        placeholder: true,
        files: Vec::new(),
    });
    let idx = directories.len() - 1;
    by_name.insert(name.to_string(), idx);
    idx
}

/// Split an absolute name into (parent directory, base name).
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('/') {
        Some(0) => ("/", &name[1..]),
        Some(i) => (&name[..i], &name[i + 1..]),
        None => ("/", name),
    }
}

fn meta_of(file: &bep::FileInfo) -> EntryMeta {
    let mut flags = 0u32;
    if file.deleted {
        flags |= FLAG_DELETED;
    }
    if file.invalid {
        flags |= FLAG_INVALID;
    }
    if file.no_permissions {
        flags |= FLAG_NO_PERMISSIONS;
    }
    EntryMeta {
        permissions: file.permissions,
        modified_s: file.modified_s,
        modified_ns: file.modified_ns,
        modified_by: bep::id_bytes(file.modified_by),
        flags,
        wire_sequence: file.sequence,
        version: version_string(file.version.as_ref()),
    }
}

/// Compact text form of a version vector, stable for equality comparison.
pub fn version_string(version: Option<&Vector>) -> String {
    match version {
        None => String::new(),
        Some(v) => v
            .counters
            .iter()
            .map(|c| format!("{}:{}", c.id, c.value))
            .collect::<Vec<_>>()
            .join(","),
    }
}
