use farview_shared::types::SyncLevel;

/// Block cache state as stored in the `cached` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CacheState {
    Absent = 0,
    Present = 1,
    /// Still on disk but the authoritative block changed; cleanup removes it.
    Stale = 2,
}

impl CacheState {
    pub fn from_db(v: i64) -> Self {
        match v {
            1 => CacheState::Present,
            2 => CacheState::Stale,
            _ => CacheState::Absent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRow {
    pub id: i64,
    pub id_string: String,
    pub label: String,
    /// Client-local mount label; this client sets it to `id_string`.
    pub path: String,
    pub flags: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRow {
    pub id: i64,
    pub device_id: Vec<u8>,
    pub folder_id: i64,
    pub name: String,
    /// Comma-joined wire addresses.
    pub addresses: String,
    /// Highest sequence advertised by the peer for this device's index.
    pub max_sequence: i64,
    /// Local ingest counter; row sequences are drawn from it.
    pub max_sequence_internal: i64,
    /// Eight big-endian bytes.
    pub index_id: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRow {
    pub id: i64,
    pub folder_id: i64,
    /// Absolute, starting with `/`.
    pub name: String,
    pub permissions: u32,
    pub modified_s: i64,
    pub modified_ns: i64,
    pub modified_by: Option<Vec<u8>>,
    pub flags: u32,
    pub sequence: i64,
    pub version: String,
    pub sync: SyncLevel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRow {
    pub id: i64,
    pub directory_id: i64,
    /// Base name within the directory.
    pub name: String,
    pub size: i64,
    pub permissions: u32,
    pub modified_s: i64,
    pub modified_ns: i64,
    pub modified_by: Option<Vec<u8>>,
    pub flags: u32,
    pub sequence: i64,
    pub block_size: i64,
    pub version: String,
    /// Non-empty means the entry is a symlink.
    pub symlink_target: String,
    pub sync: SyncLevel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRow {
    pub id: i64,
    pub file_id: i64,
    pub offset: i64,
    pub size: i64,
    pub hash: Vec<u8>,
    pub cached: CacheState,
}

/// One block of a planned read, as produced by `blocks_for_read`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedBlock {
    pub block_id: i64,
    pub file_id: i64,
    /// Folder id string, as used in block requests.
    pub folder: String,
    /// Path of the file relative to the folder root, no leading slash.
    pub file_name: String,
    pub offset: i64,
    pub size: i64,
    pub hash: Vec<u8>,
    pub cached: CacheState,
}

/// A block awaiting cache cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleBlock {
    pub block_id: i64,
    pub file_id: i64,
    pub folder: String,
    pub offset: i64,
    /// Zero for tail rows kept only so their cache file gets removed.
    pub size: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_state_from_db() {
        assert_eq!(CacheState::from_db(0), CacheState::Absent);
        assert_eq!(CacheState::from_db(1), CacheState::Present);
        assert_eq!(CacheState::from_db(2), CacheState::Stale);
        assert_eq!(CacheState::from_db(-5), CacheState::Absent);
    }
}
