use serde::{Deserialize, Serialize};

/// What a catalog entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// Per-entry sync policy, inherited from the parent directory on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SyncLevel {
    None = 0,
    Download = 1,
    Full = 2,
}

impl SyncLevel {
    pub fn from_db(v: i64) -> Self {
        match v {
            0 => SyncLevel::None,
            1 => SyncLevel::Download,
            _ => SyncLevel::Full,
        }
    }
}

/// Scheduling priority for block requests. Higher runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Priority {
    Background = 0,
    User = 1,
}

/// Entry flag bits, packed into one integer column.
pub const FLAG_DELETED: u32 = 1 << 0;
pub const FLAG_INVALID: u32 = 1 << 1;
pub const FLAG_NO_PERMISSIONS: u32 = 1 << 2;

/// One entry as returned by `list` and `attributes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub kind: EntryKind,
    /// Base name, without any path.
    pub name: String,
    pub size: u64,
    pub permissions: u32,
    /// Modification time, seconds precision.
    pub modified: i64,
    /// Short id of the device that last modified the entry.
    pub modified_by: Option<[u8; 8]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_user_first() {
        assert!(Priority::User > Priority::Background);
    }

    #[test]
    fn sync_level_from_db_saturates() {
        assert_eq!(SyncLevel::from_db(0), SyncLevel::None);
        assert_eq!(SyncLevel::from_db(1), SyncLevel::Download);
        assert_eq!(SyncLevel::from_db(2), SyncLevel::Full);
        assert_eq!(SyncLevel::from_db(99), SyncLevel::Full);
    }
}
