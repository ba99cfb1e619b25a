//! Content-addressed block cache: one file per block.
//!
//! Layout: `<root>/<folder>/<file_id>/<offset>`. Reads verify the SHA-256
//! of the content against the catalog hash; a mismatch reads as a miss so
//! the caller can mark the block stale and re-request it.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// On-disk block cache rooted at one directory.
pub struct BlockCache {
    root: PathBuf,
}

impl BlockCache {
    pub fn new(root: &Path) -> Self {
        BlockCache {
            root: root.to_path_buf(),
        }
    }

    fn block_path(&self, folder: &str, file_id: i64, offset: i64) -> PathBuf {
        self.root
            .join(folder)
            .join(file_id.to_string())
            .join(offset.to_string())
    }

    /// Write one verified block, creating missing directories.
    pub async fn write_block(
        &self,
        folder: &str,
        file_id: i64,
        offset: i64,
        data: &[u8],
    ) -> std::io::Result<()> {
        let path = self.block_path(folder, file_id, offset);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await
    }

    /// Read a block back, verifying size and hash. Any miss, short file or
    /// hash mismatch returns `None`.
    pub async fn read_block(
        &self,
        folder: &str,
        file_id: i64,
        offset: i64,
        expected_size: i64,
        expected_hash: &[u8],
    ) -> Option<Vec<u8>> {
        let path = self.block_path(folder, file_id, offset);
        let mut data = tokio::fs::read(&path).await.ok()?;
        if data.is_empty() {
            return None;
        }
        data.truncate(expected_size.max(0) as usize);
        let digest = Sha256::digest(&data);
        if digest.as_slice() != expected_hash {
            tracing::warn!(path = %path.display(), "cached block failed verification");
            return None;
        }
        Some(data)
    }

    /// Remove a block file; missing files are fine.
    pub async fn remove_block(
        &self,
        folder: &str,
        file_id: i64,
        offset: i64,
    ) -> std::io::Result<()> {
        match tokio::fs::remove_file(self.block_path(folder, file_id, offset)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
