//! The read path: plan blocks, satisfy from cache or peer, assemble.

use futures::future::join_all;

use farview_shared::constants::MAX_READ_LEN;
use farview_shared::Priority;
use farview_store::{CacheState, PlannedBlock, Store};

use crate::cache::BlockCache;
use crate::error::{ClientError, Result};
use crate::scheduler::{BlockFetch, Scheduler};

/// Read up to `length` bytes of `path` starting at `position`.
///
/// Blocks are fetched concurrently but assembled in offset order. A cached
/// block that fails verification is marked stale and re-requested from the
/// peer. The result may be short at end of file.
pub(crate) async fn read_bytes(
    store: &Store,
    cache: &BlockCache,
    scheduler: &Scheduler,
    path: &str,
    position: u64,
    length: u64,
) -> Result<Vec<u8>> {
    if length > MAX_READ_LEN {
        return Err(ClientError::ReadTooLarge {
            requested: length,
            max: MAX_READ_LEN,
        });
    }

    let plan = store.blocks_for_read(path, position, length)?;
    let fetched = join_all(
        plan.iter()
            .map(|block| fetch_block(store, cache, scheduler, block)),
    )
    .await;

    let mut out = Vec::new();
    for (block, data) in plan.iter().zip(fetched) {
        let data = data?;
        let (start, end) = slice_bounds(block.offset, block.size, position, length);
        out.extend_from_slice(&data[start..end]);
    }
    Ok(out)
}

async fn fetch_block(
    store: &Store,
    cache: &BlockCache,
    scheduler: &Scheduler,
    block: &PlannedBlock,
) -> Result<Vec<u8>> {
    if block.cached == CacheState::Present {
        if let Some(data) = cache
            .read_block(
                &block.folder,
                block.file_id,
                block.offset,
                block.size,
                &block.hash,
            )
            .await
        {
            return Ok(data);
        }
        tracing::warn!(
            folder = %block.folder,
            file = %block.file_name,
            offset = block.offset,
            "cached block unusable, re-requesting"
        );
        store.update_block_cache_state(block.block_id, CacheState::Stale)?;
    }
    let data = scheduler
        .wait(BlockFetch::from(block), Priority::User)
        .await?;
    Ok(data)
}

/// The sub-range of one block that a `(position, length)` read covers,
/// as indexes into the block's bytes.
fn slice_bounds(block_offset: i64, block_size: i64, position: u64, length: u64) -> (usize, usize) {
    let start = (position as i64 - block_offset).clamp(0, block_size);
    let end = ((position + length) as i64 - block_offset).clamp(start, block_size);
    (start as usize, end as usize)
}
