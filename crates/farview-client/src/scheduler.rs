//! Block request scheduling.
//!
//! A bounded number of requests is in flight at once; the rest queue by
//! priority (user over background, insertion order within a level). Each
//! in-flight request carries its own timeout with bounded retries. Response
//! payloads are verified against the block hash before waiters resolve; a
//! mismatch is treated as no response at all so the timeout path retries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use farview_shared::constants::{
    MAX_REQUEST_ID, REQUEST_CONCURRENCY, REQUEST_RETRIES, REQUEST_TIMEOUT,
};
use farview_shared::Priority;
use farview_store::PlannedBlock;

/// Why a block fetch did not produce bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("block request timed out")]
    Timeout,

    #[error("block request removed")]
    Removed,

    #[error("peer answered with error code {0}")]
    Peer(i32),

    #[error("connection closed")]
    Closed,
}

/// One block to fetch from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockFetch {
    pub block_id: i64,
    pub file_id: i64,
    pub folder: String,
    /// Path relative to the folder root, no leading slash.
    pub name: String,
    pub offset: i64,
    pub size: i64,
    pub hash: Vec<u8>,
}

impl From<&PlannedBlock> for BlockFetch {
    fn from(block: &PlannedBlock) -> Self {
        BlockFetch {
            block_id: block.block_id,
            file_id: block.file_id,
            folder: block.folder.clone(),
            name: block.file_name.clone(),
            offset: block.offset,
            size: block.size,
            hash: block.hash.clone(),
        }
    }
}

/// What the transport layer must send for one scheduled request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub id: u64,
    pub folder: String,
    pub name: String,
    pub offset: i64,
    pub size: i64,
    pub hash: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub concurrent: usize,
    pub timeout: Duration,
    pub retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            concurrent: REQUEST_CONCURRENCY,
            timeout: REQUEST_TIMEOUT,
            retries: REQUEST_RETRIES,
        }
    }
}

type FetchResult = std::result::Result<Vec<u8>, FetchError>;

struct Pending {
    fetch: BlockFetch,
    priority: Priority,
    retries_left: u32,
    /// `Some(id)` while in flight.
    active_id: Option<u64>,
    timeout_task: Option<JoinHandle<()>>,
    waiters: Vec<oneshot::Sender<FetchResult>>,
    enqueued_at: u64,
}

struct Inner {
    queue: HashMap<(i64, i64), Pending>,
    active: usize,
    last_id: u64,
    insert_counter: u64,
}

struct Shared {
    config: SchedulerConfig,
    outbound: mpsc::UnboundedSender<OutboundRequest>,
    inner: Mutex<Inner>,
}

/// Cloneable handle to one connection's request queue.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    pub fn new(outbound: mpsc::UnboundedSender<OutboundRequest>, config: SchedulerConfig) -> Self {
        Scheduler {
            shared: Arc::new(Shared {
                config,
                outbound,
                inner: Mutex::new(Inner {
                    queue: HashMap::new(),
                    active: 0,
                    last_id: 0,
                    insert_counter: 0,
                }),
            }),
        }
    }

    /// Queue a fetch without waiting for it. A fetch already queued for the
    /// same `(file_id, offset)` has its priority raised instead.
    pub fn add(&self, fetch: BlockFetch, priority: Priority) {
        self.enqueue(fetch, priority, None);
        self.process();
    }

    /// Queue a fetch and await its verified bytes.
    pub async fn wait(&self, fetch: BlockFetch, priority: Priority) -> FetchResult {
        let (tx, rx) = oneshot::channel();
        self.enqueue(fetch, priority, Some(tx));
        self.process();
        rx.await.unwrap_or(Err(FetchError::Closed))
    }

    fn enqueue(
        &self,
        fetch: BlockFetch,
        priority: Priority,
        waiter: Option<oneshot::Sender<FetchResult>>,
    ) {
        let mut inner = self.lock();
        let key = (fetch.file_id, fetch.offset);
        match inner.queue.get_mut(&key) {
            Some(pending) => {
                pending.priority = pending.priority.max(priority);
                if let Some(tx) = waiter {
                    pending.waiters.push(tx);
                }
            }
            None => {
                inner.insert_counter += 1;
                let enqueued_at = inner.insert_counter;
                inner.queue.insert(
                    key,
                    Pending {
                        fetch,
                        priority,
                        retries_left: self.shared.config.retries,
                        active_id: None,
                        timeout_task: None,
                        waiters: waiter.into_iter().collect(),
                        enqueued_at,
                    },
                );
            }
        }
    }

    /// Fill free slots with the best queued requests.
    fn process(&self) {
        let mut inner = self.lock();
        while inner.active < self.shared.config.concurrent {
            let Some(key) = inner
                .queue
                .iter()
                .filter(|(_, p)| p.active_id.is_none())
                .max_by_key(|(_, p)| (p.priority, std::cmp::Reverse(p.enqueued_at)))
                .map(|(k, _)| *k)
            else {
                break;
            };

            inner.last_id = if inner.last_id >= MAX_REQUEST_ID {
                1
            } else {
                inner.last_id + 1
            };
            let id = inner.last_id;

            let timeout_task = tokio::spawn({
                let scheduler = self.clone();
                let timeout = self.shared.config.timeout;
                async move {
                    tokio::time::sleep(timeout).await;
                    scheduler.on_timeout(id);
                }
            });

            inner.active += 1;
            let pending = inner
                .queue
                .get_mut(&key)
                .expect("selected key exists under the same lock");
            pending.active_id = Some(id);
            pending.timeout_task = Some(timeout_task);

            let request = OutboundRequest {
                id,
                folder: pending.fetch.folder.clone(),
                name: pending.fetch.name.clone(),
                offset: pending.fetch.offset,
                size: pending.fetch.size,
                hash: pending.fetch.hash.clone(),
            };
            tracing::debug!(
                id,
                folder = %request.folder,
                name = %request.name,
                offset = request.offset,
                "requesting block"
            );
            if self.shared.outbound.send(request).is_err() {
                drop(inner);
                self.shutdown();
                return;
            }
        }
    }

    fn on_timeout(&self, id: u64) {
        let mut inner = self.lock();
        let Some(key) = find_by_id(&inner, id) else {
            return;
        };
        let pending = inner
            .queue
            .get_mut(&key)
            .expect("key located under the same lock");
        if pending.retries_left > 0 {
            pending.retries_left -= 1;
            pending.active_id = None;
            pending.timeout_task = None;
            inner.active -= 1;
            tracing::warn!(id, "block request timed out, retrying");
            drop(inner);
        } else {
            let pending = inner
                .queue
                .remove(&key)
                .expect("key located under the same lock");
            inner.active -= 1;
            tracing::warn!(id, "block request timed out, giving up");
            drop(inner);
            resolve(pending, Err(FetchError::Timeout));
        }
        self.process();
    }

    /// Deliver response bytes for request `id`. On hash match the fetch is
    /// returned so the caller can write through to the cache; a mismatch is
    /// logged and left for the timeout path to retry.
    pub fn received(&self, id: u64, data: &[u8]) -> Option<BlockFetch> {
        let mut inner = self.lock();
        let Some(key) = find_by_id(&inner, id) else {
            tracing::debug!(id, "response for unknown request id");
            return None;
        };
        let digest = Sha256::digest(data);
        let hash_matches = {
            let pending = inner
                .queue
                .get(&key)
                .expect("key located under the same lock");
            digest.as_slice() == pending.fetch.hash
        };
        if !hash_matches {
            tracing::warn!(id, "response failed hash verification, dropping");
            return None;
        }
        let mut pending = inner
            .queue
            .remove(&key)
            .expect("key located under the same lock");
        abort_timer(&mut pending);
        inner.active -= 1;
        drop(inner);

        let fetch = pending.fetch.clone();
        resolve(pending, Ok(data.to_vec()));
        self.process();
        Some(fetch)
    }

    /// Fail the in-flight request `id`, e.g. on a non-zero response code.
    pub fn fail(&self, id: u64, error: FetchError) {
        let mut inner = self.lock();
        let Some(key) = find_by_id(&inner, id) else {
            return;
        };
        let mut pending = inner
            .queue
            .remove(&key)
            .expect("key located under the same lock");
        abort_timer(&mut pending);
        inner.active -= 1;
        drop(inner);

        resolve(pending, Err(error));
        self.process();
    }

    /// Drop every pending request for one file, failing waiters with
    /// [`FetchError::Removed`].
    pub fn remove(&self, folder: &str, name: &str) {
        let mut inner = self.lock();
        let keys: Vec<(i64, i64)> = inner
            .queue
            .iter()
            .filter(|(_, p)| p.fetch.folder == folder && p.fetch.name == name)
            .map(|(k, _)| *k)
            .collect();
        let mut dropped = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(mut pending) = inner.queue.remove(&key) {
                abort_timer(&mut pending);
                if pending.active_id.is_some() {
                    inner.active -= 1;
                }
                dropped.push(pending);
            }
        }
        drop(inner);

        for pending in dropped {
            resolve(pending, Err(FetchError::Removed));
        }
        self.process();
    }

    /// Fail everything; used when the connection dies.
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        let keys: Vec<(i64, i64)> = inner.queue.keys().copied().collect();
        let mut dropped = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(mut pending) = inner.queue.remove(&key) {
                abort_timer(&mut pending);
                dropped.push(pending);
            }
        }
        inner.active = 0;
        drop(inner);

        for pending in dropped {
            resolve(pending, Err(FetchError::Closed));
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }

    #[cfg(test)]
    fn priority_of(&self, file_id: i64, offset: i64) -> Option<Priority> {
        self.lock().queue.get(&(file_id, offset)).map(|p| p.priority)
    }
}

fn find_by_id(inner: &Inner, id: u64) -> Option<(i64, i64)> {
    inner
        .queue
        .iter()
        .find(|(_, p)| p.active_id == Some(id))
        .map(|(k, _)| *k)
}

fn abort_timer(pending: &mut Pending) {
    if let Some(task) = pending.timeout_task.take() {
        task.abort();
    }
}

fn resolve(pending: Pending, result: FetchResult) {
    for waiter in pending.waiters {
        let _ = waiter.send(result.clone());
    }
}
