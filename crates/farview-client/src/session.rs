//! Session orchestration.
//!
//! One [`Session`] drives one connection. The transport's event stream is
//! consumed by a single driver task that frames bytes, decodes messages and
//! dispatches them: cluster configs and indexes into the store, responses
//! into the scheduler with write-through to the block cache. No application
//! traffic is surfaced before the cluster-config exchange completes.

use std::sync::Arc;

use prost::Message;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use farview_net::{resolve_target, Resolver, TlsIdentity, Transport, TransportEvent};
use farview_proto::bep::{self, BepMessage, MessageType};
use farview_proto::framer::{encode_hello, encode_message, Frame, Framer};
use farview_proto::index;
use farview_shared::constants::{CLIENT_NAME, CLIENT_VERSION, PING_INTERVAL};
use farview_shared::types::ListEntry;
use farview_shared::DeviceId;
use farview_store::{CacheState, Store};

use crate::cache::BlockCache;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::events::Event;
use crate::read;
use crate::scheduler::{FetchError, OutboundRequest, Scheduler, SchedulerConfig};

/// An established, authenticated session with the remote peer.
pub struct Session {
    store: Arc<Store>,
    cache: Arc<BlockCache>,
    scheduler: Scheduler,
    peer: DeviceId,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    events: Option<mpsc::UnboundedReceiver<Event>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Connect to `url` (a `tcp://` or `relay://` target, or the literal
    /// `dynamic` to consult `resolver`), authenticate `peer_id`, and
    /// complete the hello and cluster-config exchanges.
    pub async fn connect(
        config: &ClientConfig,
        url: &str,
        peer_id: &str,
        resolver: Option<&dyn Resolver>,
    ) -> Result<Session> {
        let peer = DeviceId::parse(peer_id)?;
        let identity = TlsIdentity::load(&config.cert_path, &config.key_path)?;
        let store = Arc::new(Store::open(
            &config.db_path,
            identity.local_id(),
            &config.device_name,
        )?);
        let cache = Arc::new(BlockCache::new(&config.cache_dir));

        let target = resolve_target(url, &peer, resolver)?;
        let transport = Transport::connect(&target, &peer, &identity).await?;
        let outbound = transport.sender();

        // Our hello goes out first thing on the secured stream.
        let hello = bep::Hello {
            device_name: config.device_name.clone(),
            client_name: CLIENT_NAME.to_string(),
            client_version: CLIENT_VERSION.to_string(),
        };
        transport.send(encode_hello(&hello))?;

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(request_tx, SchedulerConfig::default());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (connected_tx, connected_rx) = oneshot::channel();

        let mut tasks = Vec::new();
        tasks.push(tokio::spawn(forward_requests(request_rx, outbound.clone())));
        tasks.push(tokio::spawn(keepalive(outbound.clone())));
        tasks.push(tokio::spawn(
            Driver {
                transport,
                framer: Framer::new(),
                store: store.clone(),
                cache: cache.clone(),
                scheduler: scheduler.clone(),
                events: event_tx,
                connected_tx: Some(connected_tx),
                peer,
                exchanged: false,
            }
            .run(),
        ));

        connected_rx
            .await
            .map_err(|_| ClientError::ConnectionClosed)??;

        Ok(Session {
            store,
            cache,
            scheduler,
            peer,
            outbound,
            events: Some(event_rx),
            tasks,
        })
    }

    pub fn peer(&self) -> &DeviceId {
        &self.peer
    }

    /// The session event stream. Can be taken once.
    pub fn events(&mut self) -> Option<mpsc::UnboundedReceiver<Event>> {
        self.events.take()
    }

    /// Attributes of one entry, or `None` when absent or deleted.
    pub fn attributes(&self, path: &str) -> Result<Option<ListEntry>> {
        Ok(self.store.attributes(path)?)
    }

    /// List a directory; `/` lists the known folders.
    pub fn list(&self, path: &str) -> Result<Vec<ListEntry>> {
        Ok(self.store.list(path)?)
    }

    /// Read up to `length` bytes at `position`, verified against the block
    /// hashes. May return fewer bytes at end of file.
    pub async fn read(&self, path: &str, position: u64, length: u64) -> Result<Vec<u8>> {
        read::read_bytes(
            &self.store,
            &self.cache,
            &self.scheduler,
            path,
            position,
            length,
        )
        .await
    }

    /// Cancel outstanding block requests for one file; their waiters fail
    /// with [`FetchError::Removed`].
    pub fn cancel(&self, path: &str) {
        if let Some((folder, name)) = split_user_path(path) {
            self.scheduler.remove(&folder, &name);
        }
    }

    /// Announce departure and tear the session down.
    pub fn close(self) {
        let close = bep::Close {
            reason: "client closing".to_string(),
        };
        let _ = self
            .outbound
            .send(encode_message(MessageType::Close, &close.encode_to_vec()));
        self.scheduler.shutdown();
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// `/folder/a/b.txt` -> `("folder", "a/b.txt")`.
fn split_user_path(path: &str) -> Option<(String, String)> {
    let mut parts = path.split('/').filter(|c| !c.is_empty());
    let folder = parts.next()?.to_string();
    let rest: Vec<&str> = parts.collect();
    if rest.is_empty() {
        return None;
    }
    Some((folder, rest.join("/")))
}

/// Encode scheduler requests onto the wire.
async fn forward_requests(
    mut requests: mpsc::UnboundedReceiver<OutboundRequest>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
) {
    while let Some(request) = requests.recv().await {
        let wire = bep::Request {
            id: request.id as i64,
            folder: request.folder,
            name: request.name,
            offset: request.offset,
            size: request.size as i32,
            hash: request.hash,
            from_temporary: false,
        };
        let frame = encode_message(MessageType::Request, &wire.encode_to_vec());
        if outbound.send(frame).is_err() {
            break;
        }
    }
}

/// Empty ping every 90 seconds keeps the connection alive.
async fn keepalive(outbound: mpsc::UnboundedSender<Vec<u8>>) {
    let mut interval = tokio::time::interval(PING_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await; // immediate first tick
    loop {
        interval.tick().await;
        let frame = encode_message(MessageType::Ping, &bep::Ping {}.encode_to_vec());
        if outbound.send(frame).is_err() {
            return;
        }
    }
}

struct Driver {
    transport: Transport,
    framer: Framer,
    store: Arc<Store>,
    cache: Arc<BlockCache>,
    scheduler: Scheduler,
    events: mpsc::UnboundedSender<Event>,
    connected_tx: Option<oneshot::Sender<Result<()>>>,
    peer: DeviceId,
    exchanged: bool,
}

impl Driver {
    async fn run(mut self) {
        loop {
            let Some(event) = self.transport.recv().await else {
                self.finish(None);
                return;
            };
            match event {
                TransportEvent::Data(bytes) => {
                    self.framer.push(&bytes);
                    loop {
                        match self.framer.next_frame() {
                            Ok(None) => break,
                            Ok(Some(frame)) => match self.handle_frame(frame).await {
                                Ok(false) => {}
                                Ok(true) => {
                                    return;
                                }
                                Err(e) => {
                                    self.fail(e);
                                    return;
                                }
                            },
                            Err(e) => {
                                // No resync marker exists; a malformed frame
                                // closes the connection.
                                self.fail(e.into());
                                return;
                            }
                        }
                    }
                }
                TransportEvent::Closed => {
                    self.finish(None);
                    return;
                }
                TransportEvent::Error(e) => {
                    self.fail(e.into());
                    return;
                }
            }
        }
    }

    /// Returns `Ok(true)` when the session should stop cleanly.
    async fn handle_frame(&mut self, frame: Frame) -> Result<bool> {
        match frame {
            Frame::Hello(hello) => {
                tracing::info!(
                    device = %hello.device_name,
                    client = %hello.client_name,
                    version = %hello.client_version,
                    "peer hello"
                );
                Ok(false)
            }
            Frame::Message { header, payload } => {
                match BepMessage::decode(header.r#type, &payload)? {
                    Some(msg) => self.handle_message(msg).await,
                    None => Ok(false),
                }
            }
        }
    }

    async fn handle_message(&mut self, msg: BepMessage) -> Result<bool> {
        match msg {
            BepMessage::ClusterConfig(cluster) => {
                tracing::info!(folders = cluster.folders.len(), "cluster config received");
                self.store.update_cluster_config(&cluster)?;
                let reply = self.store.cluster_config_for(&self.peer)?;
                self.transport.send(encode_message(
                    MessageType::ClusterConfig,
                    &reply.encode_to_vec(),
                ))?;
                if !self.exchanged {
                    self.exchanged = true;
                    if let Some(tx) = self.connected_tx.take() {
                        let _ = tx.send(Ok(()));
                    }
                    self.emit(Event::Connected);
                }
                Ok(false)
            }
            BepMessage::Index(wire) | BepMessage::IndexUpdate(wire) => {
                self.require_exchanged("index")?;
                let message = index::reshape(wire);
                let folder = message.folder.clone();
                let updated = self.store.apply_index(&message)?;
                if updated {
                    self.emit(Event::Updated {
                        folder: folder.clone(),
                    });
                    tokio::spawn(cleanup_cache(self.store.clone(), self.cache.clone()));
                }
                Ok(false)
            }
            BepMessage::Response(response) => {
                self.require_exchanged("response")?;
                deliver_response(
                    &self.store,
                    &self.cache,
                    &self.scheduler,
                    response.id as u64,
                    response.code,
                    &response.data,
                )
                .await;
                Ok(false)
            }
            BepMessage::Ping => {
                tracing::trace!("ping");
                Ok(false)
            }
            BepMessage::DownloadProgress => {
                tracing::debug!("dropping download progress message");
                Ok(false)
            }
            BepMessage::Request(request) => {
                tracing::warn!(
                    folder = %request.folder,
                    name = %request.name,
                    "peer requested a block from a read-only client, dropping"
                );
                Ok(false)
            }
            BepMessage::Close(close) => {
                tracing::info!(reason = %close.reason, "peer closed the session");
                self.finish(Some(close.reason));
                Ok(true)
            }
        }
    }

    fn require_exchanged(&self, what: &str) -> Result<()> {
        if self.exchanged {
            Ok(())
        } else {
            Err(ClientError::Violation(format!(
                "{what} before cluster-config exchange"
            )))
        }
    }

    fn emit(&self, event: Event) {
        let _ = self.events.send(event);
    }

    fn fail(&mut self, error: ClientError) {
        tracing::error!(error = %error, "session failed");
        let message = error.to_string();
        match self.connected_tx.take() {
            Some(tx) => {
                let _ = tx.send(Err(error));
            }
            None => self.emit(Event::Error { message }),
        }
        self.scheduler.shutdown();
    }

    fn finish(&mut self, reason: Option<String>) {
        if let Some(tx) = self.connected_tx.take() {
            let _ = tx.send(Err(ClientError::ConnectionClosed));
        }
        self.emit(Event::Closed { reason });
        self.scheduler.shutdown();
    }
}

/// Hand response bytes to the scheduler; on verification success write the
/// block through to the cache and mark it present in the catalog.
pub(crate) async fn deliver_response(
    store: &Store,
    cache: &BlockCache,
    scheduler: &Scheduler,
    id: u64,
    code: i32,
    data: &[u8],
) {
    if code != 0 {
        tracing::warn!(id, code, "peer answered block request with an error");
        scheduler.fail(id, FetchError::Peer(code));
        return;
    }
    let Some(fetch) = scheduler.received(id, data) else {
        return;
    };
    match cache
        .write_block(&fetch.folder, fetch.file_id, fetch.offset, data)
        .await
    {
        Ok(()) => {
            if let Err(e) = store.update_block_cache_state(fetch.block_id, CacheState::Present) {
                tracing::warn!(error = %e, "failed to mark block cached");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to write block to cache");
        }
    }
}

/// Remove cache files of stale blocks and reset their rows.
async fn cleanup_cache(store: Arc<Store>, cache: Arc<BlockCache>) {
    let stale = match store.stale_blocks() {
        Ok(stale) => stale,
        Err(e) => {
            tracing::warn!(error = %e, "cache cleanup query failed");
            return;
        }
    };
    if stale.is_empty() {
        return;
    }
    tracing::debug!(count = stale.len(), "cleaning up stale blocks");
    for block in stale {
        if let Err(e) = cache
            .remove_block(&block.folder, block.file_id, block.offset)
            .await
        {
            tracing::warn!(error = %e, "failed to remove stale block file");
            continue;
        }
        if let Err(e) = store.reset_stale_block(block.block_id) {
            tracing::warn!(error = %e, "failed to reset stale block row");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farview_proto::index::{BlockRecord, DirectoryRecord, EntryMeta, FileRecord, IndexMessage};
    use farview_shared::types::EntryKind;
    use sha2::{Digest, Sha256};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn local_id() -> DeviceId {
        DeviceId::from_raw([1u8; 32])
    }

    fn peer_id() -> DeviceId {
        DeviceId::from_raw([2u8; 32])
    }

    fn device(id: &DeviceId, name: &str) -> bep::Device {
        bep::Device {
            id: id.as_bytes().to_vec(),
            name: name.into(),
            addresses: vec![],
            compression: 0,
            cert_name: String::new(),
            max_sequence: 0,
            introducer: false,
            index_id: 7,
            skip_introduction_removals: false,
        }
    }

    fn block_content(i: u8) -> Vec<u8> {
        vec![i; 1024]
    }

    /// A catalog with one folder and one three-block file at `/docs/a/b.txt`.
    fn seeded_store(dir: &std::path::Path) -> Store {
        let store = Store::open(&dir.join("catalog.db"), local_id(), "farview").unwrap();
        store
            .update_cluster_config(&bep::ClusterConfig {
                folders: vec![bep::Folder {
                    id: "docs".into(),
                    label: "Documents".into(),
                    read_only: false,
                    ignore_permissions: false,
                    ignore_delete: false,
                    disable_temp_indexes: false,
                    paused: false,
                    devices: vec![device(&local_id(), "self"), device(&peer_id(), "server")],
                }],
            })
            .unwrap();

        let blocks: Vec<BlockRecord> = (0..3)
            .map(|i| BlockRecord {
                offset: i as i64 * 1024,
                size: 1024,
                hash: Sha256::digest(block_content(i + 1)).to_vec(),
            })
            .collect();
        let index = IndexMessage {
            folder: "docs".into(),
            directories: vec![DirectoryRecord {
                name: "/a".into(),
                meta: EntryMeta::default(),
                placeholder: false,
                files: vec![FileRecord {
                    name: "b.txt".into(),
                    kind: EntryKind::File,
                    size: 3 * 1024,
                    block_size: 1024,
                    symlink_target: String::new(),
                    meta: EntryMeta::default(),
                    blocks,
                }],
            }],
        };
        store.apply_index(&index).unwrap();
        store
    }

    /// Let the serving task finish its write-through before asserting.
    async fn settle(served: &Arc<AtomicUsize>, expected: usize) {
        for _ in 0..1000 {
            if served.load(Ordering::SeqCst) >= expected {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("server never served {expected} blocks");
    }

    /// Serve outbound requests like the peer would, including write-through.
    fn serve_blocks(
        store: Arc<Store>,
        cache: Arc<BlockCache>,
        scheduler: Scheduler,
        mut requests: UnboundedReceiver<OutboundRequest>,
        served: Arc<AtomicUsize>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                let i = (request.offset / 1024) as u8 + 1;
                deliver_response(&store, &cache, &scheduler, request.id, 0, &block_content(i))
                    .await;
                served.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    #[tokio::test]
    async fn read_over_cache_issues_no_requests() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(seeded_store(dir.path()));
        let cache = Arc::new(BlockCache::new(&dir.path().join("blocks")));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(tx, SchedulerConfig::default());

        // Pre-populate the cache and mark every block present.
        let plan = store.blocks_for_read("/docs/a/b.txt", 0, 3 * 1024).unwrap();
        for (i, block) in plan.iter().enumerate() {
            cache
                .write_block("docs", block.file_id, block.offset, &block_content(i as u8 + 1))
                .await
                .unwrap();
            store
                .update_block_cache_state(block.block_id, CacheState::Present)
                .unwrap();
        }

        let data = read::read_bytes(&store, &cache, &scheduler, "/docs/a/b.txt", 0, 3 * 1024)
            .await
            .unwrap();
        assert_eq!(data.len(), 3 * 1024);
        assert_eq!(&data[..1024], &block_content(1)[..]);
        assert_eq!(&data[2048..], &block_content(3)[..]);
        // No network traffic happened.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn read_fetches_missing_blocks_and_caches_them() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(seeded_store(dir.path()));
        let cache = Arc::new(BlockCache::new(&dir.path().join("blocks")));
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(tx, SchedulerConfig::default());
        let served = Arc::new(AtomicUsize::new(0));
        let server = serve_blocks(
            store.clone(),
            cache.clone(),
            scheduler.clone(),
            rx,
            served.clone(),
        );

        let data = read::read_bytes(&store, &cache, &scheduler, "/docs/a/b.txt", 0, 3 * 1024)
            .await
            .unwrap();
        assert_eq!(data.len(), 3 * 1024);
        assert_eq!(&data[1024..2048], &block_content(2)[..]);
        settle(&served, 3).await;

        // Write-through marked everything present.
        let plan = store.blocks_for_read("/docs/a/b.txt", 0, 3 * 1024).unwrap();
        assert!(plan.iter().all(|b| b.cached == CacheState::Present));
        for block in &plan {
            assert!(cache
                .read_block("docs", block.file_id, block.offset, block.size, &block.hash)
                .await
                .is_some());
        }
        assert_eq!(served.load(Ordering::SeqCst), 3);
        server.abort();
    }

    #[tokio::test]
    async fn corrupted_cached_block_is_refetched_and_marked() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(seeded_store(dir.path()));
        let cache = Arc::new(BlockCache::new(&dir.path().join("blocks")));
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(tx, SchedulerConfig::default());
        let served = Arc::new(AtomicUsize::new(0));
        let server = serve_blocks(
            store.clone(),
            cache.clone(),
            scheduler.clone(),
            rx,
            served.clone(),
        );

        let plan = store.blocks_for_read("/docs/a/b.txt", 0, 3 * 1024).unwrap();
        // Blocks 0 and 2 cached correctly, block 1 cached corrupted.
        for (i, block) in plan.iter().enumerate() {
            let content = if i == 1 {
                vec![0xEE; 1024]
            } else {
                block_content(i as u8 + 1)
            };
            cache
                .write_block("docs", block.file_id, block.offset, &content)
                .await
                .unwrap();
            store
                .update_block_cache_state(block.block_id, CacheState::Present)
                .unwrap();
        }

        let data = read::read_bytes(&store, &cache, &scheduler, "/docs/a/b.txt", 0, 3 * 1024)
            .await
            .unwrap();
        assert_eq!(&data[1024..2048], &block_content(2)[..]);
        settle(&served, 1).await;

        // The refetched block ended up present again with good content;
        // exactly one request went to the peer.
        let plan = store.blocks_for_read("/docs/a/b.txt", 0, 3 * 1024).unwrap();
        assert_eq!(plan[1].cached, CacheState::Present);
        assert_eq!(served.load(Ordering::SeqCst), 1);
        let good = cache
            .read_block("docs", plan[1].file_id, plan[1].offset, 1024, &plan[1].hash)
            .await
            .unwrap();
        assert_eq!(good, block_content(2));
        server.abort();
    }

    #[tokio::test]
    async fn read_beyond_limit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(seeded_store(dir.path()));
        let cache = Arc::new(BlockCache::new(&dir.path().join("blocks")));
        let (tx, _rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(tx, SchedulerConfig::default());

        let err = read::read_bytes(
            &store,
            &cache,
            &scheduler,
            "/docs/a/b.txt",
            0,
            11 * 1024 * 1024,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::ReadTooLarge { .. }));
    }

    #[tokio::test]
    async fn short_read_at_eof() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(seeded_store(dir.path()));
        let cache = Arc::new(BlockCache::new(&dir.path().join("blocks")));
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(tx, SchedulerConfig::default());
        let server = serve_blocks(
            store.clone(),
            cache.clone(),
            scheduler.clone(),
            rx,
            Arc::new(AtomicUsize::new(0)),
        );

        let data = read::read_bytes(&store, &cache, &scheduler, "/docs/a/b.txt", 2048 + 512, 4096)
            .await
            .unwrap();
        assert_eq!(data.len(), 512);
        assert_eq!(data, vec![3u8; 512]);
        server.abort();
    }

    #[tokio::test]
    async fn error_response_fails_the_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(seeded_store(dir.path()));
        let cache = Arc::new(BlockCache::new(&dir.path().join("blocks")));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(tx, SchedulerConfig::default());

        let failer = {
            let store = store.clone();
            let cache = cache.clone();
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                while let Some(request) = rx.recv().await {
                    // "no such file"
                    deliver_response(&store, &cache, &scheduler, request.id, 2, &[]).await;
                }
            })
        };

        let err = read::read_bytes(&store, &cache, &scheduler, "/docs/a/b.txt", 0, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Fetch(FetchError::Peer(2))));
        failer.abort();
    }

    #[tokio::test]
    async fn stale_cleanup_removes_files_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(seeded_store(dir.path()));
        let cache = Arc::new(BlockCache::new(&dir.path().join("blocks")));

        let plan = store.blocks_for_read("/docs/a/b.txt", 0, 3 * 1024).unwrap();
        cache
            .write_block("docs", plan[0].file_id, plan[0].offset, &block_content(1))
            .await
            .unwrap();
        store
            .update_block_cache_state(plan[0].block_id, CacheState::Stale)
            .unwrap();

        cleanup_cache(store.clone(), cache.clone()).await;

        assert!(store.stale_blocks().unwrap().is_empty());
        assert!(cache
            .read_block("docs", plan[0].file_id, plan[0].offset, 1024, &plan[0].hash)
            .await
            .is_none());
        let plan = store.blocks_for_read("/docs/a/b.txt", 0, 3 * 1024).unwrap();
        assert_eq!(plan[0].cached, CacheState::Absent);
    }

    #[test]
    fn user_path_split() {
        assert_eq!(
            split_user_path("/docs/a/b.txt"),
            Some(("docs".into(), "a/b.txt".into()))
        );
        assert_eq!(
            split_user_path("/docs/top.bin"),
            Some(("docs".into(), "top.bin".into()))
        );
        assert_eq!(split_user_path("/docs"), None);
        assert_eq!(split_user_path("/"), None);
    }
}
