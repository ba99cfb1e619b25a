use std::time::Duration;

/// First four bytes of the post-TLS stream, big-endian.
pub const BEP_MAGIC: u32 = 0x2EA7_D90B;

/// First four bytes of every relay rendezvous frame, big-endian.
pub const RELAY_MAGIC: u32 = 0x9E79_BC40;

/// Client name announced in the Hello exchange.
pub const CLIENT_NAME: &str = "farview";

/// Client version announced in the Hello exchange.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// ALPN protocol id for BEP over TLS.
pub const BEP_ALPN: &[u8] = b"bep/1.0";

/// Hard timeout for each relay handshake step.
pub const RELAY_STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Idle timeout on an established connection (4.5 minutes).
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(270);

/// Keepalive ping interval while connected.
pub const PING_INTERVAL: Duration = Duration::from_secs(90);

/// Per-request timeout in the block scheduler.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Retries per block request after the first attempt.
pub const REQUEST_RETRIES: u32 = 2;

/// Concurrent in-flight block requests.
pub const REQUEST_CONCURRENCY: usize = 5;

/// Upper bound on a single `read` call (10 MiB).
pub const MAX_READ_LEN: u64 = 10 * 1024 * 1024;

/// Upper bound on a single framed message, to bound allocation.
pub const MAX_MESSAGE_LEN: usize = 512 * 1024 * 1024;

/// Request ids wrap below 2^53 and are never zero.
pub const MAX_REQUEST_ID: u64 = (1 << 53) - 1;
