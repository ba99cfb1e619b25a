//! Read-only client for the BEP file-synchronisation protocol.
//!
//! A [`Session`] connects to one remote peer, mirrors its folder indexes
//! into a local catalog and serves `attributes` / `list` / `read` calls,
//! fetching content-addressed blocks on demand and verifying them by
//! SHA-256 before use.

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
mod read;
pub mod scheduler;
pub mod session;

pub use cache::BlockCache;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use events::Event;
pub use scheduler::{BlockFetch, FetchError, Scheduler, SchedulerConfig};
pub use session::Session;
