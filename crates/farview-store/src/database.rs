//! Store connection management.
//!
//! The [`Store`] owns one writer [`rusqlite::Connection`] used for all
//! multi-write operations (behind exclusive transactions) and a bounded
//! [`ReadPool`] for queries. Migrations run before any other operation.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rusqlite::Connection;

use farview_shared::DeviceId;

use crate::error::Result;
use crate::migrations;
use crate::pool::ReadPool;

pub struct Store {
    writer: Mutex<Connection>,
    pool: ReadPool,
    path: PathBuf,
    local_id: DeviceId,
    device_name: String,
}

impl Store {
    /// Open (or create) the catalog database at `path`.
    ///
    /// `local_id` is this client's own device id; `device_name` is the name
    /// we announce for ourselves, overriding whatever a peer claims.
    pub fn open(path: &Path, local_id: DeviceId, device_name: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "opening catalog database");

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        migrations::run_migrations(&conn)?;

        Ok(Store {
            writer: Mutex::new(conn),
            pool: ReadPool::new(path),
            path: path.to_path_buf(),
            local_id,
            device_name: device_name.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn local_id(&self) -> &DeviceId {
        &self.local_id
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// The writer connection. Multi-write operations wrap it in an exclusive
    /// transaction; the lock serialises writers.
    pub(crate) fn writer(&self) -> MutexGuard<'_, Connection> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A pooled read connection.
    pub(crate) fn reader(&self) -> Result<crate::pool::PooledConn> {
        self.pool.get()
    }
}
