//! Bounded pool of read-only connections.
//!
//! Writes go through the store's single writer connection; reads borrow from
//! this pool. The pool keeps a minimum number of idle connections, closes
//! idle ones above the minimum after a timeout, and fails fast once the hard
//! maximum of open connections is reached.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rusqlite::{Connection, OpenFlags};

use crate::error::{Result, StoreError};

pub const MIN_IDLE: usize = 2;
pub const MAX_OPEN: usize = 8;
pub const IDLE_CLOSE_AFTER: Duration = Duration::from_secs(600);

struct IdleConn {
    conn: Connection,
    since: Instant,
}

struct PoolState {
    idle: Vec<IdleConn>,
    open: usize,
}

struct PoolShared {
    path: PathBuf,
    max_open: usize,
    min_idle: usize,
    idle_close_after: Duration,
    state: Mutex<PoolState>,
}

/// Cloneable handle to the read pool.
#[derive(Clone)]
pub struct ReadPool {
    shared: Arc<PoolShared>,
}

impl ReadPool {
    pub fn new(path: &Path) -> Self {
        Self::with_limits(path, MAX_OPEN, MIN_IDLE, IDLE_CLOSE_AFTER)
    }

    pub fn with_limits(
        path: &Path,
        max_open: usize,
        min_idle: usize,
        idle_close_after: Duration,
    ) -> Self {
        ReadPool {
            shared: Arc::new(PoolShared {
                path: path.to_path_buf(),
                max_open,
                min_idle,
                idle_close_after,
                state: Mutex::new(PoolState {
                    idle: Vec::new(),
                    open: 0,
                }),
            }),
        }
    }

    /// Borrow a connection; opens a new one if no idle connection exists and
    /// the cap allows it. The connection returns to the pool on drop.
    pub fn get(&self) -> Result<PooledConn> {
        {
            let mut state = self.lock_state();
            Self::sweep(&self.shared, &mut state);
            if let Some(idle) = state.idle.pop() {
                return Ok(PooledConn {
                    conn: Some(idle.conn),
                    shared: self.shared.clone(),
                });
            }
            if state.open >= self.shared.max_open {
                return Err(StoreError::PoolExhausted);
            }
            state.open += 1;
        }
        match self.open_connection() {
            Ok(conn) => Ok(PooledConn {
                conn: Some(conn),
                shared: self.shared.clone(),
            }),
            Err(e) => {
                self.lock_state().open -= 1;
                Err(e)
            }
        }
    }

    fn open_connection(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.shared.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Close idle connections beyond the minimum that have sat past the
    /// timeout. Called opportunistically on checkout and checkin.
    fn sweep(shared: &PoolShared, state: &mut PoolState) {
        let now = Instant::now();
        while state.idle.len() > shared.min_idle {
            let expired = state
                .idle
                .first()
                .map(|c| now.duration_since(c.since) >= shared.idle_close_after)
                .unwrap_or(false);
            if !expired {
                break;
            }
            state.idle.remove(0);
            state.open -= 1;
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn open_count(&self) -> usize {
        self.lock_state().open
    }
}

/// A borrowed read connection; returns to the pool on drop.
pub struct PooledConn {
    conn: Option<Connection>,
    shared: Arc<PoolShared>,
}

impl Deref for PooledConn {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only None after drop.
        self.conn.as_ref().expect("pooled connection already returned")
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let mut state = self
                .shared
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            state.idle.push(IdleConn {
                conn,
                since: Instant::now(),
            });
            ReadPool::sweep(&self.shared, &mut state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_db() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (42);")
            .unwrap();
        (dir, path)
    }

    #[test]
    fn checkout_and_reuse() {
        let (_dir, path) = seeded_db();
        let pool = ReadPool::new(&path);
        {
            let conn = pool.get().unwrap();
            let v: i64 = conn
                .query_row("SELECT v FROM t", [], |row| row.get(0))
                .unwrap();
            assert_eq!(v, 42);
        }
        // Returned connection is reused, not reopened.
        let _conn = pool.get().unwrap();
        assert_eq!(pool.open_count(), 1);
    }

    #[test]
    fn cap_fails_fast() {
        let (_dir, path) = seeded_db();
        let pool = ReadPool::with_limits(&path, 2, 1, IDLE_CLOSE_AFTER);
        let a = pool.get().unwrap();
        let b = pool.get().unwrap();
        assert!(matches!(pool.get(), Err(StoreError::PoolExhausted)));
        drop(a);
        drop(b);
        assert!(pool.get().is_ok());
    }

    #[test]
    fn idle_connections_closed_above_minimum() {
        let (_dir, path) = seeded_db();
        let pool = ReadPool::with_limits(&path, 8, 1, Duration::ZERO);
        let a = pool.get().unwrap();
        let b = pool.get().unwrap();
        let c = pool.get().unwrap();
        assert_eq!(pool.open_count(), 3);
        drop(a);
        drop(b);
        drop(c);
        // Everything idle and instantly expired; the minimum is retained.
        let _probe = pool.get().unwrap();
        assert!(pool.open_count() <= 2);
    }
}
