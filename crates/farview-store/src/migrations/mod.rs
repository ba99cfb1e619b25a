pub mod v001_initial;

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, StoreError};

const CURRENT_VERSION: i64 = 1;

/// Bring the database schema up to [`CURRENT_VERSION`].
///
/// The version integer lives in the single-row `schema` table; a missing
/// table means a fresh database.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema (version INTEGER NOT NULL)")?;
    let current: Option<i64> = conn
        .query_row("SELECT version FROM schema", [], |row| row.get(0))
        .optional()?;

    tracing::info!(
        current_version = current,
        target_version = CURRENT_VERSION,
        "checking database migrations"
    );

    match current {
        None => {
            tracing::info!("applying migration v001_initial");
            v001_initial::up(conn).map_err(|e| StoreError::Migration(e.to_string()))?;
            conn.execute("INSERT INTO schema (version) VALUES (?1)", [CURRENT_VERSION])?;
        }
        Some(v) if v == CURRENT_VERSION => {}
        Some(v) if v < CURRENT_VERSION => {
            // No intermediate versions exist yet.
            return Err(StoreError::Migration(format!(
                "cannot migrate from unknown version {v}"
            )));
        }
        Some(v) => {
            return Err(StoreError::Migration(format!(
                "database version {v} is newer than supported {CURRENT_VERSION}"
            )));
        }
    }

    Ok(())
}
