pub mod migrations;
pub mod models;
pub mod queries;
pub mod snapshot;

use anyhow::{Result, anyhow};
use rusqlite::TransactionBehavior;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

pub use rusqlite::{Connection, Transaction};
pub use snapshot::SqliteBackup;

/// Roster store. A single connection behind a mutex: every write goes
/// through [`Database::with_tx`], so mutating operations are serialized.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Connection) -> std::result::Result<T, E>,
        E: From<anyhow::Error>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Run `f` inside an immediate transaction. Commits if `f` returns `Ok`,
    /// rolls back otherwise.
    ///
    /// The error type is the caller's, so domain errors raised mid-transaction
    /// abort it without being flattened into `anyhow`.
    pub fn with_tx<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
        E: From<anyhow::Error>,
    {
        let mut conn = self.conn.lock().map_err(|e| anyhow!("DB lock poisoned: {}", e))?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(anyhow::Error::from)?;
        let out = f(&tx)?;
        tx.commit().map_err(anyhow::Error::from)?;
        Ok(out)
    }
}
