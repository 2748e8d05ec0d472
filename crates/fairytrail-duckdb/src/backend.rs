use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use chrono::Utc;
use duckdb::Connection;
use tracing::info;

use fairytrail_core::error::StorageError;
use fairytrail_core::storage::KeyValueStore;

use crate::schema::{init_sql, CLIENT_STORAGE_MIGRATION, MIGRATIONS_TABLE_SQL};

/// Durable [`KeyValueStore`] backed by an embedded DuckDB file.
///
/// DuckDB is single-writer. The connection sits behind a `Mutex` so the
/// synchronous storage calls are serialised; there is no cross-process
/// locking, so two processes sharing a file get last-write-wins.
pub struct DuckDbStore {
    conn: Mutex<Connection>,
}

impl DuckDbStore {
    /// Open (or create) a DuckDB database file at `path`.
    ///
    /// `memory_limit` is a DuckDB size string such as `"256MB"`.
    pub fn open(path: &str, memory_limit: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(&conn, memory_limit)?;
        info!(
            "DuckDB storage opened at {} with memory_limit={}",
            path, memory_limit
        );
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an **in-memory** database. Data is discarded on drop.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn, "256MB")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection, memory_limit: &str) -> Result<()> {
        conn.execute_batch(MIGRATIONS_TABLE_SQL)?;
        conn.execute_batch(&init_sql(memory_limit))?;
        conn.execute(
            "INSERT OR IGNORE INTO _migrations (id) VALUES (?1)",
            duckdb::params![CLIENT_STORAGE_MIGRATION],
        )?;
        Ok(())
    }

    /// Execute `SELECT 1` as a lightweight liveness check.
    pub fn ping(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute_batch("SELECT 1").map_err(backend_err)?;
        Ok(())
    }

    /// Number of stored keys.
    pub fn count(&self) -> Result<usize, StorageError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM client_storage", [], |row| row.get(0))
            .map_err(backend_err)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("duckdb connection lock poisoned".to_string()))
    }
}

fn backend_err(e: duckdb::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

impl KeyValueStore for DuckDbStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT value FROM client_storage WHERE key = ?1")
            .map_err(backend_err)?;
        let mut rows = stmt.query(duckdb::params![key]).map_err(backend_err)?;
        match rows.next().map_err(backend_err)? {
            Some(row) => Ok(Some(row.get(0).map_err(backend_err)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.lock()?;
        let now = Utc::now().format("%Y-%m-%d %H:%M:%S%.f").to_string();
        conn.execute(
            r#"INSERT INTO client_storage (key, value, updated_at)
               VALUES (?1, ?2, ?3)
               ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at"#,
            duckdb::params![key, value, now],
        )
        .map_err(backend_err)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM client_storage WHERE key = ?1",
            duckdb::params![key],
        )
        .map_err(backend_err)?;
        Ok(())
    }
}
