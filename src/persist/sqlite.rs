//! SQLite-backed key-value store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use super::{KvStore, PersistError, PersistResult};

/// SQLite implementation of [`crate::persist::KvStore`].
pub struct SqliteKv {
    conn: Mutex<Connection>,
}

impl SqliteKv {
    /// Opens or creates a SQLite-backed store at `path`.
    ///
    /// With `wal` set, enables WAL mode and `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>, wal: bool) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn, wal)
    }

    /// Opens an in-memory SQLite store.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn, false)
    }

    fn init_connection(conn: Connection, wal: bool) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        if wal {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> PersistResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PersistError::Message("sqlite connection mutex poisoned".to_string()))
    }
}

impl KvStore for SqliteKv {
    fn get(&self, key: &str) -> PersistResult<Option<Vec<u8>>> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8]) -> PersistResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO kv(key, value, updated_ms) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_ms = excluded.updated_ms",
            params![key, value, now_ms() as i64],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> PersistResult<bool> {
        let conn = self.conn()?;
        let count = conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(count > 0)
    }

    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> PersistResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current: Option<Vec<u8>> = tx
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;

        if current.as_deref() != expected {
            return Ok(false);
        }

        match new {
            Some(value) => {
                tx.execute(
                    "INSERT INTO kv(key, value, updated_ms) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_ms = excluded.updated_ms",
                    params![key, value, now_ms() as i64],
                )?;
            }
            None => {
                tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            }
        }
        tx.commit()?;
        Ok(true)
    }

    fn scan_prefix(&self, prefix: &str) -> PersistResult<Vec<(String, Vec<u8>)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT key, value FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key ASC",
        )?;
        let rows = stmt.query_map(params![prefix], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
