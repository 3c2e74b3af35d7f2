//! SQLite-backed key-value store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tokio::sync::broadcast;

use super::{KvStore, StoreChange, StoreError, CHANGE_CHANNEL_CAPACITY};

/// SQLite-backed key-value store.
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<StoreChange>,
}

impl SqliteKvStore {
    /// Open (or create) the store at `path`.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        Self::initialize_schema(&conn)?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            -- One row per key; value is JSON text
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read_value(conn: &Connection, key: &str) -> Result<Option<Value>, StoreError> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        raw.map(|r| serde_json::from_str(&r).map_err(|e| StoreError::Serialization(e.to_string())))
            .transpose()
    }

    fn publish(&self, changes: Vec<StoreChange>) {
        for change in changes {
            // Err only means nobody is listening.
            let _ = self.changes.send(change);
        }
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        let conn = self.conn();
        let mut out = HashMap::new();
        for key in keys {
            if let Some(value) = Self::read_value(&conn, key)? {
                out.insert(key.to_string(), value);
            }
        }
        Ok(out)
    }

    fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError> {
        let mut changes = Vec::new();
        {
            let mut conn = self.conn();
            let tx = conn
                .transaction()
                .map_err(|e| StoreError::Database(e.to_string()))?;
            let now = Utc::now().to_rfc3339();

            for (key, value) in entries {
                let old_value = Self::read_value(&tx, &key)?;
                if old_value.as_ref() == Some(&value) {
                    continue;
                }
                let encoded = serde_json::to_string(&value)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                tx.execute(
                    "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![key, encoded, now],
                )
                .map_err(|e| StoreError::Database(e.to_string()))?;
                changes.push(StoreChange {
                    key,
                    old_value,
                    new_value: Some(value),
                });
            }

            tx.commit()
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        self.publish(changes);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let changes = {
            let conn = self.conn();
            let mut stmt = conn
                .prepare("SELECT key, value FROM kv_store ORDER BY key")
                .map_err(|e| StoreError::Database(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
                .map_err(|e| StoreError::Database(e.to_string()))?;

            let mut changes = Vec::new();
            for row in rows {
                let (key, raw) = row.map_err(|e| StoreError::Database(e.to_string()))?;
                changes.push(StoreChange {
                    key,
                    old_value: serde_json::from_str(&raw).ok(),
                    new_value: None,
                });
            }
            drop(stmt);

            conn.execute("DELETE FROM kv_store", [])
                .map_err(|e| StoreError::Database(e.to_string()))?;
            changes
        };

        self.publish(changes);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
