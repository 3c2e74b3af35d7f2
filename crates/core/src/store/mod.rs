//! Durable key-value store.
//!
//! Holds the two persisted key families: one boolean per site feature flag and
//! one artwork URL per detail page. Every effective change is published as a
//! [`StoreChange`] so the feature state can follow edits made by the settings
//! surface.

mod memory;
mod sqlite;

pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

/// Capacity of the change notification channel.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// A single key change. `None` means the key was absent / removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreChange {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Trait for durable key-value storage backends.
pub trait KvStore: Send + Sync {
    /// Fetch the values of the given keys. Absent keys are omitted.
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError>;

    /// Write all entries. Publishes one change per key whose value changed.
    fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError>;

    /// Remove every key. Publishes a removal per key.
    fn clear(&self) -> Result<(), StoreError>;

    /// Subscribe to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;

    /// Fetch a single key.
    fn get_one(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.get(&[key])?.remove(key))
    }

    /// Write a single key.
    fn set_one(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.set(HashMap::from([(key.to_string(), value)]))
    }
}
