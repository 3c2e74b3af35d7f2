//! In-memory key-value store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::broadcast;

use super::{KvStore, StoreChange, StoreError, CHANGE_CHANNEL_CAPACITY};

/// Volatile store with the same notification semantics as the SQLite one.
pub struct MemoryKvStore {
    entries: Mutex<BTreeMap<String, Value>>,
    changes: broadcast::Sender<StoreChange>,
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKvStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            entries: Mutex::new(BTreeMap::new()),
            changes,
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError> {
        let changes: Vec<StoreChange> = {
            let mut stored = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries
                .into_iter()
                .filter_map(|(key, value)| {
                    let old_value = stored.insert(key.clone(), value.clone());
                    (old_value.as_ref() != Some(&value)).then_some(StoreChange {
                        key,
                        old_value,
                        new_value: Some(value),
                    })
                })
                .collect()
        };
        for change in changes {
            let _ = self.changes.send(change);
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let removed = std::mem::take(&mut *self.entries.lock().unwrap_or_else(|e| e.into_inner()));
        for (key, value) in removed {
            let _ = self.changes.send(StoreChange {
                key,
                old_value: Some(value),
                new_value: None,
            });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_store_round_trip_and_clear() {
        let store = MemoryKvStore::new();
        let mut rx = store.subscribe();
        store.set_one("k", json!("v")).unwrap();
        assert_eq!(store.get_one("k").unwrap(), Some(json!("v")));
        assert_eq!(store.len(), 1);

        store.clear().unwrap();
        assert!(store.is_empty());

        assert_eq!(rx.try_recv().unwrap().new_value, Some(json!("v")));
        let cleared = rx.try_recv().unwrap();
        assert_eq!(cleared.key, "k");
        assert_eq!(cleared.new_value, None);
    }
}
