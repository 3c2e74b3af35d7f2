//! Artwork cache: detail URL -> poster URL, on top of the durable store.

use std::sync::Arc;

use serde_json::Value;

use crate::store::{KvStore, StoreError};

/// Durable artwork cache keyed by detail URL.
///
/// Entries never expire. Once a key has a value that value is authoritative:
/// [`ArtworkCache::remember`] never overwrites it.
#[derive(Clone)]
pub struct ArtworkCache {
    store: Arc<dyn KvStore>,
}

impl ArtworkCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Cached poster for `detail_link`, if any.
    pub fn lookup(&self, detail_link: &str) -> Result<Option<String>, StoreError> {
        Ok(match self.store.get_one(detail_link)? {
            Some(Value::String(poster)) => Some(poster),
            _ => None,
        })
    }

    /// Store `poster` unless an entry already exists; returns the entry that
    /// is now authoritative.
    pub fn remember(&self, detail_link: &str, poster: &str) -> Result<String, StoreError> {
        if let Some(existing) = self.lookup(detail_link)? {
            return Ok(existing);
        }
        self.store
            .set_one(detail_link, Value::String(poster.to_string()))?;
        Ok(poster.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKvStore;

    #[test]
    fn test_remember_is_first_writer_wins() {
        let cache = ArtworkCache::new(Arc::new(MemoryKvStore::new()));
        assert_eq!(cache.lookup("http://x/1").unwrap(), None);

        assert_eq!(cache.remember("http://x/1", "a.jpg").unwrap(), "a.jpg");
        assert_eq!(cache.remember("http://x/1", "b.jpg").unwrap(), "a.jpg");
        assert_eq!(cache.lookup("http://x/1").unwrap().as_deref(), Some("a.jpg"));
    }

    #[test]
    fn test_non_string_value_is_a_miss() {
        let store = Arc::new(MemoryKvStore::new());
        store.set_one("http://x/1", Value::Bool(true)).unwrap();
        let cache = ArtworkCache::new(store);
        assert_eq!(cache.lookup("http://x/1").unwrap(), None);
    }
}
