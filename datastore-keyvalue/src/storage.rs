//! String key-value storage backing the adapter.
//!
//! Items are JSON text stored under string keys, the same shape a browser's local storage
//! or a simple KV service offers.

use async_trait::async_trait;
use mea::rwlock::RwLock;
use std::{collections::HashMap, fmt::Debug, sync::Arc};

use datastore_core::error::DataStoreResult;

/// A key-value store holding JSON text.
#[async_trait]
pub trait KeyValueStorage: Send + Sync + Debug {
    /// Returns the text stored under `key`, if any.
    async fn get_item(&self, key: &str) -> DataStoreResult<Option<String>>;

    /// Stores `value` under `key`, replacing any existing item.
    async fn set_item(&self, key: &str, value: String) -> DataStoreResult<()>;

    /// Removes the item under `key`. Removing a missing key is not an error.
    async fn remove_item(&self, key: &str) -> DataStoreResult<()>;
}

/// Thread-safe in-memory [`KeyValueStorage`].
///
/// Clones share the same underlying map.
#[derive(Default, Clone, Debug)]
pub struct InMemoryStorage {
    items: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStorage for InMemoryStorage {
    async fn get_item(&self, key: &str) -> DataStoreResult<Option<String>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> DataStoreResult<()> {
        self.items.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> DataStoreResult<()> {
        self.items.write().await.remove(key);
        Ok(())
    }
}
