//! Adapter persisting single records in a key-value store.
//!
//! Every record lives under the key `<baseUrl>/<endpoint>/<id>`. Because a key-value store
//! cannot enumerate or query its items, the collection operations (`find_all`,
//! `update_all`, `destroy_all`) are unsupported.

use async_trait::async_trait;
use mea::mutex::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::trace;

use datastore_core::{
    adapter::{Adapter, AdapterBuilder},
    config::AdapterOptions,
    error::{DataStoreError, DataStoreResult},
    id::RecordId,
    record::{deep_mix_in, record_id},
    resource::ResourceDefinition,
};

use crate::storage::{InMemoryStorage, KeyValueStorage};

/// Joins non-empty path segments with single slashes.
///
/// ```ignore
/// assert_eq!(make_path(&["http://api/", "/posts", "5"]), "http://api/posts/5");
/// ```
pub fn make_path(segments: &[&str]) -> String {
    segments
        .iter()
        .filter(|segment| !segment.is_empty())
        .enumerate()
        .map(|(i, segment)| match i {
            0 => segment.trim_end_matches('/'),
            _ => segment.trim_matches('/'),
        })
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// [`Adapter`] over any [`KeyValueStorage`].
///
/// Writes through one adapter (and its clones) are serialized, so concurrent updates of
/// the same item each merge into the result of the previous one.
#[derive(Debug, Clone)]
pub struct KeyValueAdapter<S: KeyValueStorage = InMemoryStorage> {
    storage: S,
    writes: Arc<Mutex<()>>,
}

impl KeyValueAdapter<InMemoryStorage> {
    pub fn builder() -> KeyValueAdapterBuilder<InMemoryStorage> {
        KeyValueAdapterBuilder::default()
    }
}

impl<S: KeyValueStorage> KeyValueAdapter<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            writes: Arc::new(Mutex::new(())),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Reads and parses the item under `key`. `Null` when absent.
    pub async fn get(&self, key: &str) -> DataStoreResult<Value> {
        match self.storage.get_item(key).await? {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Ok(Value::Null),
        }
    }

    /// Deep-merges `value` into the item under `key` (or stores it as-is when there is
    /// none) and returns the stored item.
    pub async fn put(&self, key: &str, value: Value) -> DataStoreResult<Value> {
        let _write = self.writes.lock().await;

        let item = match (self.get(key).await?, value) {
            (Value::Object(mut existing), Value::Object(update)) => {
                deep_mix_in(&mut existing, &update);
                Value::Object(existing)
            }
            (_, value) => value,
        };

        trace!(key, "put item");
        self.storage.set_item(key, serde_json::to_string(&item)?).await?;
        self.get(key).await
    }

    pub async fn del(&self, key: &str) -> DataStoreResult<()> {
        let _write = self.writes.lock().await;

        trace!(key, "delete item");
        self.storage.remove_item(key).await
    }

    fn key_for(resource: &ResourceDefinition, id: &RecordId, options: &AdapterOptions) -> String {
        let id = id.to_string();

        make_path(&[
            resource.base_url_for(options.base_url.as_deref()),
            &resource.endpoint,
            &id,
        ])
    }
}

#[async_trait]
impl<S: KeyValueStorage> Adapter for KeyValueAdapter<S> {
    async fn find(
        &self,
        resource: &ResourceDefinition,
        id: &RecordId,
        options: &AdapterOptions,
    ) -> DataStoreResult<Value> {
        match self.get(&Self::key_for(resource, id, options)).await? {
            Value::Null => Err(DataStoreError::NotFound(resource.name.clone(), id.to_string())),
            item => Ok(item),
        }
    }

    async fn find_all(
        &self,
        _resource: &ResourceDefinition,
        _params: &Map<String, Value>,
        _options: &AdapterOptions,
    ) -> DataStoreResult<Value> {
        Err(DataStoreError::Unsupported("KeyValueAdapter.find_all".to_string()))
    }

    async fn create(
        &self,
        resource: &ResourceDefinition,
        attrs: Value,
        options: &AdapterOptions,
    ) -> DataStoreResult<Value> {
        let id = attrs
            .as_object()
            .and_then(|attrs| record_id(attrs, &resource.id_attribute))
            .ok_or_else(|| {
                DataStoreError::illegal_argument(
                    "KeyValueAdapter.create: You must provide a primary key in the attrs object!",
                )
            })?;

        self.put(&Self::key_for(resource, &id, options), attrs).await
    }

    async fn update(
        &self,
        resource: &ResourceDefinition,
        id: &RecordId,
        attrs: Value,
        options: &AdapterOptions,
    ) -> DataStoreResult<Value> {
        self.put(&Self::key_for(resource, id, options), attrs).await
    }

    async fn update_all(
        &self,
        _resource: &ResourceDefinition,
        _attrs: Value,
        _params: &Map<String, Value>,
        _options: &AdapterOptions,
    ) -> DataStoreResult<Value> {
        Err(DataStoreError::Unsupported("KeyValueAdapter.update_all".to_string()))
    }

    async fn destroy(
        &self,
        resource: &ResourceDefinition,
        id: &RecordId,
        options: &AdapterOptions,
    ) -> DataStoreResult<Value> {
        self.del(&Self::key_for(resource, id, options)).await?;
        Ok(Value::Null)
    }

    async fn destroy_all(
        &self,
        _resource: &ResourceDefinition,
        _params: &Map<String, Value>,
        _options: &AdapterOptions,
    ) -> DataStoreResult<Value> {
        Err(DataStoreError::Unsupported("KeyValueAdapter.destroy_all".to_string()))
    }
}

/// Builder for [`KeyValueAdapter`].
#[derive(Debug, Default)]
pub struct KeyValueAdapterBuilder<S: KeyValueStorage> {
    storage: S,
}

impl<S: KeyValueStorage> KeyValueAdapterBuilder<S> {
    /// Uses `storage` instead of the builder's current storage.
    pub fn storage<T: KeyValueStorage>(self, storage: T) -> KeyValueAdapterBuilder<T> {
        KeyValueAdapterBuilder { storage }
    }
}

#[async_trait]
impl<S: KeyValueStorage> AdapterBuilder for KeyValueAdapterBuilder<S> {
    type Adapter = KeyValueAdapter<S>;

    async fn build(self) -> DataStoreResult<Self::Adapter> {
        Ok(KeyValueAdapter::new(self.storage))
    }
}
