//! The data store.
//!
//! [`DataStore`] owns the adapter registry, the resource registry and one
//! [`ResourceCollection`] per resource. It is cheap to clone; clones share the same state.
//!
//! Remote fetches live in [`fetch`](crate::fetch). Everything here is either a registry
//! operation, a write through an adapter, or a purely local operation on the cache.
//!
//! # Locking
//!
//! Each resource has its own async read-write lock. No lock is ever held while an adapter
//! call is in flight, so a slow backend never blocks reads of the cache.

use futures::future::{BoxFuture, Shared};
use mea::rwlock::RwLock;
use serde_json::{Map, Value};
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::{debug, warn};

use crate::{
    adapter::Adapter,
    collection::{Changes, Clock, ResourceCollection},
    config::{DataStoreConfig, SaveOptions},
    error::{DataStoreError, DataStoreResult},
    id::RecordId,
    query::{Query, QuerySignature, params_from_value},
    record::{Model, Record, into_records, record_id},
    resource::{ResourceDefinition, ResourceDefinitionBuilder},
    typed::TypedResource,
};

/// An in-flight adapter request that several callers may await.
pub(crate) type PendingFetch<T> = Shared<BoxFuture<'static, DataStoreResult<T>>>;

pub(crate) struct ResourceState {
    pub(crate) collection: ResourceCollection,
    pub(crate) pending_queries: HashMap<QuerySignature, PendingFetch<Vec<Record>>>,
    pub(crate) pending_finds: HashMap<RecordId, PendingFetch<Record>>,
}

impl fmt::Debug for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceState")
            .field("collection", &self.collection)
            .field("pending_queries", &self.pending_queries.keys().collect::<Vec<_>>())
            .field("pending_finds", &self.pending_finds.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A registered resource and its cache.
#[derive(Debug)]
pub(crate) struct ResourceEntry {
    pub(crate) definition: ResourceDefinition,
    pub(crate) state: RwLock<ResourceState>,
}

impl ResourceEntry {
    fn new(definition: ResourceDefinition) -> Self {
        let collection = ResourceCollection::new(definition.id_attribute.clone());

        Self {
            definition,
            state: RwLock::new(ResourceState {
                collection,
                pending_queries: HashMap::new(),
                pending_finds: HashMap::new(),
            }),
        }
    }
}

#[derive(Debug, Default)]
struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn Adapter>>,
    default: Option<String>,
}

#[derive(Debug)]
pub(crate) struct StoreInner {
    pub(crate) config: DataStoreConfig,
    adapters: RwLock<AdapterRegistry>,
    resources: RwLock<HashMap<String, Arc<ResourceEntry>>>,
    pub(crate) clock: Clock,
}

/// Client-side cache of resource records backed by pluggable adapters.
///
/// # Example
///
/// ```ignore
/// let store = DataStore::new();
/// store.register_adapter("kv", KeyValueAdapter::new(InMemoryStorage::new()), true).await;
/// store.define_resource(ResourceDefinition::builder("post").endpoint("posts")).await?;
///
/// let posts = store.find_all("post", json!({ "where": { "author": "Adam" } }), FindAllOptions::new()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct DataStore {
    pub(crate) inner: Arc<StoreInner>,
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStore {
    /// Creates an empty store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(DataStoreConfig::default())
    }

    /// Creates an empty store with the given configuration.
    pub fn with_config(config: DataStoreConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                config,
                adapters: RwLock::new(AdapterRegistry::default()),
                resources: RwLock::new(HashMap::new()),
                clock: Clock::default(),
            }),
        }
    }

    pub fn config(&self) -> &DataStoreConfig {
        &self.inner.config
    }

    /// Registers an adapter under `name`. With `default` set, it becomes the adapter for
    /// every resource and call that doesn't name one.
    pub async fn register_adapter<A>(&self, name: impl Into<String>, adapter: A, default: bool)
    where
        A: Adapter + 'static,
    {
        let name = name.into();
        let mut registry = self.inner.adapters.write().await;

        if default {
            registry.default = Some(name.clone());
        }

        debug!(adapter = %name, default, "registered adapter");
        registry.adapters.insert(name, Arc::new(adapter));
    }

    /// Registers a resource. Values the definition leaves unset come from the store config.
    ///
    /// # Errors
    ///
    /// Returns [`DataStoreError::IllegalArgument`] if the name or id attribute is empty, or
    /// if a resource with the same name already exists.
    pub async fn define_resource(
        &self,
        definition: ResourceDefinitionBuilder,
    ) -> DataStoreResult<ResourceDefinition> {
        let definition = definition.try_build_with(&self.inner.config)?;
        let mut resources = self.inner.resources.write().await;

        if resources.contains_key(&definition.name) {
            return Err(DataStoreError::illegal_argument(format!(
                "{} is already registered!",
                definition.name
            )));
        }

        debug!(resource = %definition.name, endpoint = %definition.endpoint, "defined resource");
        resources.insert(definition.name.clone(), Arc::new(ResourceEntry::new(definition.clone())));

        Ok(definition)
    }

    /// The definition of a registered resource.
    pub async fn definition(&self, resource: &str) -> DataStoreResult<ResourceDefinition> {
        Ok(self.resource(resource).await?.definition.clone())
    }

    /// A typed view over the resource named by `M::resource_name()`.
    pub fn typed<M: Model>(&self) -> TypedResource<'_, M> {
        TypedResource::new(self)
    }

    pub(crate) async fn resource(&self, name: &str) -> DataStoreResult<Arc<ResourceEntry>> {
        self.inner
            .resources
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| DataStoreError::NonexistentResource(name.to_string()))
    }

    /// Resolves the adapter for a call: the requested one, else the resource default,
    /// else the store default.
    pub(crate) async fn adapter_for(
        &self,
        definition: &ResourceDefinition,
        requested: Option<&str>,
    ) -> DataStoreResult<Arc<dyn Adapter>> {
        let registry = self.inner.adapters.read().await;
        let name = requested
            .or(definition.default_adapter.as_deref())
            .or(registry.default.as_deref())
            .ok_or_else(|| {
                DataStoreError::illegal_argument(format!("{}: No adapter is registered!", definition.name))
            })?;

        registry
            .adapters
            .get(name)
            .cloned()
            .ok_or_else(|| DataStoreError::illegal_argument(format!("adapter: {name} is not a registered adapter!")))
    }

    /// Persists a new record through the adapter.
    pub async fn create(&self, resource: &str, attrs: Value, options: SaveOptions) -> DataStoreResult<Record> {
        let entry = self.resource(resource).await?;
        let definition = &entry.definition;

        if !attrs.is_object() {
            return Err(DataStoreError::illegal_argument("attrs: Must be an object!"));
        }

        let adapter = self.adapter_for(definition, options.adapter.as_deref()).await?;
        let payload = definition.hooks.serialize(definition, attrs);
        let response = adapter
            .create(definition, payload, &options.adapter_options)
            .await
            .inspect_err(|err| warn!(resource = %definition.name, error = %err, "create failed"))?;

        self.accept_write(&entry, response, options.resolve_cache_response(&self.inner.config))
            .await
    }

    /// Updates a record through the adapter.
    pub async fn update(
        &self,
        resource: &str,
        id: impl Into<RecordId>,
        attrs: Value,
        options: SaveOptions,
    ) -> DataStoreResult<Record> {
        let entry = self.resource(resource).await?;

        if !attrs.is_object() {
            return Err(DataStoreError::illegal_argument("attrs: Must be an object!"));
        }

        self.send_update(&entry, &id.into(), attrs, &options).await
    }

    /// Sends the cached state of a record to the adapter. With `changes_only`, only the
    /// attributes changed since the last save are sent, and nothing is sent when there
    /// are none.
    pub async fn save(&self, resource: &str, id: impl Into<RecordId>, options: SaveOptions) -> DataStoreResult<Record> {
        let entry = self.resource(resource).await?;
        let id = id.into();

        let (record, changes) = {
            let state = entry.state.read().await;
            let record = state
                .collection
                .get(&id)
                .cloned()
                .ok_or_else(|| DataStoreError::NotFound(entry.definition.name.clone(), id.to_string()))?;

            (record, state.collection.changes(&id).unwrap_or_default())
        };

        let attrs = if options.changes_only {
            if changes.is_empty() {
                debug!(resource = %entry.definition.name, %id, "nothing to save");
                return Ok(record);
            }

            changes.to_attrs()
        } else {
            record
        };

        self.send_update(&entry, &id, Value::Object(attrs), &options).await
    }

    /// Deletes a record through the adapter, then ejects it from the cache.
    pub async fn destroy(&self, resource: &str, id: impl Into<RecordId>, options: SaveOptions) -> DataStoreResult<RecordId> {
        let entry = self.resource(resource).await?;
        let definition = &entry.definition;
        let id = id.into();

        let adapter = self.adapter_for(definition, options.adapter.as_deref()).await?;
        adapter
            .destroy(definition, &id, &options.adapter_options)
            .await
            .inspect_err(|err| warn!(resource = %definition.name, %id, error = %err, "destroy failed"))?;

        let mut state = entry.state.write().await;
        state.collection.remove(&id, self.inner.clock.tick());

        Ok(id)
    }

    async fn send_update(
        &self,
        entry: &ResourceEntry,
        id: &RecordId,
        attrs: Value,
        options: &SaveOptions,
    ) -> DataStoreResult<Record> {
        let definition = &entry.definition;
        let adapter = self.adapter_for(definition, options.adapter.as_deref()).await?;
        let payload = definition.hooks.serialize(definition, attrs);
        let response = adapter
            .update(definition, id, payload, &options.adapter_options)
            .await
            .inspect_err(|err| warn!(resource = %definition.name, %id, error = %err, "update failed"))?;

        self.accept_write(entry, response, options.resolve_cache_response(&self.inner.config))
            .await
    }

    /// Deserializes a write response and, when caching, injects it as saved.
    async fn accept_write(&self, entry: &ResourceEntry, response: Value, cache_response: bool) -> DataStoreResult<Record> {
        let definition = &entry.definition;
        let data = definition.hooks.deserialize(definition, response);
        let (id, record) = into_records(data, &definition.id_attribute)?
            .into_iter()
            .next()
            .ok_or_else(|| DataStoreError::Runtime(format!("{}: adapter returned no record", definition.name)))?;

        if !cache_response {
            return Ok(record);
        }

        let mut state = entry.state.write().await;
        let mut stored = inject_records(definition, &mut state.collection, vec![(id, record)], &self.inner.clock, true);

        stored
            .pop()
            .ok_or_else(|| DataStoreError::Runtime(format!("{}: injection produced no record", definition.name)))
    }

    /// Merges one record or an array of records into the cache.
    ///
    /// Every record must carry the id attribute; otherwise nothing is injected.
    pub async fn inject(&self, resource: &str, attrs: Value) -> DataStoreResult<Vec<Record>> {
        let entry = self.resource(resource).await?;
        let definition = &entry.definition;

        if !attrs.is_object() && !attrs.is_array() {
            return Err(DataStoreError::illegal_argument("attrs: Must be an object or an array!"));
        }

        let records = into_records(attrs, &definition.id_attribute)?;
        let mut state = entry.state.write().await;

        Ok(inject_records(definition, &mut state.collection, records, &self.inner.clock, false))
    }

    /// Removes a record from the cache.
    pub async fn eject(&self, resource: &str, id: impl Into<RecordId>) -> DataStoreResult<Option<Record>> {
        let entry = self.resource(resource).await?;
        let mut state = entry.state.write().await;

        Ok(state.collection.remove(&id.into(), self.inner.clock.tick()))
    }

    /// Removes every cached record matching `params` and forgets the completed queries
    /// they came from: all of them for an empty descriptor, else only the matching one.
    pub async fn eject_all(&self, resource: &str, params: Value) -> DataStoreResult<Vec<Record>> {
        let entry = self.resource(resource).await?;
        let params = params_from_value(params)?;
        let query = Query::from_params(&params)?;
        let mut state = entry.state.write().await;

        if params.is_empty() {
            state.collection.forget_all_queries();
        } else {
            state.collection.forget_query(&QuerySignature::of(&params));
        }

        Ok(state.collection.remove_matching(&query, self.inner.clock.tick()))
    }

    pub async fn get(&self, resource: &str, id: impl Into<RecordId>) -> DataStoreResult<Option<Record>> {
        let entry = self.resource(resource).await?;
        let state = entry.state.read().await;

        Ok(state.collection.get(&id.into()).cloned())
    }

    /// Cached records for `ids` in the given order, skipping unknown ids. `None` returns
    /// every cached record in insertion order.
    pub async fn get_all(&self, resource: &str, ids: Option<Vec<RecordId>>) -> DataStoreResult<Vec<Record>> {
        let entry = self.resource(resource).await?;
        let state = entry.state.read().await;

        Ok(match ids {
            Some(ids) => ids
                .iter()
                .filter_map(|id| state.collection.get(id).cloned())
                .collect(),
            None => state.collection.records().cloned().collect(),
        })
    }

    /// Evaluates a query descriptor against the cached records.
    pub async fn filter(&self, resource: &str, params: Value) -> DataStoreResult<Vec<Record>> {
        let entry = self.resource(resource).await?;
        let query = Query::from_params(&params_from_value(params)?)?;
        let state = entry.state.read().await;

        Ok(state.collection.filter(&query))
    }

    pub async fn last_modified(&self, resource: &str, id: Option<RecordId>) -> DataStoreResult<Option<i64>> {
        let entry = self.resource(resource).await?;
        let state = entry.state.read().await;

        Ok(state.collection.last_modified(id.as_ref()))
    }

    pub async fn last_saved(&self, resource: &str, id: Option<RecordId>) -> DataStoreResult<Option<i64>> {
        let entry = self.resource(resource).await?;
        let state = entry.state.read().await;

        Ok(state.collection.last_saved(id.as_ref()))
    }

    /// Whether a `find_all` for `params` has completed and is being served from the cache.
    pub async fn is_query_completed(&self, resource: &str, params: Value) -> DataStoreResult<bool> {
        let entry = self.resource(resource).await?;
        let signature = QuerySignature::of(&params_from_value(params)?);
        let state = entry.state.read().await;

        Ok(state.collection.is_query_completed(&signature))
    }

    /// Whether a `find_all` for `params` is currently in flight.
    pub async fn is_query_pending(&self, resource: &str, params: Value) -> DataStoreResult<bool> {
        let entry = self.resource(resource).await?;
        let signature = QuerySignature::of(&params_from_value(params)?);
        let state = entry.state.read().await;

        Ok(state.pending_queries.contains_key(&signature))
    }

    /// Mutates a cached record in place. The id attribute cannot be changed this way.
    ///
    /// # Errors
    ///
    /// Returns [`DataStoreError::NotFound`] if the record is not cached.
    pub async fn modify<F>(&self, resource: &str, id: impl Into<RecordId>, f: F) -> DataStoreResult<Record>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        let entry = self.resource(resource).await?;
        let id_attribute = entry.definition.id_attribute.as_str();
        let id = id.into();
        let mut state = entry.state.write().await;

        state
            .collection
            .modify(&id, self.inner.clock.tick(), |record| {
                f(record);
                record.insert(id_attribute.to_string(), id.to_value());
            })
            .cloned()
            .ok_or_else(|| DataStoreError::NotFound(entry.definition.name.clone(), id.to_string()))
    }

    /// The record as it was when last saved or injected.
    pub async fn previous(&self, resource: &str, id: impl Into<RecordId>) -> DataStoreResult<Option<Record>> {
        let entry = self.resource(resource).await?;
        let state = entry.state.read().await;

        Ok(state.collection.previous(&id.into()).cloned())
    }

    pub async fn changes(&self, resource: &str, id: impl Into<RecordId>) -> DataStoreResult<Option<Changes>> {
        let entry = self.resource(resource).await?;
        let state = entry.state.read().await;

        Ok(state.collection.changes(&id.into()))
    }

    pub async fn has_changes(&self, resource: &str, id: impl Into<RecordId>) -> DataStoreResult<bool> {
        Ok(self
            .changes(resource, id)
            .await?
            .is_some_and(|changes| !changes.is_empty()))
    }
}

/// Runs the inject hooks and merges already-validated records into `collection`.
///
/// Saved records also get a last-saved stamp. Either way the merged state becomes the
/// baseline for change tracking.
pub(crate) fn inject_records(
    definition: &ResourceDefinition,
    collection: &mut ResourceCollection,
    records: Vec<(RecordId, Record)>,
    clock: &Clock,
    saved: bool,
) -> Vec<Record> {
    records
        .into_iter()
        .map(|(id, mut record)| {
            definition.hooks.before_inject(definition, &mut record);

            let id = record_id(&record, &definition.id_attribute).unwrap_or(id);
            let stamp = clock.tick();
            let stored = collection.merge(id.clone(), record, stamp).clone();

            if saved {
                collection.mark_saved(&id, stamp);
            } else {
                collection.snapshot(&id);
            }

            definition.hooks.after_inject(definition, &stored);
            stored
        })
        .collect()
}
