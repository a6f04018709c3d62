//! Remote fetches with request coalescing.
//!
//! `find_all` and `find` put an adapter request in flight at most once per query signature
//! (or record id). A second caller asking for the same thing while the first request is
//! pending awaits the same shared future and receives the identical outcome.
//!
//! A fetch moves through these steps:
//!
//! 1. If an identical request is pending, join it. This happens even with `bypassCache`.
//! 2. Otherwise, unless `bypassCache` is set, answer from the cache when the query has
//!    completed before (or the record is cached).
//! 3. Otherwise call the adapter. When it answers, the pending marker is removed in the
//!    same critical section that runs `deserialize`, validates ids, injects the records
//!    and marks the query completed. Adapter errors reach every waiting caller as-is.

use futures::future::FutureExt;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::{
    adapter::Adapter,
    config::{AdapterOptions, FindAllOptions, FindOptions},
    error::{DataStoreError, DataStoreResult},
    id::RecordId,
    query::{Query, QuerySignature, params_from_value},
    record::{Record, into_records},
    store::{DataStore, ResourceEntry, StoreInner, inject_records},
};

impl DataStore {
    /// Fetches the records matching a query descriptor.
    ///
    /// `params` must be a JSON object or `null`. Repeated calls with an equivalent
    /// descriptor are answered from the cache once the first one completes, unless
    /// `bypass_cache` is set.
    ///
    /// # Errors
    ///
    /// - [`DataStoreError::NonexistentResource`] if `resource` is not registered.
    /// - [`DataStoreError::IllegalArgument`] if `params` is not an object or is not a
    ///   valid query (checked before the adapter is called), or if any returned record
    ///   lacks the id attribute. Nothing is injected in that case.
    /// - Whatever the adapter failed with, unmodified.
    pub async fn find_all(
        &self,
        resource: &str,
        params: Value,
        options: FindAllOptions,
    ) -> DataStoreResult<Vec<Record>> {
        let entry = self.resource(resource).await?;
        let params = params_from_value(params)?;
        let query = Query::from_params(&params)?;
        let signature = QuerySignature::of(&params);
        let config = &self.inner.config;
        let adapter = self.adapter_for(&entry.definition, options.adapter.as_deref()).await?;

        let fetch = {
            let mut state = entry.state.write().await;

            if let Some(pending) = state.pending_queries.get(&signature) {
                debug!(resource, signature = signature.as_str(), "joining pending find_all");
                pending.clone()
            } else {
                if options.resolve_bypass_cache(config) {
                    state.collection.forget_query(&signature);
                } else if state.collection.is_query_completed(&signature) {
                    debug!(resource, signature = signature.as_str(), "find_all served from cache");
                    return Ok(state.collection.filter(&query));
                }

                let fetch = fetch_all(
                    Arc::clone(&self.inner),
                    Arc::clone(&entry),
                    adapter,
                    params,
                    signature.clone(),
                    options.resolve_cache_response(config),
                    options.adapter_options,
                )
                .boxed()
                .shared();

                state.pending_queries.insert(signature, fetch.clone());
                fetch
            }
        };

        fetch.await
    }

    /// Fetches a single record by id.
    ///
    /// A cached record is returned without calling the adapter unless `bypass_cache` is
    /// set. Concurrent fetches of the same id share one adapter request.
    pub async fn find(&self, resource: &str, id: impl Into<RecordId>, options: FindOptions) -> DataStoreResult<Record> {
        let entry = self.resource(resource).await?;
        let id = id.into();
        let config = &self.inner.config;
        let adapter = self.adapter_for(&entry.definition, options.adapter.as_deref()).await?;

        let fetch = {
            let mut state = entry.state.write().await;

            if let Some(pending) = state.pending_finds.get(&id) {
                debug!(resource, %id, "joining pending find");
                pending.clone()
            } else {
                if !options.resolve_bypass_cache(config) {
                    if let Some(record) = state.collection.get(&id) {
                        debug!(resource, %id, "find served from cache");
                        return Ok(record.clone());
                    }
                }

                let fetch = fetch_one(
                    Arc::clone(&self.inner),
                    Arc::clone(&entry),
                    adapter,
                    id.clone(),
                    options.resolve_cache_response(config),
                    options.adapter_options,
                )
                .boxed()
                .shared();

                state.pending_finds.insert(id, fetch.clone());
                fetch
            }
        };

        fetch.await
    }
}

async fn fetch_all(
    store: Arc<StoreInner>,
    entry: Arc<ResourceEntry>,
    adapter: Arc<dyn Adapter>,
    params: Map<String, Value>,
    signature: QuerySignature,
    cache_response: bool,
    adapter_options: AdapterOptions,
) -> DataStoreResult<Vec<Record>> {
    let definition = &entry.definition;

    debug!(resource = %definition.name, signature = signature.as_str(), "calling adapter find_all");
    let response = adapter.find_all(definition, &params, &adapter_options).await;

    let mut state = entry.state.write().await;
    state.pending_queries.remove(&signature);

    let response = response.inspect_err(|err| {
        warn!(resource = %definition.name, signature = signature.as_str(), error = %err, "find_all failed");
    })?;

    let data = definition.hooks.deserialize(definition, response);
    let records = into_records(data, &definition.id_attribute).inspect_err(|err| {
        error!(resource = %definition.name, error = %err, "rejected find_all response");
    })?;

    if !cache_response {
        return Ok(records.into_iter().map(|(_, record)| record).collect());
    }

    let injected = inject_records(definition, &mut state.collection, records, &store.clock, true);
    state.collection.complete_query(signature, store.clock.tick());

    Ok(injected)
}

async fn fetch_one(
    store: Arc<StoreInner>,
    entry: Arc<ResourceEntry>,
    adapter: Arc<dyn Adapter>,
    id: RecordId,
    cache_response: bool,
    adapter_options: AdapterOptions,
) -> DataStoreResult<Record> {
    let definition = &entry.definition;

    debug!(resource = %definition.name, %id, "calling adapter find");
    let response = adapter.find(definition, &id, &adapter_options).await;

    let mut state = entry.state.write().await;
    state.pending_finds.remove(&id);

    let response = response.inspect_err(|err| {
        warn!(resource = %definition.name, %id, error = %err, "find failed");
    })?;

    let data = definition.hooks.deserialize(definition, response);
    if !data.is_object() {
        return Err(DataStoreError::illegal_argument(format!(
            "{}: find must resolve to a single record!",
            definition.name
        )));
    }

    let records = into_records(data, &definition.id_attribute).inspect_err(|err| {
        error!(resource = %definition.name, %id, error = %err, "rejected find response");
    })?;

    let record = if cache_response {
        inject_records(definition, &mut state.collection, records, &store.clock, true).pop()
    } else {
        records.into_iter().map(|(_, record)| record).next()
    };

    record.ok_or_else(|| DataStoreError::NotFound(definition.name.clone(), id.to_string()))
}
