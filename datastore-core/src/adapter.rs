//! Persistence adapter abstraction for the data store.
//!
//! An adapter is the store's only route to the outside world. It turns CRUD requests for a
//! resource into whatever the backend speaks (HTTP, a key-value store, ...) and hands back
//! raw JSON. Adapters never touch the store's cache; validation, lifecycle hooks and
//! injection all happen in the store once an adapter call returns.
//!
//! # Traits
//!
//! - [`Adapter`]: the core trait for persistence adapters
//! - [`AdapterBuilder`]: factory trait for creating adapter instances
//!
//! # Error Handling
//!
//! Backends report their own failures as [`DataStoreError::Adapter`](crate::error::DataStoreError::Adapter)
//! carrying the raw payload. The store passes these through to callers unmodified.
//! Operations an adapter cannot support should fail with
//! [`DataStoreError::Unsupported`](crate::error::DataStoreError::Unsupported).

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::{fmt::Debug, sync::Arc};

use crate::{
    config::AdapterOptions,
    error::DataStoreResult,
    id::RecordId,
    resource::ResourceDefinition,
};

/// Abstract interface for persistence adapters.
///
/// All implementations must be thread-safe; a single adapter instance serves every
/// resource that uses it, possibly from many tasks at once.
#[async_trait]
pub trait Adapter: Send + Sync + Debug {
    /// Retrieves a single record by id.
    async fn find(
        &self,
        resource: &ResourceDefinition,
        id: &RecordId,
        options: &AdapterOptions,
    ) -> DataStoreResult<Value>;

    /// Retrieves the records matching `params`. The response is expected to be an array.
    async fn find_all(
        &self,
        resource: &ResourceDefinition,
        params: &Map<String, Value>,
        options: &AdapterOptions,
    ) -> DataStoreResult<Value>;

    /// Persists a new record and returns the backend's view of it.
    async fn create(
        &self,
        resource: &ResourceDefinition,
        attrs: Value,
        options: &AdapterOptions,
    ) -> DataStoreResult<Value>;

    /// Updates an existing record and returns the backend's view of it.
    async fn update(
        &self,
        resource: &ResourceDefinition,
        id: &RecordId,
        attrs: Value,
        options: &AdapterOptions,
    ) -> DataStoreResult<Value>;

    /// Applies `attrs` to every record matching `params`.
    async fn update_all(
        &self,
        resource: &ResourceDefinition,
        attrs: Value,
        params: &Map<String, Value>,
        options: &AdapterOptions,
    ) -> DataStoreResult<Value>;

    /// Deletes a single record.
    async fn destroy(
        &self,
        resource: &ResourceDefinition,
        id: &RecordId,
        options: &AdapterOptions,
    ) -> DataStoreResult<Value>;

    /// Deletes every record matching `params`.
    async fn destroy_all(
        &self,
        resource: &ResourceDefinition,
        params: &Map<String, Value>,
        options: &AdapterOptions,
    ) -> DataStoreResult<Value>;
}

#[async_trait]
impl<A> Adapter for Arc<A>
where
    A: Adapter + ?Sized,
{
    async fn find(
        &self,
        resource: &ResourceDefinition,
        id: &RecordId,
        options: &AdapterOptions,
    ) -> DataStoreResult<Value> {
        (**self).find(resource, id, options).await
    }

    async fn find_all(
        &self,
        resource: &ResourceDefinition,
        params: &Map<String, Value>,
        options: &AdapterOptions,
    ) -> DataStoreResult<Value> {
        (**self).find_all(resource, params, options).await
    }

    async fn create(
        &self,
        resource: &ResourceDefinition,
        attrs: Value,
        options: &AdapterOptions,
    ) -> DataStoreResult<Value> {
        (**self).create(resource, attrs, options).await
    }

    async fn update(
        &self,
        resource: &ResourceDefinition,
        id: &RecordId,
        attrs: Value,
        options: &AdapterOptions,
    ) -> DataStoreResult<Value> {
        (**self).update(resource, id, attrs, options).await
    }

    async fn update_all(
        &self,
        resource: &ResourceDefinition,
        attrs: Value,
        params: &Map<String, Value>,
        options: &AdapterOptions,
    ) -> DataStoreResult<Value> {
        (**self).update_all(resource, attrs, params, options).await
    }

    async fn destroy(
        &self,
        resource: &ResourceDefinition,
        id: &RecordId,
        options: &AdapterOptions,
    ) -> DataStoreResult<Value> {
        (**self).destroy(resource, id, options).await
    }

    async fn destroy_all(
        &self,
        resource: &ResourceDefinition,
        params: &Map<String, Value>,
        options: &AdapterOptions,
    ) -> DataStoreResult<Value> {
        (**self).destroy_all(resource, params, options).await
    }
}

/// Factory trait for constructing adapter instances.
///
/// Builders let adapters perform async setup (opening connections, loading state)
/// before they are registered with a store.
#[async_trait]
pub trait AdapterBuilder {
    /// The adapter type this builder produces.
    type Adapter: Adapter;

    /// Builds and returns a new adapter instance.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    async fn build(self) -> DataStoreResult<Self::Adapter>;
}
