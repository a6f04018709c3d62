//! Typed access to a resource.
//!
//! [`TypedResource`] wraps the JSON-level [`DataStore`] operations and converts records
//! to and from a [`Model`] type.

use serde_json::Value;
use std::marker::PhantomData;

use crate::{
    config::{FindAllOptions, FindOptions, SaveOptions},
    error::DataStoreResult,
    id::RecordId,
    record::{Model, ModelExt, Record},
    store::DataStore,
};

/// A view of the store bound to the resource of model type `M`.
#[derive(Debug)]
pub struct TypedResource<'a, M: Model> {
    store: &'a DataStore,
    _marker: PhantomData<M>,
}

impl<'a, M: Model> TypedResource<'a, M> {
    pub(crate) fn new(store: &'a DataStore) -> Self {
        Self { store, _marker: PhantomData }
    }

    /// Returns the name of the underlying resource.
    pub fn name(&self) -> &'static str {
        M::resource_name()
    }

    /// Fetches the models matching a query descriptor. See [`DataStore::find_all`].
    pub async fn find_all(&self, params: Value, options: FindAllOptions) -> DataStoreResult<Vec<M>> {
        into_models(self.store.find_all(M::resource_name(), params, options).await?)
    }

    pub async fn find(&self, id: impl Into<RecordId>, options: FindOptions) -> DataStoreResult<M> {
        M::from_record(self.store.find(M::resource_name(), id, options).await?)
    }

    /// Evaluates a query descriptor against the cached models.
    pub async fn filter(&self, params: Value) -> DataStoreResult<Vec<M>> {
        into_models(self.store.filter(M::resource_name(), params).await?)
    }

    pub async fn get(&self, id: impl Into<RecordId>) -> DataStoreResult<Option<M>> {
        self.store
            .get(M::resource_name(), id)
            .await?
            .map(M::from_record)
            .transpose()
    }

    /// Merges `model` into the cache and returns the stored state.
    pub async fn inject(&self, model: &M) -> DataStoreResult<M> {
        let mut injected = into_models(self.store.inject(M::resource_name(), model.to_json()?).await?)?;

        Ok(injected.pop().unwrap_or_else(|| model.clone()))
    }

    pub async fn create(&self, model: &M, options: SaveOptions) -> DataStoreResult<M> {
        M::from_record(self.store.create(M::resource_name(), model.to_json()?, options).await?)
    }
}

fn into_models<M: Model>(records: Vec<Record>) -> DataStoreResult<Vec<M>> {
    records.into_iter().map(M::from_record).collect()
}
