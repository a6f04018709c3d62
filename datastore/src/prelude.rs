//! Convenient re-exports of commonly used types from datastore.
//!
//! ```ignore
//! use datastore::prelude::*;
//! ```

pub use datastore_core::{
    adapter::{Adapter, AdapterBuilder},
    collection::Changes,
    config::{AdapterOptions, DataStoreConfig, FindAllOptions, FindOptions, SaveOptions},
    error::{AdapterError, DataStoreError, DataStoreResult},
    hooks::{LifecycleHooks, NoopHooks},
    id::RecordId,
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, QuerySignature, QueryVisitor, Sort, SortDirection},
    record::{Model, ModelExt, Record},
    resource::{ResourceDefinition, ResourceDefinitionBuilder},
    store::DataStore,
    typed::TypedResource,
};
