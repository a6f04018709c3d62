//! Main datastore crate: an in-memory cache for remote JSON resources.
//!
//! This crate is the primary entry point. It re-exports the core types from
//! `datastore-core` and provides access to the bundled adapters.
//!
//! # Features
//!
//! - **Resource registry** - Define resources with their own id attribute, endpoint and hooks
//! - **Coalesced fetches** - Concurrent identical `find_all`/`find` calls share one adapter request
//! - **Query caching** - Completed collection queries are answered locally until ejected or bypassed
//! - **Local querying** - `filter` evaluates `where`/`orderBy`/`limit`/`offset` descriptors in memory
//! - **Change tracking** - Last-modified and last-saved stamps, previous snapshots and diffs
//!
//! # Quick Start
//!
//! ```ignore
//! use datastore::{prelude::*, keyvalue::{KeyValueAdapter, InMemoryStorage}};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> DataStoreResult<()> {
//!     let store = DataStore::new();
//!     store.register_adapter("kv", KeyValueAdapter::new(InMemoryStorage::new()), true).await;
//!     store.define_resource(ResourceDefinition::builder("post").endpoint("posts")).await?;
//!
//!     store.create("post", json!({ "id": 5, "author": "John" }), SaveOptions::new()).await?;
//!
//!     let johns = store.filter("post", json!({ "where": { "author": "John" } })).await?;
//!     println!("Cached posts by John: {:?}", johns);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Typed Access
//!
//! Types implementing [`Model`](record::Model) get a typed view of their resource:
//!
//! ```ignore
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Post {
//!     pub id: i64,
//!     pub author: String,
//! }
//!
//! impl Model for Post {
//!     fn resource_name() -> &'static str { "post" }
//! }
//!
//! let posts: Vec<Post> = store
//!     .typed::<Post>()
//!     .find_all(json!({ "author": "John" }), FindAllOptions::new())
//!     .await?;
//! ```
//!
//! # Adapters
//!
//! - [`keyvalue`] - Per-record persistence in a string key-value store

pub mod prelude;

pub use datastore_core::{
    adapter, collection, config, error, evaluator, hooks, id, query, record, resource, store, typed,
};

// Re-export serde_json, records are JSON objects
pub use serde_json;

/// Key-value adapter implementations.
pub mod keyvalue {
    pub use datastore_keyvalue::{InMemoryStorage, KeyValueAdapter, KeyValueAdapterBuilder, KeyValueStorage, make_path};
}
