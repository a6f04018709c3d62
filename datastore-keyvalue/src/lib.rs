//! Key-value persistence adapter for datastore.
//!
//! This crate provides an [`Adapter`](datastore_core::adapter::Adapter) that keeps one JSON
//! item per record in a string key-value store. It suits offline caches, tests, and
//! backends that only address records by key.
//!
//! # Quick Start
//!
//! ```ignore
//! use datastore::{prelude::*, keyvalue::{KeyValueAdapter, InMemoryStorage}};
//!
//! let store = DataStore::new();
//! store.register_adapter("kv", KeyValueAdapter::new(InMemoryStorage::new()), true).await;
//! store.define_resource(ResourceDefinition::builder("user")).await?;
//!
//! store.create("user", json!({ "id": 1, "name": "john" }), SaveOptions::new()).await?;
//! let user = store.find("user", 1, FindOptions::new().bypass_cache(true)).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as datastore_keyvalue;

pub mod adapter;
pub mod storage;

pub use adapter::{KeyValueAdapter, KeyValueAdapterBuilder, make_path};
pub use storage::{InMemoryStorage, KeyValueStorage};
