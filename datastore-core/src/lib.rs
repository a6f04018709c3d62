//! A client-side, in-memory data store for JSON resources.
//!
//! This crate is the core of the datastore project and provides:
//!
//! - **Records and ids** ([`record`], [`id`]) - Raw JSON records, typed models and identifiers
//! - **Resource definitions** ([`resource`], [`hooks`]) - Named record types with lifecycle hooks
//! - **Adapter abstraction** ([`adapter`]) - Traits for the backends records are fetched from
//! - **Query descriptors** ([`query`], [`evaluator`]) - Parsing, signatures and local evaluation
//! - **Collections** ([`collection`]) - The per-resource cache with timestamps and change tracking
//! - **Data store** ([`store`], [`fetch`], [`typed`]) - The store itself, with coalesced fetches
//! - **Configuration** ([`config`]) - Store defaults and per-call options
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use datastore_core::{store::DataStore, resource::ResourceDefinition, config::FindAllOptions};
//! use serde_json::json;
//!
//! let store = DataStore::new();
//! store.register_adapter("http", my_adapter, true).await;
//! store.define_resource(ResourceDefinition::builder("post").endpoint("posts")).await?;
//!
//! // Both calls share one adapter request.
//! let (a, b) = tokio::join!(
//!     store.find_all("post", json!({ "author": "Adam" }), FindAllOptions::new()),
//!     store.find_all("post", json!({ "author": "Adam" }), FindAllOptions::new()),
//! );
//! ```

#[allow(unused_extern_crates)]
extern crate self as datastore_core;

pub mod adapter;
pub mod collection;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod fetch;
pub mod hooks;
pub mod id;
pub mod query;
pub mod record;
pub mod resource;
pub mod store;
pub mod typed;
