//! Lifecycle hooks invoked around record materialization.
//!
//! Every resource carries an `Arc<dyn LifecycleHooks>`. All methods have pass-through
//! defaults, so implementors override only the points they care about.
//!
//! Call order for a cached collection fetch:
//!
//! 1. [`LifecycleHooks::deserialize`] once over the whole backend response
//! 2. for each record: [`LifecycleHooks::before_inject`], merge into the store,
//!    [`LifecycleHooks::after_inject`]
//!
//! [`LifecycleHooks::serialize`] runs on outgoing payloads of `create`, `update` and `save`.

use serde_json::Value;
use std::fmt::Debug;

use crate::{record::Record, resource::ResourceDefinition};

pub trait LifecycleHooks: Send + Sync + Debug {
    /// Transforms a payload before it is handed to the adapter.
    fn serialize(&self, _resource: &ResourceDefinition, data: Value) -> Value {
        data
    }

    /// Transforms a raw adapter response before it is validated and injected.
    fn deserialize(&self, _resource: &ResourceDefinition, data: Value) -> Value {
        data
    }

    /// Called with each record right before it is merged into the store.
    fn before_inject(&self, _resource: &ResourceDefinition, _record: &mut Record) {}

    /// Called with the stored state of each record right after it was merged.
    fn after_inject(&self, _resource: &ResourceDefinition, _record: &Record) {}
}

/// Hooks that leave every payload untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl LifecycleHooks for NoopHooks {}
