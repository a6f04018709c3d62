//! Store-wide configuration and per-call options.
//!
//! [`DataStoreConfig`] holds the defaults every resource and every call falls back on.
//! It deserializes from camelCase JSON, so it can be loaded from the same settings file
//! the rest of an application uses:
//!
//! ```ignore
//! let config: DataStoreConfig = serde_json::from_str(r#"{ "baseUrl": "http://api.local" }"#)?;
//! ```
//!
//! The option structs mirror the recognized per-call options. Their `Option<bool>`
//! fields stay `None` until resolved against the config.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DataStoreError, DataStoreResult};

/// Defaults applied to resources and calls that don't override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataStoreConfig {
    /// Name of the identifier field on records.
    pub id_attribute: String,
    /// Base location handed to adapters.
    pub base_url: String,
    /// Adapter used when neither the resource nor the call names one.
    pub default_adapter: Option<String>,
    /// Whether fetched records are merged into the store.
    pub cache_response: bool,
    /// Whether fetches skip completed queries and cached records.
    pub bypass_cache: bool,
}

impl Default for DataStoreConfig {
    fn default() -> Self {
        Self {
            id_attribute: "id".to_string(),
            base_url: String::new(),
            default_adapter: None,
            cache_response: true,
            bypass_cache: false,
        }
    }
}

impl DataStoreConfig {
    pub fn with_id_attribute(mut self, id_attribute: impl Into<String>) -> Self {
        self.id_attribute = id_attribute.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_default_adapter(mut self, adapter: impl Into<String>) -> Self {
        self.default_adapter = Some(adapter.into());
        self
    }

    pub fn with_cache_response(mut self, cache_response: bool) -> Self {
        self.cache_response = cache_response;
        self
    }

    pub fn with_bypass_cache(mut self, bypass_cache: bool) -> Self {
        self.bypass_cache = bypass_cache;
        self
    }
}

/// Options understood by adapters. Passed along with every adapter call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdapterOptions {
    /// Overrides the resource's base location for this call.
    pub base_url: Option<String>,
}

/// Options for collection and single-record fetches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FindOptions {
    pub cache_response: Option<bool>,
    pub bypass_cache: Option<bool>,
    /// Name of the adapter to use instead of the resource default.
    pub adapter: Option<String>,
    #[serde(flatten)]
    pub adapter_options: AdapterOptions,
}

/// `find_all` takes the same options as `find`.
pub type FindAllOptions = FindOptions;

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from raw JSON. `null` means "no options".
    ///
    /// # Errors
    ///
    /// Returns [`DataStoreError::IllegalArgument`] when `value` is not an object.
    pub fn from_value(value: Value) -> DataStoreResult<Self> {
        parse_options(value)
    }

    pub fn cache_response(mut self, cache_response: bool) -> Self {
        self.cache_response = Some(cache_response);
        self
    }

    pub fn bypass_cache(mut self, bypass_cache: bool) -> Self {
        self.bypass_cache = Some(bypass_cache);
        self
    }

    pub fn adapter(mut self, adapter: impl Into<String>) -> Self {
        self.adapter = Some(adapter.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.adapter_options.base_url = Some(base_url.into());
        self
    }

    pub(crate) fn resolve_cache_response(&self, config: &DataStoreConfig) -> bool {
        self.cache_response.unwrap_or(config.cache_response)
    }

    pub(crate) fn resolve_bypass_cache(&self, config: &DataStoreConfig) -> bool {
        self.bypass_cache.unwrap_or(config.bypass_cache)
    }
}

/// Options for `create`, `update`, `save` and `destroy`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SaveOptions {
    pub cache_response: Option<bool>,
    /// `save` only: send just the attributes that changed since the last save.
    pub changes_only: bool,
    pub adapter: Option<String>,
    #[serde(flatten)]
    pub adapter_options: AdapterOptions,
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from raw JSON. `null` means "no options".
    ///
    /// # Errors
    ///
    /// Returns [`DataStoreError::IllegalArgument`] when `value` is not an object.
    pub fn from_value(value: Value) -> DataStoreResult<Self> {
        parse_options(value)
    }

    pub fn cache_response(mut self, cache_response: bool) -> Self {
        self.cache_response = Some(cache_response);
        self
    }

    pub fn changes_only(mut self, changes_only: bool) -> Self {
        self.changes_only = changes_only;
        self
    }

    pub fn adapter(mut self, adapter: impl Into<String>) -> Self {
        self.adapter = Some(adapter.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.adapter_options.base_url = Some(base_url.into());
        self
    }

    pub(crate) fn resolve_cache_response(&self, config: &DataStoreConfig) -> bool {
        self.cache_response.unwrap_or(config.cache_response)
    }
}

fn parse_options<T>(value: Value) -> DataStoreResult<T>
where
    T: for<'de> Deserialize<'de> + Default,
{
    match value {
        Value::Null => Ok(T::default()),
        Value::Object(_) => Ok(serde_json::from_value(value)?),
        _ => Err(DataStoreError::illegal_argument("options: Must be an object!")),
    }
}
