//! Resource definitions.
//!
//! A resource is a named record type with an identifier field, an endpoint the adapters
//! address it by, and a set of lifecycle hooks. Definitions are built with
//! [`ResourceDefinition::builder`]; anything left unset is filled in from the
//! [`DataStoreConfig`] when the resource is registered with the store.
//!
//! ```ignore
//! let post = ResourceDefinition::builder("post")
//!     .endpoint("posts")
//!     .hooks(Arc::new(MyHooks));
//! store.define_resource(post).await?;
//! ```

use std::sync::Arc;

use crate::{
    config::DataStoreConfig,
    error::{DataStoreError, DataStoreResult},
    hooks::{LifecycleHooks, NoopHooks},
};

#[derive(Debug, Clone)]
pub struct ResourceDefinition {
    /// Unique name of the resource.
    pub name: String,
    /// Field holding each record's identifier.
    pub id_attribute: String,
    /// Path segment adapters use to address the resource.
    pub endpoint: String,
    /// Base location adapters prepend to the endpoint.
    pub base_url: String,
    /// Adapter used for this resource unless a call overrides it.
    pub default_adapter: Option<String>,
    pub hooks: Arc<dyn LifecycleHooks>,
}

impl ResourceDefinition {
    pub fn builder(name: impl Into<String>) -> ResourceDefinitionBuilder {
        ResourceDefinitionBuilder::new(name)
    }

    /// Base location for a call, honoring a per-call override.
    pub fn base_url_for<'a>(&'a self, override_url: Option<&'a str>) -> &'a str {
        override_url.unwrap_or(&self.base_url)
    }
}

/// Builder for [`ResourceDefinition`].
#[derive(Debug)]
pub struct ResourceDefinitionBuilder {
    name: String,
    id_attribute: Option<String>,
    endpoint: Option<String>,
    base_url: Option<String>,
    default_adapter: Option<String>,
    hooks: Option<Arc<dyn LifecycleHooks>>,
}

impl ResourceDefinitionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_attribute: None,
            endpoint: None,
            base_url: None,
            default_adapter: None,
            hooks: None,
        }
    }

    pub fn id_attribute(mut self, id_attribute: impl Into<String>) -> Self {
        self.id_attribute = Some(id_attribute.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn default_adapter(mut self, adapter: impl Into<String>) -> Self {
        self.default_adapter = Some(adapter.into());
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn LifecycleHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Builds the definition using the built-in defaults for unset values.
    pub fn build(self) -> ResourceDefinition {
        self.build_with(&DataStoreConfig::default())
    }

    /// Builds the definition, taking unset values from `config`.
    pub fn build_with(self, config: &DataStoreConfig) -> ResourceDefinition {
        ResourceDefinition {
            endpoint: self.endpoint.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            id_attribute: self.id_attribute.unwrap_or_else(|| config.id_attribute.clone()),
            base_url: self.base_url.unwrap_or_else(|| config.base_url.clone()),
            default_adapter: self.default_adapter.or_else(|| config.default_adapter.clone()),
            hooks: self.hooks.unwrap_or_else(|| Arc::new(NoopHooks)),
        }
    }

    /// Like [`build_with`](Self::build_with), but rejects empty names and id attributes.
    pub fn try_build_with(self, config: &DataStoreConfig) -> DataStoreResult<ResourceDefinition> {
        if self.name.is_empty() {
            return Err(DataStoreError::illegal_argument("name: Must be a non-empty string!"));
        }

        let definition = self.build_with(config);

        if definition.id_attribute.is_empty() {
            return Err(DataStoreError::illegal_argument("idAttribute: Must be a non-empty string!"));
        }

        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_values_come_from_config() {
        let config = DataStoreConfig::default()
            .with_base_url("http://test.local")
            .with_default_adapter("http");

        let definition = ResourceDefinition::builder("person").endpoint("users").build_with(&config);

        assert_eq!(definition.endpoint, "users");
        assert_eq!(definition.id_attribute, "id");
        assert_eq!(definition.base_url, "http://test.local");
        assert_eq!(definition.default_adapter.as_deref(), Some("http"));
    }

    #[test]
    fn endpoint_defaults_to_name() {
        let definition = ResourceDefinition::builder("comment").build();

        assert_eq!(definition.endpoint, "comment");
        assert_eq!(definition.base_url_for(None), "");
        assert_eq!(definition.base_url_for(Some("http://other")), "http://other");
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = ResourceDefinition::builder("")
            .try_build_with(&DataStoreConfig::default())
            .unwrap_err();

        assert!(matches!(err, DataStoreError::IllegalArgument(_)));
    }
}
