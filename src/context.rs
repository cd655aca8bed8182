// Copyright © 2024 ModFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Configuration Context
//!
//! State shared by every module's `configure` step in one pipeline run:
//! the service registry, the lazily bound settings, an ordered scratch
//! map and the audit trail.
//!
//! A context from a failed run is partially configured and should be
//! discarded.

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::audit::{AuditTrail, ConfigureAction};
use crate::core::error::{ModFlowError, Result};
use crate::services::{ServiceCollection, ServiceRegistry, ServiceRegistryExt};
use crate::settings::Settings;
use crate::Module;

/// Shared state handed to each module's `configure` step.
#[derive(Debug)]
pub struct ConfigurationContext {
    services: Box<dyn ServiceRegistry>,
    configuration: OnceCell<Arc<Settings>>,
    items: BTreeMap<String, JsonValue>,
    audit: AuditTrail,
}

impl Default for ConfigurationContext {
    fn default() -> Self {
        Self::new(ServiceCollection::new())
    }
}

impl ConfigurationContext {
    /// Creates a context around `services`.
    pub fn new<R: ServiceRegistry + 'static>(services: R) -> Self {
        Self::from_boxed(Box::new(services))
    }

    /// Creates a context around an already boxed registry.
    pub fn from_boxed(services: Box<dyn ServiceRegistry>) -> Self {
        Self {
            services,
            configuration: OnceCell::new(),
            items: BTreeMap::new(),
            audit: AuditTrail::default(),
        }
    }

    /// The service registry.
    pub fn services(&self) -> &dyn ServiceRegistry {
        self.services.as_ref()
    }

    /// The service registry, for registration.
    pub fn services_mut(&mut self) -> &mut dyn ServiceRegistry {
        self.services.as_mut()
    }

    /// The configuration source, bound from the registry on first use and
    /// cached for the rest of the run.
    ///
    /// # Errors
    ///
    /// Returns [`ModFlowError::ConfigurationSourceMissing`] if no
    /// [`Settings`] are registered yet.
    pub fn configuration(&self) -> Result<Arc<Settings>> {
        if let Some(settings) = self.configuration.get() {
            return Ok(settings.clone());
        }
        let settings = self
            .services
            .get_configuration()
            .ok_or(ModFlowError::ConfigurationSourceMissing)?;
        Ok(self.configuration.get_or_init(|| settings).clone())
    }

    /// Returns the scratch item stored under `key`.
    pub fn item(&self, key: &str) -> Option<&JsonValue> {
        self.items.get(key)
    }

    /// Deserializes the scratch item stored under `key`.
    pub fn item_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.items
            .get(key)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|e| {
                    ModFlowError::internal_error(format!(
                        "Invalid context item `{}`: {}",
                        key, e
                    ))
                })
            })
            .transpose()
    }

    /// Stores a scratch item, returning the previous value.
    pub fn set_item<K, V>(&mut self, key: K, value: V) -> Option<JsonValue>
    where
        K: Into<String>,
        V: Into<JsonValue>,
    {
        self.items.insert(key.into(), value.into())
    }

    /// Removes a scratch item.
    pub fn remove_item(&mut self, key: &str) -> Option<JsonValue> {
        self.items.remove(key)
    }

    /// All scratch items, ordered by key.
    pub fn items(&self) -> &BTreeMap<String, JsonValue> {
        &self.items
    }

    /// Number of scratch items.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// The audit trail of configured modules.
    pub fn configures(&self) -> &AuditTrail {
        &self.audit
    }

    pub(crate) fn record_configured(
        &mut self,
        module: &dyn Module,
    ) -> &ConfigureAction {
        self.audit.record(module)
    }

    /// Splits the context into registry, scratch items and audit trail.
    pub fn into_parts(
        self,
    ) -> (Box<dyn ServiceRegistry>, BTreeMap<String, JsonValue>, AuditTrail)
    {
        (self.services, self.items, self.audit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleDescriptor;
    use serde_json::json;

    #[test]
    fn test_configuration_binds_lazily_once() {
        let mut context = ConfigurationContext::default();
        assert!(matches!(
            context.configuration(),
            Err(ModFlowError::ConfigurationSourceMissing)
        ));

        let settings = Settings::from_toml_str("name = 'first'").unwrap();
        context.services_mut().add_singleton(settings);
        let bound = context.configuration().unwrap();
        assert_eq!(bound.get_str("name"), Some("first"));

        let replaced = Settings::from_toml_str("name = 'second'").unwrap();
        _ = context.services_mut().replace_configuration(replaced);
        let still_bound = context.configuration().unwrap();
        assert!(Arc::ptr_eq(&bound, &still_bound));
    }

    #[test]
    fn test_items_round_trip() {
        let mut context = ConfigurationContext::default();
        assert!(context.set_item("retries", 3).is_none());
        assert_eq!(context.set_item("retries", 5), Some(json!(3)));
        _ = context.set_item("alpha", json!({"enabled": true}));

        assert_eq!(context.item_as::<u32>("retries").unwrap(), Some(5));
        assert_eq!(context.item_as::<u32>("missing").unwrap(), None);
        assert!(context.item_as::<u32>("alpha").is_err());

        let keys: Vec<&str> = context.items().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["alpha", "retries"]);
        assert_eq!(context.item_count(), 2);

        assert_eq!(context.remove_item("alpha"), Some(json!({"enabled": true})));
        assert!(context.item("alpha").is_none());
    }

    #[test]
    fn test_record_and_into_parts() {
        let mut context = ConfigurationContext::default();
        let module = ModuleDescriptor::builder("common").name("Common").build();
        let action = context.record_configured(&module).clone();
        assert_eq!(action.order, 1);
        assert_eq!(context.configures().len(), 1);

        let (services, items, audit) = context.into_parts();
        assert!(services.is_empty());
        assert!(items.is_empty());
        assert_eq!(audit.actions()[0], action);
    }
}
