// Copyright © 2024 ModFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Module Declarations
//!
//! Identifiers, descriptors and the explicit, host-supplied catalog of
//! modules known to the process.
//!
//! ```rust
//! use modflow::module::{ModuleDescriptor, StaticCatalog};
//!
//! let domain = ModuleDescriptor::builder("domain")
//!     .name("Domain")
//!     .depends_on(["common"])
//!     .build();
//! let common = ModuleDescriptor::builder("common").name("Common").build();
//!
//! let mut catalog = StaticCatalog::new();
//! catalog.register(domain).unwrap();
//! catalog.register(common).unwrap();
//!
//! assert_eq!(catalog.len(), 2);
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::context::ConfigurationContext;
use crate::core::error::{ConfigureResult, ModFlowError, Result};
use crate::{Module, ModuleCatalog};

/// Stable, comparable identifier of a module.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Creates a new identifier.
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the identifier is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&ModuleId> for ModuleId {
    fn from(id: &ModuleId) -> Self {
        id.clone()
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Boxed configuration callback stored by a [`ModuleDescriptor`].
pub type ConfigureFn = Box<
    dyn Fn(&mut ConfigurationContext) -> ConfigureResult + Send + Sync,
>;

/// A module declared as a value: identifier, display name, ordered
/// dependencies and an optional configuration callback.
///
/// Descriptors are immutable once built. A descriptor without a callback
/// configures nothing but still takes part in ordering and auditing.
pub struct ModuleDescriptor {
    id: ModuleId,
    name: String,
    dependencies: Vec<ModuleId>,
    configure: Option<ConfigureFn>,
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("has_configure", &self.configure.is_some())
            .finish()
    }
}

impl ModuleDescriptor {
    /// Starts building a descriptor for `id`.
    pub fn builder<I: Into<ModuleId>>(id: I) -> ModuleDescriptorBuilder {
        ModuleDescriptorBuilder::new(id.into())
    }

    /// Creates a descriptor with no configuration callback.
    pub fn new<I, N, D, T>(id: I, name: N, dependencies: D) -> Self
    where
        I: Into<ModuleId>,
        N: Into<String>,
        D: IntoIterator<Item = T>,
        T: Into<ModuleId>,
    {
        Self::builder(id).name(name).depends_on(dependencies).build()
    }
}

impl Module for ModuleDescriptor {
    fn id(&self) -> &ModuleId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[ModuleId] {
        &self.dependencies
    }

    fn configure(
        &self,
        context: &mut ConfigurationContext,
    ) -> ConfigureResult {
        match &self.configure {
            Some(configure) => configure(context),
            None => Ok(()),
        }
    }
}

/// Builder for [`ModuleDescriptor`].
pub struct ModuleDescriptorBuilder {
    id: ModuleId,
    name: Option<String>,
    dependencies: Vec<ModuleId>,
    configure: Option<ConfigureFn>,
}

impl fmt::Debug for ModuleDescriptorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptorBuilder")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

impl ModuleDescriptorBuilder {
    fn new(id: ModuleId) -> Self {
        Self {
            id,
            name: None,
            dependencies: Vec::new(),
            configure: None,
        }
    }

    /// Sets the display name. Defaults to the identifier.
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Appends dependencies, keeping declaration order.
    pub fn depends_on<D, T>(mut self, dependencies: D) -> Self
    where
        D: IntoIterator<Item = T>,
        T: Into<ModuleId>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Sets the configuration callback.
    pub fn configure<F>(mut self, configure: F) -> Self
    where
        F: Fn(&mut ConfigurationContext) -> ConfigureResult
            + Send
            + Sync
            + 'static,
    {
        self.configure = Some(Box::new(configure));
        self
    }

    /// Finishes the descriptor.
    pub fn build(self) -> ModuleDescriptor {
        let name = self
            .name
            .unwrap_or_else(|| self.id.as_str().to_string());
        ModuleDescriptor {
            id: self.id,
            name,
            dependencies: self.dependencies,
            configure: self.configure,
        }
    }
}

/// Catalog built from an explicit list of modules supplied by the host.
///
/// Besides descriptors, a catalog may declare identifiers that are known
/// to the process without a descriptor. They take part in the
/// reachability check but cannot be resolved.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    order: Vec<ModuleId>,
    modules: HashMap<ModuleId, Arc<dyn Module>>,
    declared: HashSet<ModuleId>,
}

impl StaticCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from shared modules.
    pub fn from_modules<I>(modules: I) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<dyn Module>>,
    {
        let mut catalog = Self::new();
        for module in modules {
            catalog.register_shared(module)?;
        }
        Ok(catalog)
    }

    /// Registers a module, failing if its identifier is already known.
    pub fn register<M: Module + 'static>(&mut self, module: M) -> Result<()> {
        self.register_shared(Arc::new(module))
    }

    /// Registers an already shared module.
    pub fn register_shared(&mut self, module: Arc<dyn Module>) -> Result<()> {
        let id = module.id().clone();
        if self.is_known(&id) {
            return Err(ModFlowError::DuplicateModule { module: id });
        }
        self.order.push(id.clone());
        _ = self.modules.insert(id, module);
        Ok(())
    }

    /// Chainable form of [`StaticCatalog::register`].
    pub fn with_module<M: Module + 'static>(mut self, module: M) -> Result<Self> {
        self.register(module)?;
        Ok(self)
    }

    /// Declares an identifier known to the process without a descriptor.
    pub fn declare<I: Into<ModuleId>>(&mut self, id: I) -> Result<()> {
        let id = id.into();
        if self.is_known(&id) {
            return Err(ModFlowError::DuplicateModule { module: id });
        }
        self.order.push(id.clone());
        _ = self.declared.insert(id);
        Ok(())
    }

    /// Returns `true` if `id` was registered or declared.
    pub fn is_known(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id) || self.declared.contains(id)
    }

    /// Number of known identifiers.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if nothing is known.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl ModuleCatalog for StaticCatalog {
    fn lookup(&self, id: &ModuleId) -> Option<Arc<dyn Module>> {
        self.modules.get(id).cloned()
    }

    fn enumerate(&self) -> Vec<ModuleId> {
        self.order.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_defaults_name_to_id() {
        let module = ModuleDescriptor::builder("common").build();
        assert_eq!(module.name(), "common");
        assert!(module.dependencies().is_empty());
    }

    #[test]
    fn test_dependencies_keep_declaration_order() {
        let module = ModuleDescriptor::builder("b")
            .depends_on(["c", "d"])
            .depends_on(vec![ModuleId::new("f")])
            .build();
        let deps: Vec<&str> =
            module.dependencies().iter().map(ModuleId::as_str).collect();
        assert_eq!(deps, vec!["c", "d", "f"]);
    }

    #[test]
    fn test_configure_runs_callback() {
        let module = ModuleDescriptor::builder("a")
            .configure(|ctx| {
                _ = ctx.set_item("a", json!(true));
                Ok(())
            })
            .build();
        let mut context = ConfigurationContext::default();
        module.configure(&mut context).unwrap();
        assert_eq!(context.item("a"), Some(&json!(true)));
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let mut catalog = StaticCatalog::new();
        catalog.register(ModuleDescriptor::new("a", "A", ["b"])).unwrap();
        let err = catalog
            .register(ModuleDescriptor::new("a", "Other", Vec::<ModuleId>::new()))
            .unwrap_err();
        assert!(matches!(err, ModFlowError::DuplicateModule { .. }));

        let err = catalog.declare("a").unwrap_err();
        assert!(matches!(err, ModFlowError::DuplicateModule { .. }));
    }

    #[test]
    fn test_catalog_enumerates_in_registration_order() {
        let mut catalog = StaticCatalog::new();
        catalog.register(ModuleDescriptor::builder("z").build()).unwrap();
        catalog.declare("legacy").unwrap();
        catalog.register(ModuleDescriptor::builder("a").build()).unwrap();

        assert_eq!(
            catalog.enumerate(),
            vec![
                ModuleId::new("z"),
                ModuleId::new("legacy"),
                ModuleId::new("a")
            ]
        );
        assert!(catalog.lookup(&ModuleId::new("legacy")).is_none());
        assert!(catalog.lookup(&ModuleId::new("a")).is_some());
    }

    #[test]
    fn test_large_catalog_tracks_every_identifier() {
        let mut catalog = StaticCatalog::new();
        for index in 0..20_000 {
            if index % 2 == 0 {
                catalog
                    .register(ModuleDescriptor::builder(format!("m{}", index)).build())
                    .unwrap();
            } else {
                catalog.declare(format!("m{}", index)).unwrap();
            }
        }

        assert_eq!(catalog.len(), 20_000);
        assert!(catalog.is_known(&ModuleId::new("m0")));
        assert!(catalog.is_known(&ModuleId::new("m19999")));
        assert!(!catalog.is_known(&ModuleId::new("m20000")));
        assert!(matches!(
            catalog.declare("m19998").unwrap_err(),
            ModFlowError::DuplicateModule { .. }
        ));
    }

    #[test]
    fn test_module_id_serializes_as_string() {
        let id = ModuleId::new("domain");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("domain"));
        assert_eq!(id.to_string(), "domain");
        assert!(ModuleId::new("  ").is_blank());
    }
}
