// Copyright © 2024 ModFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Module Manifests
//!
//! A manifest declares modules in TOML so that a catalog can be built
//! without writing Rust:
//!
//! ```toml
//! [[module]]
//! id = "app"
//! name = "Application"
//! depends_on = ["domain"]
//! services = ["http"]
//!
//! [[module]]
//! id = "domain"
//!
//! [catalog]
//! extra = ["legacy"]
//! ```
//!
//! Each manifest module's configure step registers every listed service
//! as a keyed [`ManifestService`] and records `module:<id>` in the
//! context's scratch items. Identifiers under `[catalog] extra` are known
//! to the process without a descriptor.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::error::{ModFlowError, Result};
use crate::module::{ModuleDescriptor, ModuleId, StaticCatalog};
use crate::services::ServiceRegistryExt;

/// A service registered by a manifest module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestService {
    /// The module that registered the service.
    pub module: ModuleId,
    /// The service name, also used as the registry key.
    pub service: String,
}

/// A single `[[module]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntry {
    /// Module identifier.
    pub id: ModuleId,
    /// Display name; defaults to the identifier.
    #[serde(default)]
    pub name: Option<String>,
    /// Dependencies in declaration order.
    #[serde(default)]
    pub depends_on: Vec<ModuleId>,
    /// Services registered when the module is configured.
    #[serde(default)]
    pub services: Vec<String>,
}

/// The `[catalog]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSection {
    /// Identifiers known to the process without a descriptor.
    #[serde(default)]
    pub extra: Vec<ModuleId>,
}

/// A parsed module manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Declared modules, in file order.
    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleEntry>,
    /// Catalog-level settings.
    #[serde(default)]
    pub catalog: CatalogSection,
}

impl Manifest {
    /// Parses a manifest from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            ModFlowError::config_error(
                format!("Failed to parse manifest: {}", e),
                None,
            )
        })
    }

    /// Loads a manifest from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ModFlowError::io_error(path.to_path_buf(), e))?;
        toml::from_str(&content).map_err(|e| {
            ModFlowError::config_error(
                format!("Failed to parse manifest: {}", e),
                Some(path.to_path_buf()),
            )
        })
    }

    /// Builds a catalog holding every declared module, followed by the
    /// extra identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`ModFlowError::ConfigError`] for a blank identifier and
    /// [`ModFlowError::DuplicateModule`] when an identifier repeats.
    pub fn into_catalog(self) -> Result<StaticCatalog> {
        let mut catalog = StaticCatalog::new();

        for entry in self.modules {
            if entry.id.is_blank() {
                return Err(ModFlowError::config_error(
                    "Manifest module identifier cannot be empty",
                    None,
                ));
            }
            catalog.register(entry.into_descriptor())?;
        }

        for id in self.catalog.extra {
            catalog.declare(id)?;
        }

        Ok(catalog)
    }
}

impl ModuleEntry {
    fn into_descriptor(self) -> ModuleDescriptor {
        let id = self.id.clone();
        let services = self.services;
        let builder = ModuleDescriptor::builder(self.id)
            .depends_on(self.depends_on)
            .configure(move |ctx| {
                for service in &services {
                    ctx.services_mut().add_keyed(
                        service.clone(),
                        ManifestService {
                            module: id.clone(),
                            service: service.clone(),
                        },
                    );
                }
                _ = ctx.set_item(format!("module:{}", id), services.clone());
                Ok(())
            });

        match self.name {
            Some(name) => builder.name(name).build(),
            None => builder.build(),
        }
    }
}
