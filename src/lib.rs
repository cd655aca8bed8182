// Copyright © 2024 ModFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # ModFlow Library
//!
//! ModFlow resolves a root module's transitive dependencies, orders them so
//! dependencies are configured before dependents, checks that every module
//! known to the process is wired in, and runs each module's configuration
//! step exactly once while recording an audit trail.
//!
//! For more information, visit the [ModFlow documentation](https://docs.rs/modflow).

#![doc = include_str!("../README.md")]
#![doc(html_root_url = "https://docs.rs/modflow")]
#![crate_name = "modflow"]
#![crate_type = "lib"]

use log::{debug, error, info};
use std::sync::Arc;

use crate::context::ConfigurationContext;
use crate::core::config::PipelineConfig;
use crate::core::error::{ConfigureResult, ModFlowError, Result};
use crate::graph::DependencyGraph;
use crate::module::ModuleId;
use crate::services::ServiceRegistry;

/// Module containing core utilities, such as configuration and error handling.
pub mod core {
    /// Handles configuration of the ModFlow pipeline and its binary.
    pub mod config;
    /// Contains error types and handling for ModFlow.
    pub mod error;
}

/// Append-only record of configured modules.
pub mod audit;

/// Command-line interface utilities.
pub mod cli;

/// Shared state passed to module callbacks.
pub mod context;

/// Transitive closure of a root module.
pub mod graph;

/// TOML module manifests.
pub mod manifest;

/// Module identifiers, descriptors and catalogs.
pub mod module;

/// Orphan detection against the module catalog.
pub mod reachability;

/// Service registry collaborator.
pub mod services;

/// Hierarchical settings collaborator.
pub mod settings;

/// Topological ordering with cycle detection.
pub mod sort;

pub use crate::core::error::{BoxError, ModFlowError as Error};
pub use crate::module::{ModuleDescriptor, StaticCatalog};

/// A unit of configuration with declared dependencies.
///
/// Implementations must return the same identifier and dependency list
/// for the lifetime of the process.
pub trait Module: Send + Sync + std::fmt::Debug {
    /// Identifier, unique within the catalog.
    fn id(&self) -> &ModuleId;

    /// Display label used in logs and the audit trail.
    fn name(&self) -> &str;

    /// Identifiers of the modules that must be configured first, in
    /// declaration order.
    fn dependencies(&self) -> &[ModuleId];

    /// Configures the module. Called exactly once per pipeline run, after
    /// every dependency has been configured.
    ///
    /// # Arguments
    /// * `context` - The shared configuration context.
    fn configure(&self, context: &mut ConfigurationContext) -> ConfigureResult;
}

/// The explicit list of modules known to the process.
pub trait ModuleCatalog: Send + Sync + std::fmt::Debug {
    /// Resolves an identifier to its module.
    fn lookup(&self, id: &ModuleId) -> Option<Arc<dyn Module>>;

    /// Every identifier known to the process, in a stable order.
    fn enumerate(&self) -> Vec<ModuleId>;
}

/// The validated outcome of resolution: closure, order and modules.
#[derive(Debug, Clone)]
pub struct ResolutionPlan {
    root: ModuleId,
    graph: DependencyGraph,
    order: Vec<ModuleId>,
    modules: Vec<Arc<dyn Module>>,
}

impl ResolutionPlan {
    /// The root module.
    pub fn root(&self) -> &ModuleId {
        &self.root
    }

    /// The dependency graph of the root's closure.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Identifiers in configuration order.
    pub fn order(&self) -> &[ModuleId] {
        &self.order
    }

    /// Modules in configuration order.
    pub fn modules(&self) -> &[Arc<dyn Module>] {
        &self.modules
    }

    /// Number of modules to configure.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if there is nothing to configure.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Resolves `root` against `catalog` without running any callback.
///
/// Runs the four gates in order: root check, graph build, topological
/// sort and reachability validation.
pub fn plan(root: &ModuleId, catalog: &dyn ModuleCatalog) -> Result<ResolutionPlan> {
    if catalog.lookup(root).is_none() {
        error!("Root `{}` is not a registered module", root);
        return Err(ModFlowError::NotAModule {
            module: root.clone(),
        });
    }

    let graph = DependencyGraph::build(root, catalog)?;
    debug!("Closure of `{}` holds {} module(s)", root, graph.len());

    let order = sort::topological_sort(&graph)?;
    reachability::validate_reachability(root, &order, catalog)?;

    let modules = order
        .iter()
        .map(|id| {
            graph
                .node(id)
                .map(|node| node.module().clone())
                .ok_or_else(|| {
                    ModFlowError::internal_error(format!(
                        "sorted module `{}` has no graph node",
                        id
                    ))
                })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ResolutionPlan {
        root: root.clone(),
        graph,
        order,
        modules,
    })
}

/// Resolves `root` and configures its closure into a new context built
/// around `services`.
///
/// # Errors
///
/// Resolution errors are returned before any callback runs. A failing
/// callback stops the run with [`ModFlowError::ModuleConfigurationFailed`];
/// modules configured before it stay configured.
pub fn configure_modules<R: ServiceRegistry + 'static>(
    services: R,
    root: &ModuleId,
    catalog: &dyn ModuleCatalog,
) -> Result<ConfigurationContext> {
    ModFlowRunner::new(catalog, PipelineConfig::default())
        .run(root, ConfigurationContext::new(services))
}

/// Pipeline driver over an owned catalog.
#[derive(Debug)]
pub struct ModFlow {
    catalog: Box<dyn ModuleCatalog>,
    config: PipelineConfig,
}

impl ModFlow {
    /// Creates a driver over `catalog` with default pipeline settings.
    pub fn new<C: ModuleCatalog + 'static>(catalog: C) -> Self {
        Self {
            catalog: Box::new(catalog),
            config: PipelineConfig::default(),
        }
    }

    /// Replaces the pipeline settings.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// The catalog this driver resolves against.
    pub fn catalog(&self) -> &dyn ModuleCatalog {
        self.catalog.as_ref()
    }

    /// Resolves `root` without running any callback.
    pub fn plan(&self, root: &ModuleId) -> Result<ResolutionPlan> {
        plan(root, self.catalog())
    }

    /// Resolves `root` and configures its closure around `services`.
    pub fn configure_modules<R: ServiceRegistry + 'static>(
        &self,
        root: &ModuleId,
        services: R,
    ) -> Result<ConfigurationContext> {
        self.configure_with(root, ConfigurationContext::new(services))
    }

    /// Resolves `root` and configures its closure into `context`.
    ///
    /// # Errors
    ///
    /// Returns [`ModFlowError::ContextAlreadyUsed`] when `context` already
    /// carries audit entries from an earlier run.
    pub fn configure_with(
        &self,
        root: &ModuleId,
        context: ConfigurationContext,
    ) -> Result<ConfigurationContext> {
        ModFlowRunner::new(self.catalog(), self.config).run(root, context)
    }
}

struct ModFlowRunner<'c> {
    catalog: &'c dyn ModuleCatalog,
    config: PipelineConfig,
}

impl<'c> ModFlowRunner<'c> {
    fn new(catalog: &'c dyn ModuleCatalog, config: PipelineConfig) -> Self {
        Self { catalog, config }
    }

    fn run(
        &self,
        root: &ModuleId,
        mut context: ConfigurationContext,
    ) -> Result<ConfigurationContext> {
        let entries = context.configures().len();
        if entries > 0 {
            error!(
                "Refusing a configuration context that already holds {} audit entries",
                entries
            );
            return Err(ModFlowError::ContextAlreadyUsed { entries });
        }

        info!("Resolving modules from root `{}`", root);
        let plan = plan(root, self.catalog)?;
        info!(
            "Configuring {} module(s): {}",
            plan.len(),
            plan.order()
                .iter()
                .map(ModuleId::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );

        for module in plan.modules() {
            if let Err(source) = module.configure(&mut context) {
                error!(
                    "Module `{}` ({}) failed to configure: {}",
                    module.name(),
                    module.id(),
                    source
                );
                return Err(ModFlowError::module_configuration_failed(
                    module.id().clone(),
                    module.name(),
                    source,
                ));
            }

            let action = context.record_configured(module.as_ref());
            if self.config.log_configure {
                info!("Configured {}", action);
            } else {
                debug!("Configured {}", action);
            }
        }

        info!(
            "Configured {} module(s) from root `{}`",
            context.configures().len(),
            root
        );
        Ok(context)
    }
}
