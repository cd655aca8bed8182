// Copyright © 2024 ModFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Error Handling for ModFlow
//!
//! This module defines the error types raised while resolving and
//! configuring modules. The `thiserror` crate is used to keep every
//! variant's message and source chain consistent across the library.
//!
//! The first four resolution kinds (`NotAModule`, `UnresolvedDependency`,
//! `CircularDependency` and `UnreachableModules`) are always raised before
//! any module callback runs. `ModuleConfigurationFailed` is raised from
//! inside the configuration pass and leaves earlier modules configured.

use std::path::PathBuf;
use thiserror::Error;

use crate::module::ModuleId;

/// A unified result type for the ModFlow library.
pub type Result<T> = std::result::Result<T, ModFlowError>;

/// Boxed error returned by module configuration callbacks.
///
/// Callbacks may fail with any error type; the pipeline driver wraps it in
/// [`ModFlowError::ModuleConfigurationFailed`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by a module's `configure` step.
pub type ConfigureResult = std::result::Result<(), BoxError>;

/// The main error type for ModFlow.
#[derive(Error, Debug)]
pub enum ModFlowError {
    /// The root identifier does not denote a module in the catalog.
    #[error("Not a module: `{module}` is not registered in the module catalog.")]
    NotAModule {
        /// The identifier that was passed as root.
        module: ModuleId,
    },

    /// A declared dependency could not be resolved to a descriptor.
    #[error(
        "Unresolved dependency: `{dependency}` required by `{referrer}` has no module descriptor."
    )]
    UnresolvedDependency {
        /// The missing dependency identifier.
        dependency: ModuleId,
        /// The module that declared the dependency.
        referrer: ModuleId,
    },

    /// Traversal re-entered a module that was still being visited.
    #[error("Circular dependency detected at `{module}` ({}).", format_cycle(.cycle))]
    CircularDependency {
        /// The module at which the cycle was detected.
        module: ModuleId,
        /// The modules forming the cycle, starting and ending at `module`.
        cycle: Vec<ModuleId>,
    },

    /// The catalog contains modules outside the root's closure.
    #[error(
        "The following modules are not reachable from root module `{root}`: {}.",
        format_ids(.modules)
    )]
    UnreachableModules {
        /// The root the closure was computed from.
        root: ModuleId,
        /// Orphan modules, in catalog order.
        modules: Vec<ModuleId>,
    },

    /// A module's own configuration callback failed.
    #[error("Module configuration failed for `{name}` ({module}).")]
    ModuleConfigurationFailed {
        /// Identifier of the failing module.
        module: ModuleId,
        /// Display name of the failing module.
        name: String,
        /// The error returned by the callback.
        #[source]
        source: BoxError,
    },

    /// A run was handed a context that already holds audit entries.
    #[error(
        "Configuration context already used: it holds {entries} audit entries from an earlier run."
    )]
    ContextAlreadyUsed {
        /// Number of entries already in the context's audit trail.
        entries: usize,
    },

    /// The same identifier was registered twice in a catalog.
    #[error("Duplicate module: `{module}` is already registered in the catalog.")]
    DuplicateModule {
        /// The duplicated identifier.
        module: ModuleId,
    },

    /// No configuration source could be bound from the service registry.
    #[error(
        "Configuration source missing: no `Settings` registration was found in the service registry."
    )]
    ConfigurationSourceMissing,

    /// A required service was not found in the registry.
    #[error("Service not registered: `{service}`.")]
    ServiceNotRegistered {
        /// Description of the service key.
        service: String,
    },

    /// Error related to configuration or manifest loading and validation.
    #[error("Configuration error: {message}.")]
    ConfigError {
        /// Detailed description of the configuration error.
        message: String,
        /// Optional path of the file that caused the error.
        path: Option<PathBuf>,
    },

    /// IO error encountered during file operations.
    #[error("File IO error at `{path:?}`: {source}")]
    IOError {
        /// Path associated with the IO error.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// General internal error.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<std::io::Error> for ModFlowError {
    /// Converts a standard IO error into a `ModFlowError::IOError` with an
    /// empty path.
    fn from(source: std::io::Error) -> Self {
        ModFlowError::IOError {
            path: PathBuf::new(),
            source,
        }
    }
}

impl ModFlowError {
    /// Creates a `ConfigError` with a specific message.
    ///
    /// # Parameters
    /// - `message`: A description of the configuration error.
    /// - `path`: Optional path of the file causing the error.
    pub fn config_error<S: Into<String>>(
        message: S,
        path: Option<PathBuf>,
    ) -> Self {
        ModFlowError::ConfigError {
            message: message.into(),
            path,
        }
    }

    /// Wraps an IO error as an `IOError` variant with the specified path.
    pub fn io_error(path: PathBuf, source: std::io::Error) -> Self {
        ModFlowError::IOError { path, source }
    }

    /// Creates a general internal error with a custom message.
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        ModFlowError::InternalError(message.into())
    }

    /// Wraps a failed callback for the module `module` named `name`.
    pub fn module_configuration_failed<S: Into<String>>(
        module: ModuleId,
        name: S,
        source: BoxError,
    ) -> Self {
        ModFlowError::ModuleConfigurationFailed {
            module,
            name: name.into(),
            source,
        }
    }

    /// Returns the name of the error kind, e.g. `"CircularDependency"`.
    pub fn kind(&self) -> &'static str {
        match self {
            ModFlowError::NotAModule { .. } => "NotAModule",
            ModFlowError::UnresolvedDependency { .. } => {
                "UnresolvedDependency"
            }
            ModFlowError::CircularDependency { .. } => {
                "CircularDependency"
            }
            ModFlowError::UnreachableModules { .. } => {
                "UnreachableModules"
            }
            ModFlowError::ModuleConfigurationFailed { .. } => {
                "ModuleConfigurationFailed"
            }
            ModFlowError::ContextAlreadyUsed { .. } => {
                "ContextAlreadyUsed"
            }
            ModFlowError::DuplicateModule { .. } => "DuplicateModule",
            ModFlowError::ConfigurationSourceMissing => {
                "ConfigurationSourceMissing"
            }
            ModFlowError::ServiceNotRegistered { .. } => {
                "ServiceNotRegistered"
            }
            ModFlowError::ConfigError { .. } => "ConfigError",
            ModFlowError::IOError { .. } => "IOError",
            ModFlowError::InternalError(_) => "InternalError",
        }
    }

    /// Returns `true` for errors raised before any module callback runs.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            ModFlowError::NotAModule { .. }
                | ModFlowError::UnresolvedDependency { .. }
                | ModFlowError::CircularDependency { .. }
                | ModFlowError::UnreachableModules { .. }
        )
    }
}

fn format_ids(ids: &[ModuleId]) -> String {
    ids.iter()
        .map(ModuleId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_cycle(cycle: &[ModuleId]) -> String {
    cycle
        .iter()
        .map(ModuleId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_message_lists_modules() {
        let error = ModFlowError::UnreachableModules {
            root: ModuleId::new("d"),
            modules: vec![
                ModuleId::new("a"),
                ModuleId::new("b"),
                ModuleId::new("c"),
            ],
        };
        assert_eq!(
            error.to_string(),
            "The following modules are not reachable from root module `d`: a, b, c."
        );
        assert_eq!(error.kind(), "UnreachableModules");
        assert!(error.is_resolution_error());
    }

    #[test]
    fn test_cycle_message_shows_path() {
        let error = ModFlowError::CircularDependency {
            module: ModuleId::new("a"),
            cycle: vec![
                ModuleId::new("a"),
                ModuleId::new("b"),
                ModuleId::new("a"),
            ],
        };
        assert_eq!(
            error.to_string(),
            "Circular dependency detected at `a` (a -> b -> a)."
        );
    }

    #[test]
    fn test_configuration_failure_keeps_source() {
        let error = ModFlowError::module_configuration_failed(
            ModuleId::new("infra"),
            "Infrastructure",
            "missing Jwt:SecretKey".into(),
        );
        assert!(!error.is_resolution_error());
        assert_eq!(error.kind(), "ModuleConfigurationFailed");
        let source = std::error::Error::source(&error)
            .map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("missing Jwt:SecretKey"));
    }

    #[test]
    fn test_configuration_failure_message_omits_source() {
        let error = ModFlowError::module_configuration_failed(
            ModuleId::new("infra"),
            "Infrastructure",
            "missing Jwt:SecretKey".into(),
        );
        assert_eq!(
            error.to_string(),
            "Module configuration failed for `Infrastructure` (infra)."
        );

        let chained = format!("{:#}", anyhow::Error::new(error));
        assert_eq!(chained.matches("missing Jwt:SecretKey").count(), 1);
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: ModFlowError = io.into();
        assert!(matches!(error, ModFlowError::IOError { .. }));
    }
}
