// Copyright © 2024 ModFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Configuration Module
//!
//! Configuration for the ModFlow pipeline and its command-line host. Values
//! come from an optional TOML file, environment variables and programmatic
//! overrides, applied in that order.
//!
//! ## Example
//!
//! ```rust,no_run
//! use modflow::core::config::{ConfigBuilder, Profile};
//!
//! let config = ConfigBuilder::new()
//!     .with_file("modflow.toml")
//!     .with_env_prefix("MODFLOW_")
//!     .with_profile(Profile::Production)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.profile, Profile::Production);
//! ```
//!
//! Environment variables use `__` to separate nested keys, so
//! `MODFLOW_PIPELINE__LOG_CONFIGURE=true` sets `pipeline.log_configure` and
//! `MODFLOW_SETTINGS__JWT__ISSUER=me` sets `settings.jwt.issuer`.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use toml::{Table, Value as TomlValue};

use crate::core::error::{ModFlowError, Result};
use crate::module::ModuleId;
use crate::settings::Settings;

/// Default prefix for environment overrides.
pub const DEFAULT_ENV_PREFIX: &str = "MODFLOW_";

/// Specifies operational profiles for configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Development profile with settings optimised for debugging.
    #[default]
    Development,
    /// Staging profile for intermediate testing between development and production.
    Staging,
    /// Production profile.
    Production,
    /// Custom profile enabling specific user configurations.
    Custom,
}

impl FromStr for Profile {
    type Err = ModFlowError;

    fn from_str(value: &str) -> Result<Self> {
        Ok(match value.to_lowercase().as_str() {
            "development" => Profile::Development,
            "staging" => Profile::Staging,
            "production" => Profile::Production,
            _ => Profile::Custom,
        })
    }
}

/// Output format for audit trails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditFormat {
    /// One line per configured module.
    #[default]
    Text,
    /// Pretty-printed JSON array.
    Json,
}

impl FromStr for AuditFormat {
    type Err = ModFlowError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "text" => Ok(AuditFormat::Text),
            "json" => Ok(AuditFormat::Json),
            other => Err(ModFlowError::config_error(
                format!("Unknown audit format '{}'", other),
                None,
            )),
        }
    }
}

impl fmt::Display for AuditFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditFormat::Text => f.write_str("text"),
            AuditFormat::Json => f.write_str("json"),
        }
    }
}

/// Settings that change how the pipeline driver reports progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    /// Logs every configured module at info level instead of debug.
    pub log_configure: bool,

    #[serde(default)]
    /// Format used when printing audit trails.
    pub audit_format: AuditFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            log_configure: false,
            audit_format: AuditFormat::Text,
        }
    }
}

/// Represents the main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    /// Indicates the current operational profile.
    pub profile: Profile,

    #[serde(default)]
    /// Root module used when none is given on the command line.
    pub root: Option<ModuleId>,

    #[serde(default)]
    /// Module manifest used when none is given on the command line.
    pub manifest: Option<PathBuf>,

    #[serde(default)]
    /// Pipeline reporting settings.
    pub pipeline: PipelineConfig,

    #[serde(default)]
    /// Free-form settings handed to modules as their configuration source.
    pub settings: Table,
}

impl Config {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        validate_config(self)
    }

    /// Builds the [`Settings`] modules will see.
    pub fn to_settings(&self) -> Settings {
        Settings::new(self.settings.clone())
    }
}

/// Builds a `Config` from a file, environment variables and overrides.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_file: Option<PathBuf>,
    env_prefix: Option<String>,
    profile: Option<Profile>,
    overrides: HashMap<String, TomlValue>,
}

impl ConfigBuilder {
    /// Initialises a new `ConfigBuilder` instance with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a configuration file to the builder.
    ///
    /// # Parameters
    /// - `path`: The path to the TOML configuration file.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Adds a prefix for environment variables to override configuration values.
    ///
    /// # Parameters
    /// - `prefix`: The prefix for environment variables (e.g., "MODFLOW_").
    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Sets the profile for the configuration.
    pub fn with_profile<P: Into<Profile>>(mut self, profile: P) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Adds a key-value pair to override configuration values.
    ///
    /// # Parameters
    /// - `key`: The configuration key, e.g. `pipeline.log_configure`.
    /// - `value`: The new value for the key.
    pub fn with_override<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<TomlValue>,
    {
        _ = self.overrides.insert(key.into(), value.into());
        self
    }

    /// Builds the final configuration by applying all specified settings
    /// and overrides, then validates it.
    pub fn build(self) -> Result<Config> {
        let mut config = if let Some(path) = self.config_file {
            load_from_file(&path)?
        } else {
            Config::default()
        };

        if let Some(profile) = self.profile {
            config.profile = profile;
        }

        if let Some(prefix) = self.env_prefix {
            apply_env_overrides(&mut config, &prefix)?;
        }

        apply_overrides(&mut config, &self.overrides)?;
        validate_config(&config)?;

        Ok(config)
    }
}

fn load_from_file(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|e| {
        ModFlowError::config_error(
            format!("Failed to read config file: {}", e),
            Some(path.to_path_buf()),
        )
    })?;

    toml::from_str(&content).map_err(|e| {
        ModFlowError::config_error(
            format!("Failed to parse config file: {}", e),
            Some(path.to_path_buf()),
        )
    })
}

fn apply_env_overrides(config: &mut Config, prefix: &str) -> Result<()> {
    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(prefix) {
            let config_key = stripped
                .trim_start_matches('_')
                .to_lowercase()
                .replace("__", ".");
            apply_config_value(config, &config_key, &TomlValue::String(value))?;
        }
    }
    Ok(())
}

fn apply_overrides(
    config: &mut Config,
    overrides: &HashMap<String, TomlValue>,
) -> Result<()> {
    for (key, value) in overrides {
        apply_config_value(config, key, value)?;
    }
    Ok(())
}

fn validate_config(config: &Config) -> Result<()> {
    if let Some(root) = &config.root {
        if root.is_blank() {
            return Err(ModFlowError::config_error(
                "Root module identifier cannot be empty",
                None,
            ));
        }
    }

    if let Some(manifest) = &config.manifest {
        if manifest.exists() && !manifest.is_file() {
            return Err(ModFlowError::config_error(
                format!("Manifest path is not a file: {}", manifest.display()),
                Some(manifest.clone()),
            ));
        }
    }

    Ok(())
}

fn value_text(value: &TomlValue) -> String {
    match value {
        TomlValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn apply_config_value(
    config: &mut Config,
    key: &str,
    value: &TomlValue,
) -> Result<()> {
    let text = value_text(value);
    match key {
        "profile" => config.profile = text.parse()?,
        "root" => config.root = Some(ModuleId::new(text)),
        "manifest" => config.manifest = Some(PathBuf::from(text)),
        "pipeline.log_configure" => {
            config.pipeline.log_configure = text.parse().map_err(|e| {
                ModFlowError::config_error(
                    format!("Invalid log_configure value '{}': {}", text, e),
                    None,
                )
            })?;
        }
        "pipeline.audit_format" => config.pipeline.audit_format = text.parse()?,
        _ => match key.split_once('.') {
            Some(("settings", path)) if !path.is_empty() => {
                insert_setting(&mut config.settings, path, value.clone())?;
            }
            Some((section, _)) => {
                return Err(ModFlowError::config_error(
                    format!("Unknown configuration section: {}", section),
                    None,
                ));
            }
            None => {
                return Err(ModFlowError::config_error(
                    format!("Unknown configuration key: {}", key),
                    None,
                ));
            }
        },
    }
    Ok(())
}

fn insert_setting(table: &mut Table, path: &str, value: TomlValue) -> Result<()> {
    match path.split_once('.') {
        None => {
            _ = table.insert(path.to_string(), value);
            Ok(())
        }
        Some((head, rest)) => {
            let entry = table
                .entry(head.to_string())
                .or_insert_with(|| TomlValue::Table(Table::new()));
            match entry {
                TomlValue::Table(child) => insert_setting(child, rest, value),
                _ => Err(ModFlowError::config_error(
                    format!("Setting `{}` is not a table", head),
                    None,
                )),
            }
        }
    }
}
