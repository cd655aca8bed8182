// Copyright © 2024 ModFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Settings
//!
//! Read-only, hierarchical settings handed to modules as their
//! configuration source. Keys are paths whose segments are separated by
//! `:` or `.`, and each segment matches case-insensitively, so
//! `Jwt:Issuer` and `jwt.issuer` address the same value.

use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use toml::{Table, Value as TomlValue};

use crate::core::error::{ModFlowError, Result};

/// Hierarchical settings backed by a TOML table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    root: Table,
}

impl Settings {
    /// Wraps a TOML table.
    pub fn new(root: Table) -> Self {
        Self { root }
    }

    /// Parses settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let root: Table = toml::from_str(content).map_err(|e| {
            ModFlowError::config_error(
                format!("Failed to parse settings: {}", e),
                None,
            )
        })?;
        Ok(Self::new(root))
    }

    /// Loads settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ModFlowError::io_error(path.to_path_buf(), e))?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ModFlowError::ConfigError { message, .. } => {
                ModFlowError::config_error(message, Some(path.to_path_buf()))
            }
            other => other,
        })
    }

    /// Returns the raw value at `path`.
    pub fn get_value(&self, path: &str) -> Option<&TomlValue> {
        let mut segments = split_path(path);
        let first = segments.next()?;
        let mut current = lookup(&self.root, first)?;
        for segment in segments {
            current = match current {
                TomlValue::Table(table) => lookup(table, segment)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Returns the string at `path`, if the value is a string.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get_value(path).and_then(TomlValue::as_str)
    }

    /// Returns the scalar at `path` rendered as text.
    pub fn get_string(&self, path: &str) -> Option<String> {
        match self.get_value(path)? {
            TomlValue::String(value) => Some(value.clone()),
            TomlValue::Table(_) | TomlValue::Array(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Deserializes the value at `path`.
    ///
    /// # Returns
    /// - `Ok(Some(T))` if the key exists and converts to `T`.
    /// - `Ok(None)` if the key does not exist.
    /// - `Err` if the key exists but cannot be converted.
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        self.get_value(path)
            .map(|value| {
                TomlValue::try_into(value.clone()).map_err(|e| {
                    ModFlowError::config_error(
                        format!("Invalid setting `{}`: {}", path, e),
                        None,
                    )
                })
            })
            .transpose()
    }

    /// Returns the sub-tree at `path`.
    pub fn section(&self, path: &str) -> Option<Settings> {
        match self.get_value(path)? {
            TomlValue::Table(table) => Some(Settings::new(table.clone())),
            _ => None,
        }
    }

    /// Returns `true` if `path` has a value.
    pub fn contains(&self, path: &str) -> bool {
        self.get_value(path).is_some()
    }

    /// Top-level keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.root.keys().map(String::as_str)
    }

    /// Returns `true` if there are no settings.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

impl From<Table> for Settings {
    fn from(root: Table) -> Self {
        Self::new(root)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split([':', '.']).filter(|segment| !segment.is_empty())
}

fn lookup<'t>(table: &'t Table, segment: &str) -> Option<&'t TomlValue> {
    table.get(segment).or_else(|| {
        table
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(segment))
            .map(|(_, value)| value)
    })
}
