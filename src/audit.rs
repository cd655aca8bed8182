// Copyright © 2024 ModFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Audit Trail
//!
//! Append-only record of every configuration step, in invocation order.
//! Only the pipeline driver appends; everyone else reads.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::slice;

use crate::core::error::{ModFlowError, Result};
use crate::module::ModuleId;
use crate::Module;

/// One configured module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigureAction {
    /// 1-based position in the configuration pass.
    pub order: usize,
    /// Display name of the module.
    pub name: String,
    /// Identifier of the module.
    pub module_id: ModuleId,
    /// When the module finished configuring. Never earlier than the
    /// previous entry.
    pub timestamp: DateTime<Utc>,
    /// Name of the previous entry, empty for the first.
    pub prev_name: String,
    /// Identifier of the previous entry, `None` for the first.
    pub prev_module_id: Option<ModuleId>,
}

impl fmt::Display for ConfigureAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} ({}) at {}",
            self.order,
            self.name,
            self.module_id,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
        )?;
        if let Some(prev) = &self.prev_module_id {
            write!(f, " after {} ({})", self.prev_name, prev)?;
        }
        Ok(())
    }
}

/// Ordered record of configuration steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AuditTrail {
    actions: Vec<ConfigureAction>,
}

impl AuditTrail {
    pub(crate) fn record(&mut self, module: &dyn Module) -> &ConfigureAction {
        let now = Utc::now();
        let previous = self.actions.last();
        let timestamp = match previous {
            Some(prev) if prev.timestamp > now => prev.timestamp,
            _ => now,
        };

        let action = ConfigureAction {
            order: self.actions.len() + 1,
            name: module.name().to_string(),
            module_id: module.id().clone(),
            timestamp,
            prev_name: previous.map(|p| p.name.clone()).unwrap_or_default(),
            prev_module_id: previous.map(|p| p.module_id.clone()),
        };
        self.actions.push(action);
        &self.actions[self.actions.len() - 1]
    }

    /// All recorded actions, in invocation order.
    pub fn actions(&self) -> &[ConfigureAction] {
        &self.actions
    }

    /// Number of recorded actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns `true` if nothing was configured.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Iterates over the recorded actions.
    pub fn iter(&self) -> slice::Iter<'_, ConfigureAction> {
        self.actions.iter()
    }

    /// The most recent action.
    pub fn last(&self) -> Option<&ConfigureAction> {
        self.actions.last()
    }

    /// Zero-based invocation index of `id`, if it was configured.
    pub fn position(&self, id: &ModuleId) -> Option<usize> {
        self.actions.iter().position(|a| &a.module_id == id)
    }

    /// Module identifiers in invocation order.
    pub fn module_ids(&self) -> Vec<&ModuleId> {
        self.actions.iter().map(|a| &a.module_id).collect()
    }

    /// Serializes the trail as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            ModFlowError::internal_error(format!(
                "Failed to serialize audit trail: {}",
                e
            ))
        })
    }
}

impl fmt::Display for AuditTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for action in &self.actions {
            writeln!(f, "{}", action)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a AuditTrail {
    type Item = &'a ConfigureAction;
    type IntoIter = slice::Iter<'a, ConfigureAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}
