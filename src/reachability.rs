// Copyright © 2024 ModFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Reachability Validation
//!
//! Cross-checks a sorted closure against every module known to the
//! process. Modules present in the catalog but never wired into any
//! dependency list are orphans, a defect a topological sort alone cannot
//! see.

use log::warn;
use std::collections::HashSet;

use crate::core::error::{ModFlowError, Result};
use crate::module::ModuleId;
use crate::ModuleCatalog;

/// Returns catalog modules absent from `sorted`, in catalog order and
/// without duplicates.
pub fn find_unreachable(
    sorted: &[ModuleId],
    catalog: &dyn ModuleCatalog,
) -> Vec<ModuleId> {
    let reachable: HashSet<&ModuleId> = sorted.iter().collect();
    let mut seen = HashSet::new();

    catalog
        .enumerate()
        .into_iter()
        .filter(|id| !reachable.contains(id))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Fails with [`ModFlowError::UnreachableModules`] if any catalog module
/// is missing from the closure of `root`.
pub fn validate_reachability(
    root: &ModuleId,
    sorted: &[ModuleId],
    catalog: &dyn ModuleCatalog,
) -> Result<()> {
    let orphans = find_unreachable(sorted, catalog);
    if orphans.is_empty() {
        return Ok(());
    }

    warn!(
        "{} module(s) not reachable from `{}`: {:?}",
        orphans.len(),
        root,
        orphans
    );
    Err(ModFlowError::UnreachableModules {
        root: root.clone(),
        modules: orphans,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Module;
    use std::sync::Arc;

    /// Catalog that only enumerates, to test the validator in isolation.
    #[derive(Debug)]
    struct ListedCatalog(Vec<ModuleId>);

    impl ModuleCatalog for ListedCatalog {
        fn lookup(&self, _id: &ModuleId) -> Option<Arc<dyn Module>> {
            None
        }

        fn enumerate(&self) -> Vec<ModuleId> {
            self.0.clone()
        }
    }

    fn ids(values: &[&str]) -> Vec<ModuleId> {
        values.iter().copied().map(ModuleId::new).collect()
    }

    #[test]
    fn test_full_coverage_passes() {
        let catalog = ListedCatalog(ids(&["a", "b", "c"]));
        let sorted = ids(&["c", "b", "a"]);
        assert!(validate_reachability(&ModuleId::new("a"), &sorted, &catalog).is_ok());
    }

    #[test]
    fn test_orphans_are_reported_in_catalog_order() {
        let catalog = ListedCatalog(ids(&["a", "b", "c", "d", "e", "b"]));
        let sorted = ids(&["e", "d"]);

        assert_eq!(find_unreachable(&sorted, &catalog), ids(&["a", "b", "c"]));

        match validate_reachability(&ModuleId::new("d"), &sorted, &catalog) {
            Err(ModFlowError::UnreachableModules { root, modules }) => {
                assert_eq!(root.as_str(), "d");
                assert_eq!(modules, ids(&["a", "b", "c"]));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_sorted_modules_outside_catalog_are_ignored() {
        let catalog = ListedCatalog(ids(&["a"]));
        let sorted = ids(&["x", "a"]);
        assert!(find_unreachable(&sorted, &catalog).is_empty());
    }
}
