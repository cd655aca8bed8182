// Copyright © 2024 ModFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Dependency Graph
//!
//! Computes the transitive closure of modules reachable from a root by
//! following declared dependency edges. The graph holds exactly the
//! reachable nodes, each with its dependency list in declaration order.

use log::debug;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::core::error::{ModFlowError, Result};
use crate::module::ModuleId;
use crate::{Module, ModuleCatalog};

/// A resolved node: the module and its declared dependencies.
#[derive(Debug, Clone)]
pub struct GraphNode {
    module: Arc<dyn Module>,
    dependencies: Vec<ModuleId>,
}

impl GraphNode {
    /// The module descriptor behind this node.
    pub fn module(&self) -> &Arc<dyn Module> {
        &self.module
    }

    /// Dependency identifiers in declaration order.
    pub fn dependencies(&self) -> &[ModuleId] {
        &self.dependencies
    }
}

/// Mapping from module identifier to its ordered dependency list,
/// covering every module reachable from `root`.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    root: ModuleId,
    nodes: BTreeMap<ModuleId, GraphNode>,
}

impl DependencyGraph {
    /// Builds the closure of `root` against `catalog`.
    ///
    /// # Errors
    ///
    /// - [`ModFlowError::NotAModule`] if `root` has no descriptor.
    /// - [`ModFlowError::UnresolvedDependency`] if any reachable module
    ///   declares a dependency without a descriptor.
    pub fn build(root: &ModuleId, catalog: &dyn ModuleCatalog) -> Result<Self> {
        let mut nodes = BTreeMap::new();
        let mut visited: HashSet<ModuleId> = HashSet::new();
        let mut stack: Vec<(ModuleId, Option<ModuleId>)> =
            vec![(root.clone(), None)];

        while let Some((current, referrer)) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }

            let module = catalog.lookup(&current).ok_or_else(|| {
                match referrer {
                    Some(referrer) => ModFlowError::UnresolvedDependency {
                        dependency: current.clone(),
                        referrer,
                    },
                    None => ModFlowError::NotAModule {
                        module: current.clone(),
                    },
                }
            })?;

            let dependencies = module.dependencies().to_vec();
            debug!(
                "Discovered module `{}` with dependencies {:?}",
                current, dependencies
            );

            // Reverse push so the first declared dependency is expanded first.
            for dependency in dependencies.iter().rev() {
                if !visited.contains(dependency) {
                    stack.push((dependency.clone(), Some(current.clone())));
                }
            }

            _ = nodes.insert(
                current,
                GraphNode {
                    module,
                    dependencies,
                },
            );
        }

        Ok(Self {
            root: root.clone(),
            nodes,
        })
    }

    /// The root the closure was computed from.
    pub fn root(&self) -> &ModuleId {
        &self.root
    }

    /// Number of nodes in the closure.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` if `id` is part of the closure.
    pub fn contains(&self, id: &ModuleId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Returns the node for `id`.
    pub fn node(&self, id: &ModuleId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Returns the declared dependencies of `id`.
    pub fn dependencies(&self, id: &ModuleId) -> Option<&[ModuleId]> {
        self.nodes.get(id).map(GraphNode::dependencies)
    }

    /// Iterates over node identifiers in identifier order.
    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.nodes.keys()
    }

    /// Iterates over nodes in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&ModuleId, &GraphNode)> {
        self.nodes.iter()
    }

    /// Iterates over every `(dependent, dependency)` edge.
    pub fn edges(&self) -> impl Iterator<Item = (&ModuleId, &ModuleId)> {
        self.nodes.iter().flat_map(|(id, node)| {
            node.dependencies.iter().map(move |dependency| (id, dependency))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ModuleDescriptor, StaticCatalog};

    fn catalog(edges: &[(&str, &[&str])]) -> StaticCatalog {
        let mut catalog = StaticCatalog::new();
        for (id, deps) in edges {
            catalog
                .register(ModuleDescriptor::new(*id, *id, deps.iter().copied()))
                .unwrap();
        }
        catalog
    }

    fn ids(graph: &DependencyGraph) -> Vec<&str> {
        graph.ids().map(ModuleId::as_str).collect()
    }

    #[test]
    fn test_build_covers_transitive_closure() {
        let catalog = catalog(&[
            ("a", &["b"]),
            ("b", &["c"]),
            ("c", &[]),
            ("unrelated", &[]),
        ]);
        let graph = DependencyGraph::build(&ModuleId::new("a"), &catalog).unwrap();

        assert_eq!(ids(&graph), vec!["a", "b", "c"]);
        assert_eq!(graph.root().as_str(), "a");
        assert!(!graph.contains(&ModuleId::new("unrelated")));
    }

    #[test]
    fn test_build_keeps_declared_order() {
        let catalog = catalog(&[("a", &["c", "b"]), ("b", &[]), ("c", &[])]);
        let graph = DependencyGraph::build(&ModuleId::new("a"), &catalog).unwrap();

        let deps: Vec<&str> = graph
            .dependencies(&ModuleId::new("a"))
            .unwrap()
            .iter()
            .map(ModuleId::as_str)
            .collect();
        assert_eq!(deps, vec!["c", "b"]);
        assert_eq!(graph.edges().count(), 2);
    }

    #[test]
    fn test_build_tolerates_cycles() {
        let catalog = catalog(&[("a", &["b"]), ("b", &["a"])]);
        let graph = DependencyGraph::build(&ModuleId::new("a"), &catalog).unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_missing_root_is_not_a_module() {
        let catalog = catalog(&[("a", &[])]);
        let err = DependencyGraph::build(&ModuleId::new("ghost"), &catalog)
            .unwrap_err();
        assert!(matches!(
            err,
            ModFlowError::NotAModule { ref module } if module.as_str() == "ghost"
        ));
    }

    #[test]
    fn test_missing_dependency_names_referrer() {
        let catalog = catalog(&[("a", &["b"]), ("b", &["ghost"])]);
        let err =
            DependencyGraph::build(&ModuleId::new("a"), &catalog).unwrap_err();
        match err {
            ModFlowError::UnresolvedDependency {
                dependency,
                referrer,
            } => {
                assert_eq!(dependency.as_str(), "ghost");
                assert_eq!(referrer.as_str(), "b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
