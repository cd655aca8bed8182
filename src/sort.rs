// Copyright © 2024 ModFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Topological Sort
//!
//! Orders a [`DependencyGraph`] so that every dependency precedes its
//! dependents, failing on the first cycle found.
//!
//! The traversal is a depth-first walk from the root with three marks:
//! unvisited, in progress and done. Dependency lists are walked in
//! declaration order, so the result is deterministic for a given graph.
//! Diamond-shaped graphs admit several valid orders; only the partial
//! order is guaranteed.

use log::{debug, warn};
use std::collections::HashMap;

use crate::core::error::{ModFlowError, Result};
use crate::graph::DependencyGraph;
use crate::module::ModuleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// A module on the current path and the index of its next dependency.
#[derive(Debug)]
struct Frame<'g> {
    id: &'g ModuleId,
    dependencies: &'g [ModuleId],
    next: usize,
}

struct Sorter<'g> {
    graph: &'g DependencyGraph,
    marks: HashMap<&'g ModuleId, Mark>,
    path: Vec<Frame<'g>>,
    order: Vec<ModuleId>,
}

impl<'g> Sorter<'g> {
    /// Walks the graph from `root` with an explicit stack, appending each
    /// module once all of its dependencies are done.
    fn walk(&mut self, root: &'g ModuleId) -> Result<()> {
        self.enter(root)?;

        while let Some(frame) = self.path.last_mut() {
            let dependencies: &'g [ModuleId] = frame.dependencies;
            if let Some(dependency) = dependencies.get(frame.next) {
                frame.next += 1;
                self.enter(dependency)?;
            } else {
                let id = frame.id;
                _ = self.path.pop();
                _ = self.marks.insert(id, Mark::Done);
                self.order.push(id.clone());
            }
        }
        Ok(())
    }

    /// Pushes `id` onto the path unless it is already done.
    fn enter(&mut self, id: &'g ModuleId) -> Result<()> {
        match self.marks.get(id) {
            Some(Mark::Done) => Ok(()),
            Some(Mark::InProgress) => Err(self.cycle_at(id)),
            None => {
                let graph: &'g DependencyGraph = self.graph;
                let dependencies = graph.dependencies(id).ok_or_else(|| {
                    ModFlowError::internal_error(format!(
                        "module `{}` is missing from the dependency graph",
                        id
                    ))
                })?;

                _ = self.marks.insert(id, Mark::InProgress);
                self.path.push(Frame {
                    id,
                    dependencies,
                    next: 0,
                });
                Ok(())
            }
        }
    }

    fn cycle_at(&self, id: &ModuleId) -> ModFlowError {
        let start = self
            .path
            .iter()
            .position(|frame| frame.id == id)
            .unwrap_or(0);
        let mut cycle: Vec<ModuleId> = self.path[start..]
            .iter()
            .map(|frame| frame.id.clone())
            .collect();
        cycle.push(id.clone());
        warn!("Circular dependency detected at `{}`", id);
        ModFlowError::CircularDependency {
            module: id.clone(),
            cycle,
        }
    }
}

/// Sorts the graph so dependencies come before dependents.
///
/// The result is a permutation of the graph's node set, ending with the
/// root.
///
/// # Errors
///
/// Returns [`ModFlowError::CircularDependency`] naming the node at which
/// the traversal re-entered a module still in progress.
pub fn topological_sort(graph: &DependencyGraph) -> Result<Vec<ModuleId>> {
    let mut sorter = Sorter {
        graph,
        marks: HashMap::with_capacity(graph.len()),
        path: Vec::new(),
        order: Vec::with_capacity(graph.len()),
    };
    sorter.walk(graph.root())?;

    if sorter.order.len() != graph.len() {
        return Err(ModFlowError::internal_error(format!(
            "sorted {} modules but the graph holds {}",
            sorter.order.len(),
            graph.len()
        )));
    }

    debug!("Topological order: {:?}", sorter.order);
    Ok(sorter.order)
}

/// Checks that `order` is a valid topological order of `graph`: every
/// node exactly once and every dependency before its dependent.
pub fn is_topological_order(graph: &DependencyGraph, order: &[ModuleId]) -> bool {
    let positions: HashMap<&ModuleId, usize> = order
        .iter()
        .enumerate()
        .map(|(index, id)| (id, index))
        .collect();

    positions.len() == order.len()
        && positions.len() == graph.len()
        && graph.ids().all(|id| positions.contains_key(id))
        && graph.edges().all(|(dependent, dependency)| {
            match (positions.get(dependency), positions.get(dependent)) {
                (Some(before), Some(after)) => before < after,
                _ => false,
            }
        })
}
