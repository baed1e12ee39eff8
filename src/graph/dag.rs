// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Module dependency graph
//!
//! Builds and validates the dependency graph between parsed modules,
//! ensuring every dependency exists and that there are no cycles.

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use super::definition::ModuleEntry;
use crate::errors::GraphError;

/// Dependency graph over module indices
pub(crate) struct DependencyGraph {
    graph: DiGraph<usize, ()>,
}

impl DependencyGraph {
    /// Build a graph with an edge from every dependency to its dependent
    pub fn build(modules: &[ModuleEntry]) -> Result<Self, Vec<GraphError>> {
        let mut graph = DiGraph::new();
        let mut name_to_node: HashMap<&str, NodeIndex> = HashMap::new();
        let mut errors = Vec::new();

        for (idx, module) in modules.iter().enumerate() {
            let node = graph.add_node(idx);
            name_to_node.insert(module.name.as_str(), node);
        }

        for module in modules {
            let node = name_to_node[module.name.as_str()];
            for dep in &module.deps {
                match name_to_node.get(dep.as_str()) {
                    Some(&dep_node) => {
                        if !graph.contains_edge(dep_node, node) {
                            graph.add_edge(dep_node, node, ());
                        }
                    }
                    None => errors.push(GraphError::Module {
                        path: module.file.clone(),
                        module: module.name.clone(),
                        message: format!("depends on undefined module \"{}\"", dep),
                    }),
                }
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let dag = Self { graph };
        dag.validate_acyclic(modules)?;
        Ok(dag)
    }

    fn validate_acyclic(&self, modules: &[ModuleEntry]) -> Result<(), Vec<GraphError>> {
        if toposort(&self.graph, None).is_ok() {
            return Ok(());
        }

        let errors: Vec<GraphError> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || self.graph.contains_edge(component[0], component[0])
            })
            .map(|mut component| {
                component.sort_by_key(|n| self.graph[*n]);
                let names: Vec<&str> = component
                    .iter()
                    .map(|n| modules[self.graph[*n]].name.as_str())
                    .collect();
                let first = &modules[self.graph[component[0]]];
                GraphError::Module {
                    path: first.file.clone(),
                    module: first.name.clone(),
                    message: format!(
                        "dependency cycle: {} -> {}",
                        names.join(" -> "),
                        names[0]
                    ),
                }
            })
            .collect();

        Err(errors)
    }

    /// Module indices with every dependency before its dependents
    pub fn topological_order(&self) -> Result<Vec<usize>, GraphError> {
        toposort(&self.graph, None)
            .map(|nodes| nodes.into_iter().map(|n| self.graph[n]).collect())
            .map_err(|_| GraphError::internal("dependency graph changed after validation"))
    }
}
