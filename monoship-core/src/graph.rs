//! Dependency graph management using petgraph.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::GraphError;
use crate::package::{Dependency, DependencyKind, Package};
use crate::range::VersionRange;

/// Which declared dependencies become graph edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphType {
    /// Every dependency field, including dev and peer dependencies.
    #[default]
    All,
    /// Only `dependencies` and `optionalDependencies`.
    Dependencies,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphOptions {
    pub graph_type: GraphType,
    /// Collapse cycles into a single unit instead of failing.
    pub allow_cycles: bool,
}

/// Directed graph of in-workspace dependencies.
///
/// Edges point from a package to the packages it depends on. The graph is
/// built once per run and read-only afterwards.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<String, DependencyKind>,
    node_map: BTreeMap<String, NodeIndex>,
    packages: BTreeMap<String, Package>,
    topological_order: Vec<String>,
    cycles: Vec<Vec<String>>,
}

impl DependencyGraph {
    /// Builds the graph from discovered packages.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateName`] when two packages share a name and
    /// [`GraphError::UnresolvedCycle`] when a cycle remains and
    /// `allow_cycles` is off.
    pub fn build(packages: Vec<Package>, options: GraphOptions) -> Result<Self, GraphError> {
        let mut graph = DiGraph::new();
        let mut node_map = BTreeMap::new();
        let mut packages_map: BTreeMap<String, Package> = BTreeMap::new();

        for package in packages {
            if let Some(existing) = packages_map.get(&package.name) {
                return Err(GraphError::DuplicateName {
                    name: package.name.clone(),
                    first: existing.location.clone(),
                    second: package.location.clone(),
                });
            }
            let node = graph.add_node(package.name.clone());
            node_map.insert(package.name.clone(), node);
            packages_map.insert(package.name.clone(), package);
        }

        for package in packages_map.values() {
            let from = node_map[&package.name];
            for dep in &package.dependencies {
                if options.graph_type == GraphType::Dependencies
                    && matches!(dep.kind, DependencyKind::Dev | DependencyKind::Peer)
                {
                    continue;
                }
                if !resolves_locally(&packages_map, package, dep) {
                    continue;
                }
                let to = node_map[&dep.name];
                match graph.find_edge(from, to) {
                    // A dev declaration never weakens a runtime one.
                    Some(edge) => {
                        if dep.kind != DependencyKind::Dev {
                            if let Some(weight) = graph.edge_weight_mut(edge) {
                                *weight = dep.kind;
                            }
                        }
                    }
                    None => {
                        graph.add_edge(from, to, dep.kind);
                    }
                }
            }
        }

        let cycles = find_cycles(&graph);
        if let Some(first) = cycles.first() {
            if !options.allow_cycles {
                return Err(GraphError::UnresolvedCycle {
                    members: first.clone(),
                });
            }
            for cycle in &cycles {
                warn!(members = %cycle.join(", "), "dependency cycle collapsed into one unit");
            }
        }

        let topological_order = ordered_components(&graph, &node_map);
        debug!(packages = topological_order.len(), edges = graph.edge_count(), "built dependency graph");

        Ok(Self {
            graph,
            node_map,
            packages: packages_map,
            topological_order,
            cycles,
        })
    }

    /// Retrieves a package by name.
    #[inline]
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// All packages, sorted by name.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Packages with dependencies before dependents, ties broken by name.
    ///
    /// Members of a collapsed cycle appear contiguously, sorted by name.
    #[inline]
    pub fn topological_order(&self) -> &[String] {
        &self.topological_order
    }

    /// Cycles that were collapsed, each sorted by name.
    #[inline]
    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    /// Direct in-workspace dependencies of a package, sorted by name.
    pub fn dependencies_of(&self, name: &str) -> Result<Vec<String>, GraphError> {
        self.neighbors(name, Direction::Outgoing)
    }

    /// Direct dependents of a package (packages that depend on it), sorted by name.
    pub fn dependents_of(&self, name: &str) -> Result<Vec<String>, GraphError> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Kind of the edge `from -> to`, if `from` depends on `to` in-workspace.
    pub fn edge_kind(&self, from: &str, to: &str) -> Option<DependencyKind> {
        let from = self.node_map.get(from)?;
        let to = self.node_map.get(to)?;
        self.graph
            .find_edge(*from, *to)
            .and_then(|e| self.graph.edge_weight(e))
            .copied()
    }

    /// All transitive dependents of a package, excluding itself.
    pub fn transitive_dependents(&self, name: &str) -> Result<BTreeSet<String>, GraphError> {
        let mut result = BTreeSet::new();
        let mut stack = self.dependents_of(name)?;

        while let Some(current) = stack.pop() {
            if current == name || !result.insert(current.clone()) {
                continue;
            }
            stack.extend(self.dependents_of(&current)?);
        }

        Ok(result)
    }

    /// Whether `dep`, declared by `package`, points at a workspace package.
    pub fn resolves_locally(&self, package: &Package, dep: &Dependency) -> bool {
        resolves_locally(&self.packages, package, dep)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Result<Vec<String>, GraphError> {
        let node = self.node(name)?;
        let mut names: Vec<String> = self
            .graph
            .neighbors_directed(node, direction)
            .map(|idx| self.graph[idx].clone())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn node(&self, name: &str) -> Result<NodeIndex, GraphError> {
        self.node_map
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::PackageNotFound {
                name: name.to_string(),
                available: self.node_map.keys().cloned().collect::<Vec<_>>().join(", "),
            })
    }
}

/// A dependency is local when it names a workspace package and either uses
/// a local protocol or its range admits that package's current version.
fn resolves_locally(
    packages: &BTreeMap<String, Package>,
    package: &Package,
    dep: &Dependency,
) -> bool {
    let Some(target) = packages.get(&dep.name) else {
        return false;
    };
    if target.name == package.name {
        return false;
    }
    match VersionRange::parse(&dep.range, package.manifest) {
        Ok(range) => range.is_local_protocol() || range.satisfies(&target.version),
        Err(e) => {
            debug!(package = %package.name, dependency = %dep.name, error = %e, "treating dependency as external");
            false
        }
    }
}

fn find_cycles(graph: &DiGraph<String, DependencyKind>) -> Vec<Vec<String>> {
    let mut cycles: Vec<Vec<String>> = tarjan_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .map(|scc| {
            let mut members: Vec<String> = scc.into_iter().map(|idx| graph[idx].clone()).collect();
            members.sort();
            members
        })
        .collect();
    cycles.sort();
    cycles
}

/// Kahn's algorithm over strongly connected components, always releasing the
/// ready component with the lexically smallest member first.
fn ordered_components(
    graph: &DiGraph<String, DependencyKind>,
    node_map: &BTreeMap<String, NodeIndex>,
) -> Vec<String> {
    let mut components: Vec<Vec<String>> = tarjan_scc(graph)
        .into_iter()
        .map(|scc| {
            let mut members: Vec<String> = scc.into_iter().map(|idx| graph[idx].clone()).collect();
            members.sort();
            members
        })
        .collect();
    components.sort();

    let mut component_of: BTreeMap<&str, usize> = BTreeMap::new();
    for (id, members) in components.iter().enumerate() {
        for member in members {
            component_of.insert(member.as_str(), id);
        }
    }

    let mut pending: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); components.len()];
    let mut dependents: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); components.len()];
    for (name, node) in node_map {
        let from = component_of[name.as_str()];
        for dep in graph.neighbors_directed(*node, Direction::Outgoing) {
            let to = component_of[graph[dep].as_str()];
            if from != to {
                pending[from].insert(to);
                dependents[to].insert(from);
            }
        }
    }

    // Component ids follow lexical order of their first member.
    let mut ready: BTreeSet<usize> = (0..components.len())
        .filter(|id| pending[*id].is_empty())
        .collect();
    let mut order = Vec::with_capacity(node_map.len());

    while let Some(id) = ready.pop_first() {
        order.extend(components[id].iter().cloned());
        for dependent in &dependents[id] {
            pending[*dependent].remove(&id);
            if pending[*dependent].is_empty() {
                ready.insert(*dependent);
            }
        }
    }

    order
}
