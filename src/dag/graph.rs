// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::BuildConfig;
use crate::engine::TaskName;
use crate::errors::ConfigError;
use crate::tasks::{standard_units, Transform};

/// One task declaration: a name, the units it fans out into, and the tasks
/// that must succeed before it starts.
#[derive(Clone)]
pub struct TaskNode {
    pub name: TaskName,
    pub units: Vec<Arc<dyn Transform>>,
    pub after: Vec<TaskName>,
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("name", &self.name)
            .field("units", &self.units.len())
            .field("after", &self.after)
            .finish()
    }
}

impl TaskNode {
    pub fn single(name: impl Into<TaskName>, unit: Arc<dyn Transform>) -> Self {
        Self::fan_out(name, vec![unit])
    }

    /// One declaration, N independent units whose reports are merged.
    pub fn fan_out(name: impl Into<TaskName>, units: Vec<Arc<dyn Transform>>) -> Self {
        Self {
            name: name.into(),
            units,
            after: Vec::new(),
        }
    }

    pub fn after(mut self, dep: impl Into<TaskName>) -> Self {
        self.after.push(dep.into());
        self
    }
}

/// Internal adjacency: immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct Edges {
    deps: Vec<TaskName>,
    dependents: Vec<TaskName>,
}

/// Directed acyclic graph of tasks keyed by name.
///
/// Construction validates the graph (unknown dependencies, self edges,
/// duplicates and cycles) and caches a topological order, so the rest of the
/// engine can rely on it being a DAG.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    nodes: BTreeMap<TaskName, TaskNode>,
    edges: HashMap<TaskName, Edges>,
    order: Vec<TaskName>,
}

impl TaskGraph {
    pub fn new(nodes: Vec<TaskNode>) -> Result<Self, ConfigError> {
        let mut by_name: BTreeMap<TaskName, TaskNode> = BTreeMap::new();
        let mut declared: Vec<TaskName> = Vec::with_capacity(nodes.len());

        for node in nodes {
            if by_name.contains_key(&node.name) {
                return Err(ConfigError::Invalid(format!(
                    "task '{}' is declared more than once",
                    node.name
                )));
            }
            declared.push(node.name.clone());
            by_name.insert(node.name.clone(), node);
        }

        let mut edges: HashMap<TaskName, Edges> = declared
            .iter()
            .map(|name| (name.clone(), Edges::default()))
            .collect();

        // Edge direction: dep -> task.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in &declared {
            graph.add_node(name.as_str());
        }

        for node in by_name.values() {
            for dep in &node.after {
                if dep == &node.name {
                    return Err(ConfigError::Invalid(format!(
                        "task '{}' cannot depend on itself",
                        node.name
                    )));
                }
                if !by_name.contains_key(dep) {
                    return Err(ConfigError::UnknownTask(dep.clone()));
                }
                graph.add_edge(dep.as_str(), node.name.as_str(), ());

                if let Some(e) = edges.get_mut(&node.name) {
                    if !e.deps.contains(dep) {
                        e.deps.push(dep.clone());
                    }
                }
                if let Some(e) = edges.get_mut(dep) {
                    if !e.dependents.contains(&node.name) {
                        e.dependents.push(node.name.clone());
                    }
                }
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            return Err(ConfigError::Cycle(cycle.node_id().to_string()));
        }
        let order = stable_order(&declared, &edges);

        Ok(Self {
            nodes: by_name,
            edges,
            order,
        })
    }

    /// The standard asset graph: one task per built-in group, with the
    /// ordering edges from `[task_deps]`.
    pub fn standard(cfg: &BuildConfig) -> Result<Self, ConfigError> {
        let nodes = standard_units(cfg)
            .into_iter()
            .map(|(name, units)| {
                let mut node = TaskNode::fan_out(name, units);
                if let Some(deps) = cfg.task_deps.get(name) {
                    node.after.extend(deps.iter().cloned());
                }
                node
            })
            .collect();
        Self::new(nodes)
    }

    /// All task names, sorted.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn node(&self, name: &str) -> Option<&TaskNode> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.edges
            .get(name)
            .map(|e| e.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.edges
            .get(name)
            .map(|e| e.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// A valid execution order (dependencies first).
    pub fn topological_order(&self) -> &[TaskName] {
        &self.order
    }
}

/// Kahn's algorithm with ties broken by name, so the order (and therefore
/// dispatch order) does not depend on declaration order.
fn stable_order(declared: &[TaskName], edges: &HashMap<TaskName, Edges>) -> Vec<TaskName> {
    let mut indegree: HashMap<&str, usize> = declared
        .iter()
        .map(|name| (name.as_str(), edges.get(name).map_or(0, |e| e.deps.len())))
        .collect();
    let mut ready: BTreeSet<&str> = indegree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(name, _)| *name)
        .collect();

    let mut order = Vec::with_capacity(declared.len());
    while let Some(name) = ready.pop_first() {
        order.push(name.to_string());
        for dependent in edges.get(name).map(|e| e.dependents.as_slice()).unwrap_or(&[]) {
            if let Some(deg) = indegree.get_mut(dependent.as_str()) {
                *deg -= 1;
                if *deg == 0 {
                    ready.insert(dependent.as_str());
                }
            }
        }
    }
    order
}
