//! Dependency ordering.
//!
//! Kahn's algorithm over a case-insensitive graph. When several nodes are
//! ready at once the lexicographically smallest folded id goes first, so
//! the order is the same on every run and every host.

use crate::error::{Error, Result};
use crate::ids;
use std::collections::{BTreeMap, BTreeSet};

const CYCLE_MESSAGE: &str = "Dependency cycle detected in component graph.";

#[derive(Debug, Clone)]
struct Node {
    id: String,
    requires: BTreeSet<String>,
}

/// Nodes and their "must come after" edges.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, Node>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Returns `false` if it was already present.
    pub fn add_node(&mut self, id: &str) -> bool {
        let key = ids::fold(id);
        if self.nodes.contains_key(&key) {
            return false;
        }
        self.nodes.insert(
            key,
            Node {
                id: id.to_string(),
                requires: BTreeSet::new(),
            },
        );
        true
    }

    /// Record that `node` must come after `depends_on`.
    ///
    /// `node` is added if missing. `depends_on` is not: an edge to a node
    /// outside the graph can never be satisfied and surfaces as a cycle.
    pub fn add_edge(&mut self, node: &str, depends_on: &str) {
        self.add_node(node);
        if let Some(entry) = self.nodes.get_mut(&ids::fold(node)) {
            entry.requires.insert(ids::fold(depends_on));
        }
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(&ids::fold(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node after all of the nodes it depends on.
    ///
    /// Fails with a validation error when a cycle (or an edge to an unknown
    /// node) leaves nodes that can never become ready.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let mut pending: BTreeMap<&str, BTreeSet<&str>> = self
            .nodes
            .iter()
            .map(|(key, node)| {
                (
                    key.as_str(),
                    node.requires.iter().map(String::as_str).collect(),
                )
            })
            .collect();

        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, requires)| requires.is_empty())
            .map(|(key, _)| *key)
            .collect();
        for key in &ready {
            pending.remove(key);
        }

        let mut ordered = Vec::with_capacity(self.nodes.len());
        while let Some(current) = ready.pop_first() {
            ordered.push(self.nodes[current].id.clone());

            let mut unlocked = Vec::new();
            for (key, requires) in &mut pending {
                if requires.remove(current) && requires.is_empty() {
                    unlocked.push(*key);
                }
            }
            for key in unlocked {
                pending.remove(key);
                ready.insert(key);
            }
        }

        if !pending.is_empty() {
            log::debug!(
                "Unordered nodes after sort: {}",
                pending.keys().copied().collect::<Vec<_>>().join(", ")
            );
            return Err(Error::validation(CYCLE_MESSAGE));
        }

        Ok(ordered)
    }
}
