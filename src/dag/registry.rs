// src/dag/registry.rs

//! Discovery-time graph construction.
//!
//! The [`Registry`] is the mutable side of the graph: nodes are registered
//! (deduplicated by key), edges are added in either order, fixtures are
//! paired. [`Registry::freeze`] validates everything and produces the
//! immutable [`TestGraph`] the scheduler runs.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::dag::graph::TestGraph;
use crate::errors::{DagtestError, Result};
use crate::node::{FixtureRole, Node, NodeBuilder, NodeDefaults, NodeKind};
use crate::types::NodeKey;

/// Explicit, injectable registry of nodes keyed by qualified name.
#[derive(Debug, Default)]
pub struct Registry {
    nodes: HashMap<NodeKey, Node>,
    order: Vec<NodeKey>,
    /// `(node, dependency)` pairs declared on builders, resolved at freeze
    /// time so declarations may name nodes registered later.
    pending: Vec<(NodeKey, NodeKey)>,
    defaults: NodeDefaults,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry applying `defaults` to every node registered afterwards
    /// that does not declare its own timeout, strategy or policy.
    pub fn with_defaults(defaults: NodeDefaults) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    pub fn defaults(&self) -> &NodeDefaults {
        &self.defaults
    }

    /// Register a node and return its key.
    ///
    /// Registering a key that already exists returns the existing node's key
    /// and discards the builder.
    pub fn register(&mut self, builder: NodeBuilder) -> NodeKey {
        let key = builder.key.clone();
        if self.nodes.contains_key(&key) {
            debug!(node = %key, "node already registered; reusing it");
            return key;
        }

        for dependency in &builder.depends {
            self.pending.push((key.clone(), dependency.clone()));
        }
        let node = Node::from_builder(builder, &self.defaults);
        self.nodes.insert(key.clone(), node);
        self.order.push(key.clone());
        key
    }

    /// Make `node` depend on `dependency`, updating both edge sets.
    pub fn depends(&mut self, node: &str, dependency: &str) -> Result<()> {
        if node == dependency {
            return Err(DagtestError::SelfDependency(node.to_string()));
        }
        if !self.nodes.contains_key(dependency) {
            return Err(DagtestError::NodeNotFound(dependency.to_string()));
        }
        let Some(dependent) = self.nodes.get_mut(node) else {
            return Err(DagtestError::NodeNotFound(node.to_string()));
        };
        dependent.dependencies.insert(dependency.to_string());

        if let Some(target) = self.nodes.get_mut(dependency) {
            target.dependents.insert(node.to_string());
        }
        Ok(())
    }

    /// Pair a teardown fixture with its setup fixture. The setup also
    /// becomes a dependency of the teardown.
    pub fn set_partner(&mut self, teardown: &str, setup: &str) -> Result<()> {
        let invalid = |reason: String| DagtestError::InvalidPartner {
            teardown: teardown.to_string(),
            reason,
        };

        let teardown_kind = self
            .nodes
            .get(teardown)
            .map(Node::kind)
            .ok_or_else(|| DagtestError::NodeNotFound(teardown.to_string()))?;
        let setup_kind = self
            .nodes
            .get(setup)
            .map(Node::kind)
            .ok_or_else(|| DagtestError::NodeNotFound(setup.to_string()))?;

        if teardown_kind != NodeKind::Fixture(FixtureRole::Teardown) {
            return Err(invalid("only teardown fixtures take a partner".to_string()));
        }
        if setup_kind != NodeKind::Fixture(FixtureRole::Setup) {
            return Err(invalid(format!("'{setup}' is not a setup fixture")));
        }

        self.depends(teardown, setup)?;
        if let Some(node) = self.nodes.get_mut(teardown) {
            node.partner = Some(setup.to_string());
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Mutable access for attribute edits before the graph is frozen.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    /// Keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolve declared dependencies, reject cycles and produce the frozen
    /// graph.
    pub fn freeze(mut self) -> Result<TestGraph> {
        for (node, dependency) in std::mem::take(&mut self.pending) {
            if !self.nodes.contains_key(&dependency) {
                return Err(DagtestError::UnknownDependency { node, dependency });
            }
            self.depends(&node, &dependency)?;
        }

        self.check_acyclic()?;

        let mut nodes = self.nodes;
        let ordered = self
            .order
            .iter()
            .filter_map(|key| nodes.remove(key))
            .collect();
        Ok(TestGraph::new(ordered))
    }

    fn check_acyclic(&self) -> Result<()> {
        // Edge direction: dependency -> dependent.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for key in &self.order {
            graph.add_node(key.as_str());
        }
        for (key, node) in &self.nodes {
            for dependency in &node.dependencies {
                graph.add_edge(dependency.as_str(), key.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(DagtestError::DagCycle(format!(
                "cycle detected involving node '{}'",
                cycle.node_id()
            ))),
        }
    }
}
