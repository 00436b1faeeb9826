// src/dag/graph.rs

use std::collections::HashMap;
use std::sync::Arc;

use crate::node::Node;
use crate::types::NodeKey;

/// Frozen dependency graph, keyed by node key.
///
/// Built by [`Registry::freeze`](crate::dag::Registry::freeze), which has
/// already checked that every edge target exists and that there are no
/// cycles. Nodes keep their registration order. The graph can be run any
/// number of times; every run replaces each node's result.
#[derive(Debug, Clone)]
pub struct TestGraph {
    nodes: Vec<Arc<Node>>,
    index: HashMap<NodeKey, usize>,
}

impl TestGraph {
    pub(crate) fn new(nodes: Vec<Node>) -> Self {
        let nodes: Vec<Arc<Node>> = nodes.into_iter().map(Arc::new).collect();
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.key().to_string(), i))
            .collect();
        Self { nodes, index }
    }

    /// All nodes, fixtures included, in registration order.
    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    /// Regular tests only.
    pub fn tests(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.iter().filter(|node| node.is_test())
    }

    pub fn fixtures(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.iter().filter(|node| node.is_fixture())
    }

    pub fn get(&self, key: &str) -> Option<&Arc<Node>> {
        self.index.get(key).map(|&i| &self.nodes[i])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Immediate dependents of `key`.
    pub fn dependents_of(&self, key: &str) -> Vec<&Arc<Node>> {
        self.get(key)
            .map(|node| {
                node.dependents()
                    .iter()
                    .filter_map(|dep| self.get(dep))
                    .collect()
            })
            .unwrap_or_default()
    }
}
