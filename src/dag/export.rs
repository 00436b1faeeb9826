// src/dag/export.rs

//! Graph description for external visualisation.
//!
//! [`TestGraph::describe`] snapshots nodes, edges and the latest states as a
//! serialisable structure; [`TestGraph::to_dot`] renders the same data as a
//! GraphViz digraph with edges pointing from dependent to dependency:
//! - failed nodes (FAIL, XFAIL, ERROR, DEPFAIL) are red, fixtures blue
//! - skipped nodes are dotted, dependency failures dashed
//! - edges touching a fixture are blue and dashed; partner edges dotted

use std::collections::HashMap;
use std::fmt;

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;

use crate::dag::graph::TestGraph;
use crate::types::{NodeKey, State};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeDescription {
    pub key: NodeKey,
    pub fixture: bool,
    pub state: Option<State>,
    pub skip: bool,
    pub expected_failure: bool,
}

impl NodeDescription {
    pub fn failed(&self) -> bool {
        self.state.is_some_and(State::is_failed)
    }
}

impl fmt::Display for NodeDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// `from` depends on `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeDescription {
    pub from: NodeKey,
    pub to: NodeKey,
    /// Either end is a fixture.
    pub fixture: bool,
    /// `to` is the partner of `from`.
    pub partner: bool,
}

impl fmt::Display for EdgeDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphDescription {
    pub nodes: Vec<NodeDescription>,
    pub edges: Vec<EdgeDescription>,
}

impl TestGraph {
    /// Snapshot of the graph and the most recent states.
    pub fn describe(&self) -> GraphDescription {
        let mut description = GraphDescription::default();

        for node in self.nodes() {
            description.nodes.push(NodeDescription {
                key: node.key().to_string(),
                fixture: node.is_fixture(),
                state: node.state(),
                skip: node.skip(),
                expected_failure: node.expected_failure(),
            });

            for dependency in node.dependencies() {
                let dep_fixture = self.get(dependency).is_some_and(|d| d.is_fixture());
                description.edges.push(EdgeDescription {
                    from: node.key().to_string(),
                    to: dependency.clone(),
                    fixture: node.is_fixture() || dep_fixture,
                    partner: node.partner() == Some(dependency.as_str()),
                });
            }
        }
        description
    }

    /// Render the graph as a strict GraphViz digraph named `name`.
    pub fn to_dot(&self, name: &str) -> String {
        let description = self.describe();

        let mut graph: DiGraph<NodeDescription, EdgeDescription> = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        for node in &description.nodes {
            index.insert(node.key.as_str(), graph.add_node(node.clone()));
        }
        for edge in &description.edges {
            if let (Some(&from), Some(&to)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str())) {
                graph.add_edge(from, to, edge.clone());
            }
        }

        let dot = Dot::with_attr_getters(
            &graph,
            &[Config::NodeNoLabel, Config::EdgeNoLabel, Config::GraphContentOnly],
            &|_, edge| edge_attributes(edge.weight()),
            &|_, (_, node)| node_attributes(node),
        );

        format!("strict digraph \"{}\" {{\n{}}}\n", escape(name), dot)
    }
}

fn node_attributes(node: &NodeDescription) -> String {
    let mut label = escape(&node.key);
    if let Some(state) = node.state {
        label.push_str(&format!("\\n(Result: {state})"));
    }

    let mut attrs = vec![format!("label = \"{label}\"")];
    if node.failed() {
        attrs.push("color = \"red\"".to_string());
    } else if node.fixture {
        attrs.push("color = \"blue\"".to_string());
    }
    match node.state {
        Some(State::Skipped) => attrs.push("style = \"dotted\"".to_string()),
        Some(State::Depfail) => attrs.push("style = \"dashed\"".to_string()),
        _ => {}
    }
    attrs.join(", ")
}

fn edge_attributes(edge: &EdgeDescription) -> String {
    let mut attrs = Vec::new();
    if edge.fixture {
        attrs.push("color = \"blue\"");
    }
    if edge.partner {
        attrs.push("style = \"dotted\"");
    } else if edge.fixture {
        attrs.push("style = \"dashed\"");
    }
    attrs.join(", ")
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
