// SPDX-License-Identifier: MIT

//! Workflow graph type definitions
//!
//! Graphs are flat node and edge lists with id-based references, which
//! keeps them serializable in the same shape the builder UI produces.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A workflow graph as supplied by the caller
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, Default, PartialEq)]
pub struct WorkflowGraph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowGraph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// Look up a node by id
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// A node in the workflow graph
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Node {
    /// Unique identifier within the graph
    pub id: String,
    /// Node kind; decides legal edge topology
    #[serde(rename = "type")]
    #[schemars(with = "String")]
    pub node_type: NodeType,
    /// Canvas position, ignored by the engine
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub data: NodeData,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            position: Position::default(),
            data: NodeData::default(),
        }
    }

    /// Set the referenced catalog component
    pub fn with_component(mut self, component_id: impl Into<String>) -> Self {
        self.data.component_id = Some(component_id.into());
        self
    }

    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.data.config = Some(config);
        self
    }

    /// The node's config, empty when none was given
    pub fn config(&self) -> Map<String, Value> {
        self.data.config.clone().unwrap_or_default()
    }
}

/// Payload of a node
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    /// Catalog component this node is a usage of
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Component configuration, checked against the component's schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, Default, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Closed set of node kinds.
///
/// Unrecognised strings are kept as `Unknown` so validation can report
/// them instead of deserialization rejecting the whole graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    Start,
    End,
    Action,
    Decision,
    Data,
    Custom,
    Unknown(String),
}

impl NodeType {
    pub fn as_str(&self) -> &str {
        match self {
            NodeType::Start => "start",
            NodeType::End => "end",
            NodeType::Action => "action",
            NodeType::Decision => "decision",
            NodeType::Data => "data",
            NodeType::Custom => "custom",
            NodeType::Unknown(s) => s,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, NodeType::Unknown(_))
    }
}

impl From<String> for NodeType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "start" => NodeType::Start,
            "end" => NodeType::End,
            "action" => NodeType::Action,
            "decision" => NodeType::Decision,
            "data" => NodeType::Data,
            "custom" => NodeType::Custom,
            _ => NodeType::Unknown(s),
        }
    }
}

impl From<&str> for NodeType {
    fn from(s: &str) -> Self {
        NodeType::from(s.to_string())
    }
}

impl From<NodeType> for String {
    fn from(t: NodeType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed connection between two nodes
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default)]
    pub data: EdgeData,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            data: EdgeData::default(),
        }
    }

    pub fn with_conditions(mut self, conditions: Map<String, Value>) -> Self {
        self.data.conditions = Some(conditions);
        self
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Payload of an edge
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, Default, PartialEq)]
pub struct EdgeData {
    /// Branch conditions; when present must be non-empty with primitive values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Map<String, Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_type_roundtrip_known_and_unknown() {
        let node: Node = serde_json::from_value(json!({
            "id": "n1",
            "type": "decision",
            "position": {"x": 1.0, "y": 2.0},
            "data": {"componentId": "c1"}
        }))
        .unwrap();
        assert_eq!(node.node_type, NodeType::Decision);
        assert_eq!(node.data.component_id.as_deref(), Some("c1"));

        let odd: Node = serde_json::from_value(json!({"id": "n2", "type": "loop"})).unwrap();
        assert_eq!(odd.node_type, NodeType::Unknown("loop".to_string()));
        assert!(!odd.node_type.is_known());
        assert_eq!(serde_json::to_value(&odd).unwrap()["type"], "loop");
    }

    #[test]
    fn test_edge_deserialize_camel_case_handles() {
        let edge: Edge = serde_json::from_value(json!({
            "id": "e1",
            "source": "a",
            "target": "b",
            "sourceHandle": "out",
            "data": {"conditions": {"status": "ok"}}
        }))
        .unwrap();
        assert_eq!(edge.source_handle.as_deref(), Some("out"));
        assert!(edge.target_handle.is_none());
        assert_eq!(edge.data.conditions.unwrap()["status"], "ok");
    }

    #[test]
    fn test_graph_from_yaml() {
        let yaml = r#"
            nodes:
              - id: start
                type: start
              - id: work
                type: action
                data:
                  componentId: summarizer
                  config:
                    model: small
            edges:
              - id: e1
                source: start
                target: work
        "#;
        let graph: WorkflowGraph = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.node("work").unwrap().config()["model"], "small");
        assert!(graph.node("missing").is_none());
    }
}
