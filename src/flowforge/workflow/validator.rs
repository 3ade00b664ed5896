// SPDX-License-Identifier: MIT

//! Workflow validation
//!
//! Decides whether a graph is executable against a component catalog.
//! Every check runs (except after an empty graph) and all findings are
//! accumulated into one `ValidationResult`; nothing here returns `Err`.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::catalog::ComponentCatalog;
use super::graph::{build_adjacency, find_cycle};
use super::schema::{check_config, ConfigIssue};
use super::types::{Edge, Node, NodeType, WorkflowGraph};

/// A finding that makes the graph invalid
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyWorkflow,
    DuplicateNodeId {
        node_id: String,
    },
    InvalidNodeType {
        node_id: String,
        node_type: String,
    },
    StartHasIncoming {
        node_id: String,
        count: usize,
    },
    EndHasOutgoing {
        node_id: String,
        count: usize,
    },
    /// `componentId` does not resolve in the catalog
    ComponentNotFound {
        node_id: String,
        component_id: String,
    },
    Config {
        node_id: String,
        issue: ConfigIssue,
    },
    DuplicateEdgeId {
        edge_id: String,
    },
    UnknownSource {
        edge_id: String,
        node_id: String,
    },
    UnknownTarget {
        edge_id: String,
        node_id: String,
    },
    InvalidConditions {
        edge_id: String,
        reason: String,
    },
    MissingStartNode,
    CycleDetected {
        path: Vec<String>,
    },
}

impl ValidationError {
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::DuplicateNodeId { node_id }
            | Self::InvalidNodeType { node_id, .. }
            | Self::StartHasIncoming { node_id, .. }
            | Self::EndHasOutgoing { node_id, .. }
            | Self::ComponentNotFound { node_id, .. }
            | Self::Config { node_id, .. } => Some(node_id),
            _ => None,
        }
    }

    pub fn edge_id(&self) -> Option<&str> {
        match self {
            Self::DuplicateEdgeId { edge_id }
            | Self::UnknownSource { edge_id, .. }
            | Self::UnknownTarget { edge_id, .. }
            | Self::InvalidConditions { edge_id, .. } => Some(edge_id),
            _ => None,
        }
    }

    /// Whether this finding prevents a run.
    ///
    /// Catalog-resolution failures only affect their own node, which the
    /// executor records as a per-node error.
    pub fn blocks_execution(&self) -> bool {
        !matches!(self, Self::ComponentNotFound { .. })
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyWorkflow => write!(f, "Workflow must contain at least one node"),
            Self::DuplicateNodeId { node_id } => write!(f, "Duplicate node id '{}'", node_id),
            Self::InvalidNodeType { node_id, node_type } => {
                write!(f, "Node '{}' has invalid type '{}'", node_id, node_type)
            }
            Self::StartHasIncoming { node_id, count } => write!(
                f,
                "Start node '{}' cannot have incoming edges (found {})",
                node_id, count
            ),
            Self::EndHasOutgoing { node_id, count } => write!(
                f,
                "End node '{}' cannot have outgoing edges (found {})",
                node_id, count
            ),
            Self::ComponentNotFound {
                node_id,
                component_id,
            } => write!(
                f,
                "Node '{}' references missing component '{}'",
                node_id, component_id
            ),
            Self::Config { node_id, issue } => write!(f, "Node '{}': {}", node_id, issue),
            Self::DuplicateEdgeId { edge_id } => write!(f, "Duplicate edge id '{}'", edge_id),
            Self::UnknownSource { edge_id, node_id } => write!(
                f,
                "Edge '{}' references unknown source node '{}'",
                edge_id, node_id
            ),
            Self::UnknownTarget { edge_id, node_id } => write!(
                f,
                "Edge '{}' references unknown target node '{}'",
                edge_id, node_id
            ),
            Self::InvalidConditions { edge_id, reason } => {
                write!(f, "Edge '{}' has invalid conditions: {}", edge_id, reason)
            }
            Self::MissingStartNode => write!(f, "Workflow must have a start node"),
            Self::CycleDetected { path } => write!(
                f,
                "Workflow contains cycles (cycle detected: {})",
                path.join(" -> ")
            ),
        }
    }
}

/// A finding that is reported but does not affect validity
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationWarning {
    ComponentTypeMismatch {
        node_id: String,
        node_type: String,
        component_type: String,
    },
    Config {
        node_id: String,
        issue: ConfigIssue,
    },
    /// Neither the node label nor the component description says what it does
    MissingDescription {
        node_id: String,
        component_id: String,
    },
    SelfLoop {
        edge_id: String,
        node_id: String,
    },
    DuplicateEdge {
        edge_id: String,
        duplicate_of: String,
    },
    MultipleStartNodes {
        count: usize,
    },
    MissingEndNode,
    OrphanedNode {
        node_id: String,
    },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ComponentTypeMismatch {
                node_id,
                node_type,
                component_type,
            } => write!(
                f,
                "Node '{}' of type '{}' uses a component of type '{}'",
                node_id, node_type, component_type
            ),
            Self::Config { node_id, issue } => write!(f, "Node '{}': {}", node_id, issue),
            Self::MissingDescription {
                node_id,
                component_id,
            } => write!(
                f,
                "Node '{}' has no label and component '{}' has no description",
                node_id, component_id
            ),
            Self::SelfLoop { edge_id, node_id } => {
                write!(f, "Edge '{}' is a self-loop on node '{}'", edge_id, node_id)
            }
            Self::DuplicateEdge {
                edge_id,
                duplicate_of,
            } => write!(
                f,
                "Edge '{}' duplicates edge '{}' (same source and target)",
                edge_id, duplicate_of
            ),
            Self::MultipleStartNodes { count } => {
                write!(f, "Workflow has multiple start nodes ({})", count)
            }
            Self::MissingEndNode => write!(f, "Workflow has no end node"),
            Self::OrphanedNode { node_id } => write!(
                f,
                "Node '{}' is an orphaned node with no connections",
                node_id
            ),
        }
    }
}

/// Snapshot of one validation pass. Recomputed on every call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub node_errors: HashMap<String, Vec<String>>,
    pub edge_errors: HashMap<String, Vec<String>>,
    #[serde(skip)]
    error_issues: Vec<ValidationError>,
    #[serde(skip)]
    warning_issues: Vec<ValidationWarning>,
}

impl ValidationResult {
    fn push_error(&mut self, error: ValidationError) {
        let message = error.to_string();
        if let Some(node_id) = error.node_id() {
            self.node_errors
                .entry(node_id.to_string())
                .or_default()
                .push(message.clone());
        }
        if let Some(edge_id) = error.edge_id() {
            self.edge_errors
                .entry(edge_id.to_string())
                .or_default()
                .push(message.clone());
        }
        self.errors.push(message);
        self.error_issues.push(error);
    }

    fn push_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning.to_string());
        self.warning_issues.push(warning);
    }

    fn finish(mut self) -> Self {
        self.is_valid = self.errors.is_empty();
        self
    }

    /// Typed errors, in the order they were found
    pub fn error_issues(&self) -> &[ValidationError] {
        &self.error_issues
    }

    /// Typed warnings, in the order they were found
    pub fn warning_issues(&self) -> &[ValidationWarning] {
        &self.warning_issues
    }

    /// Messages of the errors that prevent a run
    pub fn blocking_errors(&self) -> Vec<String> {
        self.error_issues
            .iter()
            .filter(|e| e.blocks_execution())
            .map(|e| e.to_string())
            .collect()
    }
}

/// Validates graphs against a component catalog
#[derive(Debug, Clone)]
pub struct WorkflowValidator {
    catalog: ComponentCatalog,
}

impl WorkflowValidator {
    pub fn new(catalog: ComponentCatalog) -> Self {
        Self { catalog }
    }

    /// Run every check and return the accumulated result
    pub fn validate(&self, graph: &WorkflowGraph) -> ValidationResult {
        validate_workflow(graph, &self.catalog)
    }
}

/// Validate a workflow graph.
///
/// Checks run in a fixed order: non-empty, per-node, per-edge, then
/// structural (start/end counts, cycles, orphans).
pub fn validate_workflow(graph: &WorkflowGraph, catalog: &ComponentCatalog) -> ValidationResult {
    let mut result = ValidationResult::default();

    if graph.nodes.is_empty() {
        result.push_error(ValidationError::EmptyWorkflow);
        return result.finish();
    }

    validate_nodes(graph, catalog, &mut result);
    validate_edges(graph, &mut result);
    validate_structure(graph, &mut result);

    let result = result.finish();
    log::debug!(
        "Validated workflow with {} nodes: {} errors, {} warnings",
        graph.nodes.len(),
        result.errors.len(),
        result.warnings.len()
    );
    result
}

fn validate_nodes(
    graph: &WorkflowGraph,
    catalog: &ComponentCatalog,
    result: &mut ValidationResult,
) {
    let mut seen: HashSet<&str> = HashSet::new();

    for node in &graph.nodes {
        if !seen.insert(node.id.as_str()) {
            result.push_error(ValidationError::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }

        if !node.node_type.is_known() {
            result.push_error(ValidationError::InvalidNodeType {
                node_id: node.id.clone(),
                node_type: node.node_type.to_string(),
            });
        }

        check_topology(node, &graph.edges, result);
        check_component(node, catalog, result);
    }
}

fn check_topology(node: &Node, edges: &[Edge], result: &mut ValidationResult) {
    match node.node_type {
        NodeType::Start => {
            let count = edges.iter().filter(|e| e.target == node.id).count();
            if count > 0 {
                result.push_error(ValidationError::StartHasIncoming {
                    node_id: node.id.clone(),
                    count,
                });
            }
        }
        NodeType::End => {
            let count = edges.iter().filter(|e| e.source == node.id).count();
            if count > 0 {
                result.push_error(ValidationError::EndHasOutgoing {
                    node_id: node.id.clone(),
                    count,
                });
            }
        }
        _ => {}
    }
}

fn check_component(node: &Node, catalog: &ComponentCatalog, result: &mut ValidationResult) {
    let Some(component_id) = &node.data.component_id else {
        return;
    };

    let Some(component) = catalog.get(component_id) else {
        result.push_error(ValidationError::ComponentNotFound {
            node_id: node.id.clone(),
            component_id: component_id.clone(),
        });
        return;
    };

    if component.component_type != node.node_type.as_str() {
        result.push_warning(ValidationWarning::ComponentTypeMismatch {
            node_id: node.id.clone(),
            node_type: node.node_type.to_string(),
            component_type: component.component_type.clone(),
        });
    }

    if is_blank(node.data.label.as_deref()) && is_blank(component.description.as_deref()) {
        result.push_warning(ValidationWarning::MissingDescription {
            node_id: node.id.clone(),
            component_id: component.id.clone(),
        });
    }

    for issue in check_config(&node.config(), &component.config_schema) {
        if issue.is_error() {
            result.push_error(ValidationError::Config {
                node_id: node.id.clone(),
                issue,
            });
        } else {
            result.push_warning(ValidationWarning::Config {
                node_id: node.id.clone(),
                issue,
            });
        }
    }
}

fn is_blank(text: Option<&str>) -> bool {
    text.map_or(true, |t| t.trim().is_empty())
}

fn validate_edges(graph: &WorkflowGraph, result: &mut ValidationResult) {
    let node_ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    let mut edge_ids: HashSet<&str> = HashSet::new();
    let mut pairs: HashMap<(&str, &str), &str> = HashMap::new();

    for edge in &graph.edges {
        if !edge_ids.insert(edge.id.as_str()) {
            result.push_error(ValidationError::DuplicateEdgeId {
                edge_id: edge.id.clone(),
            });
        }
        if !node_ids.contains(edge.source.as_str()) {
            result.push_error(ValidationError::UnknownSource {
                edge_id: edge.id.clone(),
                node_id: edge.source.clone(),
            });
        }
        if !node_ids.contains(edge.target.as_str()) {
            result.push_error(ValidationError::UnknownTarget {
                edge_id: edge.id.clone(),
                node_id: edge.target.clone(),
            });
        }

        if edge.is_self_loop() {
            result.push_warning(ValidationWarning::SelfLoop {
                edge_id: edge.id.clone(),
                node_id: edge.source.clone(),
            });
        }

        let key = (edge.source.as_str(), edge.target.as_str());
        match pairs.get(&key) {
            Some(first) => result.push_warning(ValidationWarning::DuplicateEdge {
                edge_id: edge.id.clone(),
                duplicate_of: first.to_string(),
            }),
            None => {
                pairs.insert(key, edge.id.as_str());
            }
        }

        if let Some(reason) = check_conditions(edge) {
            result.push_error(ValidationError::InvalidConditions {
                edge_id: edge.id.clone(),
                reason,
            });
        }
    }
}

fn check_conditions(edge: &Edge) -> Option<String> {
    let conditions = edge.data.conditions.as_ref()?;

    if conditions.is_empty() {
        return Some("conditions must not be empty".to_string());
    }

    let (key, _) = conditions
        .iter()
        .find(|(_, v)| !(v.is_string() || v.is_number() || v.is_boolean()))?;
    let message = format!("condition '{key}' must be a string, number or boolean");
    Some(message)
}

fn validate_structure(graph: &WorkflowGraph, result: &mut ValidationResult) {
    let starts = graph
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Start)
        .count();
    match starts {
        0 => result.push_error(ValidationError::MissingStartNode),
        1 => {}
        count => result.push_warning(ValidationWarning::MultipleStartNodes { count }),
    }

    if !graph.nodes.iter().any(|n| n.node_type == NodeType::End) {
        result.push_warning(ValidationWarning::MissingEndNode);
    }

    let adjacency = build_adjacency(&graph.nodes, &graph.edges);
    if let Some(path) = find_cycle(&graph.nodes, &adjacency) {
        result.push_error(ValidationError::CycleDetected { path });
    }

    let connected: HashSet<&str> = graph
        .edges
        .iter()
        .flat_map(|e| [e.source.as_str(), e.target.as_str()])
        .collect();
    for node in &graph.nodes {
        if !connected.contains(node.id.as_str()) {
            result.push_warning(ValidationWarning::OrphanedNode {
                node_id: node.id.clone(),
            });
        }
    }
}
