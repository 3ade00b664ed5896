// SPDX-License-Identifier: MIT

//! Typed error handling for flowforge-rs
//!
//! Validation problems are never errors here: they are reported as values
//! in `ValidationResult`. These types cover configuration, loading,
//! invariant violations and per-node execution failures.

use thiserror::Error;

/// Top-level error type for flowforge-rs
#[derive(Debug, Error)]
pub enum FlowError {
    /// Node id not present in the graph
    #[error("Node '{node_id}' not found")]
    NodeNotFound { node_id: String },

    /// Node references a component the catalog does not know
    #[error("Component '{component_id}' not found for node '{node_id}'")]
    ComponentNotFound {
        node_id: String,
        component_id: String,
    },

    /// Configuration errors (invalid env values, bad options)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Workflow invariant violations
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Node execution failures
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// Workflow-level invariant violations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorkflowError {
    /// A directed cycle was found while ordering the graph.
    /// Validation rejects cyclic graphs, so reaching this means it was bypassed.
    #[error("Cycle detected: {0:?}")]
    CycleDetected(Vec<String>),
}

/// Per-node execution failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecutionError {
    /// The component did not finish within the node timeout
    #[error("Node '{node_id}' timed out after {timeout_ms}ms")]
    Timeout { node_id: String, timeout_ms: u64 },

    /// The component reported a failure
    #[error("Node '{node_id}' failed: {message}")]
    Component { node_id: String, message: String },

    /// Every attempt failed
    #[error("Node '{node_id}' failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        node_id: String,
        attempts: u32,
        last_error: Box<ExecutionError>,
    },
}

impl ExecutionError {
    /// The node this failure is attributed to
    pub fn node_id(&self) -> &str {
        match self {
            Self::Timeout { node_id, .. }
            | Self::Component { node_id, .. }
            | Self::RetriesExhausted { node_id, .. } => node_id,
        }
    }
}

/// Errors returned by a `ComponentExecutor`
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ComponentError {
    /// The component ran and failed
    #[error("{0}")]
    Failed(String),

    /// The component rejected its inputs or config
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl FlowError {
    /// Create a node not found error
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            node_id: node_id.into(),
        }
    }

    /// Create a component not found error
    pub fn component_not_found(
        node_id: impl Into<String>,
        component_id: impl Into<String>,
    ) -> Self {
        Self::ComponentNotFound {
            node_id: node_id.into(),
            component_id: component_id.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl ComponentError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_exhausted_message_includes_last_error() {
        let err = ExecutionError::RetriesExhausted {
            node_id: "n1".to_string(),
            attempts: 3,
            last_error: Box::new(ExecutionError::Timeout {
                node_id: "n1".to_string(),
                timeout_ms: 500,
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("after 3 attempts"));
        assert!(msg.contains("timed out after 500ms"));
        assert_eq!(err.node_id(), "n1");
    }

    #[test]
    fn test_flow_error_from_workflow_error() {
        let err: FlowError = WorkflowError::CycleDetected(vec!["a".into(), "b".into()]).into();
        assert!(err.to_string().contains("Cycle detected"));
    }
}
