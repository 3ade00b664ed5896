// SPDX-License-Identifier: MIT

//! Graph workflow executor
//!
//! Runs a validated graph in topological order. Each node invokes its
//! catalog component through a `ComponentExecutor`, wrapped in a timeout
//! and a linear-backoff retry loop. A failing node is recorded and the run
//! goes on; its dependents receive `null` for its input.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::catalog::ComponentCatalog;
use super::graph::{
    build_adjacency, build_reverse_adjacency, dependency_levels, topological_order, Adjacency,
};
use super::types::{Node, WorkflowGraph};
use super::validator::WorkflowValidator;
use crate::cdk::component::{AIComponent, ComponentExecutor};
use crate::cdk::error::{ExecutionError, FlowError};
use crate::flowforge::config::EngineConfig;

/// Key used in `errors`/`warnings` for findings not tied to one node
pub const WORKFLOW_KEY: &str = "workflow";

/// Per-run execution options
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOptions {
    /// Run independent nodes of a dependency level concurrently
    pub parallel: bool,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Total attempts per node; 0 is treated as 1
    pub retry: u32,
    /// Linear backoff unit between attempts
    pub retry_backoff: Duration,
}

impl ExecutionOptions {
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    fn attempts(&self) -> u32 {
        self.retry.max(1)
    }

    /// Wait after failed attempt `attempt`, saturating instead of overflowing
    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .checked_mul(attempt)
            .unwrap_or(Duration::MAX)
    }
}

impl From<&EngineConfig> for ExecutionOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            parallel: false,
            timeout: config.timeout,
            retry: config.retry,
            retry_backoff: config.retry_backoff,
        }
    }
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// Run lifecycle: `idle -> running -> completed | failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMetadata {
    pub execution_time_ms: u64,
    pub node_count: usize,
    pub edge_count: usize,
    /// Total retries across all nodes, present when any node retried
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    /// Present when the run used parallel levels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_execution: Option<bool>,
    pub started_at: DateTime<Utc>,
}

/// Outcome of a run. Outputs of successful nodes are kept even when
/// other nodes failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub status: RunStatus,
    pub output: HashMap<String, Value>,
    pub errors: HashMap<String, Vec<String>>,
    pub warnings: HashMap<String, Vec<String>>,
    pub metadata: ExecutionMetadata,
}

impl ExecutionResult {
    /// Result for a graph that failed validation; nothing was run
    fn rejected(
        errors: Vec<String>,
        warnings: Vec<String>,
        graph: &WorkflowGraph,
        started_at: DateTime<Utc>,
    ) -> Self {
        let mut warning_map = HashMap::new();
        if !warnings.is_empty() {
            warning_map.insert(WORKFLOW_KEY.to_string(), warnings);
        }
        Self {
            success: false,
            status: RunStatus::Failed,
            output: HashMap::new(),
            errors: HashMap::from([(WORKFLOW_KEY.to_string(), errors)]),
            warnings: warning_map,
            metadata: ExecutionMetadata {
                execution_time_ms: 0,
                node_count: graph.nodes.len(),
                edge_count: graph.edges.len(),
                retry_count: None,
                parallel_execution: None,
                started_at,
            },
        }
    }
}

/// Result of running one node inside a run
struct NodeOutcome {
    result: Result<Value, String>,
    retries: u32,
}

/// Accumulated state of a run in progress
#[derive(Default)]
struct RunState {
    outputs: HashMap<String, Value>,
    errors: HashMap<String, Vec<String>>,
    retries: u32,
}

impl RunState {
    fn record(&mut self, node_id: &str, outcome: NodeOutcome) {
        self.retries += outcome.retries;
        match outcome.result {
            Ok(output) => {
                log::info!("Node {} completed", node_id);
                self.outputs.insert(node_id.to_string(), output);
            }
            Err(message) => {
                log::error!("Node {} failed: {}", node_id, message);
                self.errors
                    .entry(node_id.to_string())
                    .or_default()
                    .push(message);
            }
        }
    }
}

/// Executes workflow graphs against a component catalog
pub struct WorkflowExecutor {
    catalog: ComponentCatalog,
    validator: WorkflowValidator,
    runtime: Arc<dyn ComponentExecutor>,
}

impl WorkflowExecutor {
    pub fn new(catalog: ComponentCatalog, runtime: Arc<dyn ComponentExecutor>) -> Self {
        Self {
            validator: WorkflowValidator::new(catalog.clone()),
            catalog,
            runtime,
        }
    }

    /// Validate and run a whole graph.
    ///
    /// Returns `Err` only for invariant violations, e.g. a cycle that
    /// validation should have rejected. Node failures are reported in the
    /// result's `errors` map.
    pub async fn execute(
        &self,
        graph: &WorkflowGraph,
        options: &ExecutionOptions,
    ) -> Result<ExecutionResult, FlowError> {
        let started_at = Utc::now();
        let validation = self.validator.validate(graph);

        let blocking = validation.blocking_errors();
        if !blocking.is_empty() {
            log::warn!(
                "Workflow rejected by validation with {} errors",
                blocking.len()
            );
            return Ok(ExecutionResult::rejected(
                blocking,
                validation.warnings,
                graph,
                started_at,
            ));
        }

        let start = Instant::now();
        log::info!(
            "Workflow run: {:?} -> {:?} ({} nodes, parallel: {})",
            RunStatus::Idle,
            RunStatus::Running,
            graph.nodes.len(),
            options.parallel
        );

        let adjacency = build_adjacency(&graph.nodes, &graph.edges);
        let reverse = build_reverse_adjacency(&graph.nodes, &graph.edges);
        let order = topological_order(&graph.nodes, &adjacency)?;
        let by_id: HashMap<&str, &Node> = graph
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n))
            .collect();

        let mut state = RunState::default();

        if options.parallel {
            let levels = dependency_levels(&order, &reverse);
            for (depth, level) in levels.iter().enumerate() {
                log::debug!("Level {}: executing {} nodes", depth, level.len());
                let outputs = &state.outputs;
                let runs = level
                    .iter()
                    .map(|id| self.run_node(&by_id, id, &reverse, outputs, options));
                let outcomes = join_all(runs).await;

                for (id, outcome) in level.iter().zip(outcomes) {
                    state.record(id, outcome);
                }
            }
        } else {
            for id in &order {
                let outcome = self
                    .run_node(&by_id, id, &reverse, &state.outputs, options)
                    .await;
                state.record(id, outcome);
            }
        }

        let success = state.errors.is_empty();
        let status = if success {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        log::info!(
            "Workflow run: {:?} -> {:?} ({} succeeded, {} failed)",
            RunStatus::Running,
            status,
            state.outputs.len(),
            state.errors.len()
        );

        let mut warnings = HashMap::new();
        if !validation.warnings.is_empty() {
            warnings.insert(WORKFLOW_KEY.to_string(), validation.warnings);
        }

        Ok(ExecutionResult {
            success,
            status,
            output: state.outputs,
            errors: state.errors,
            warnings,
            metadata: ExecutionMetadata {
                execution_time_ms: start.elapsed().as_millis() as u64,
                node_count: graph.nodes.len(),
                edge_count: graph.edges.len(),
                retry_count: (state.retries > 0).then_some(state.retries),
                parallel_execution: options.parallel.then_some(true),
                started_at,
            },
        })
    }

    /// Run a single node with explicit inputs (dry run).
    ///
    /// Same timeout and retry behaviour as within a run. Nodes without a
    /// component pass their inputs through.
    pub async fn execute_node(
        &self,
        graph: &WorkflowGraph,
        node_id: &str,
        inputs: Value,
        options: &ExecutionOptions,
    ) -> Result<Value, FlowError> {
        let node = graph
            .node(node_id)
            .ok_or_else(|| FlowError::node_not_found(node_id))?;

        let Some(component_id) = &node.data.component_id else {
            return Ok(inputs);
        };
        let component = self
            .catalog
            .get(component_id)
            .ok_or_else(|| FlowError::component_not_found(node_id, component_id))?;

        let (result, _) = self.invoke(node, component, inputs, options).await;
        result.map_err(FlowError::from)
    }

    async fn run_node(
        &self,
        nodes: &HashMap<&str, &Node>,
        node_id: &str,
        reverse: &Adjacency,
        outputs: &HashMap<String, Value>,
        options: &ExecutionOptions,
    ) -> NodeOutcome {
        let Some(node) = nodes.get(node_id).copied() else {
            return NodeOutcome {
                result: Err(FlowError::node_not_found(node_id).to_string()),
                retries: 0,
            };
        };

        log::info!("Executing node: {}", node_id);
        let inputs = gather_inputs(node_id, reverse, outputs);

        let Some(component_id) = &node.data.component_id else {
            return NodeOutcome {
                result: Ok(inputs),
                retries: 0,
            };
        };

        let Some(component) = self.catalog.get(component_id) else {
            let error = FlowError::component_not_found(node_id, component_id);
            return NodeOutcome {
                result: Err(error.to_string()),
                retries: 0,
            };
        };

        let (result, retries) = self.invoke(node, component, inputs, options).await;
        NodeOutcome {
            result: result.map_err(|e| e.to_string()),
            retries,
        }
    }

    /// Invoke a component with timeout and retry; returns the result and
    /// the number of retries used
    async fn invoke(
        &self,
        node: &Node,
        component: &AIComponent,
        inputs: Value,
        options: &ExecutionOptions,
    ) -> (Result<Value, ExecutionError>, u32) {
        let attempts = options.attempts();
        let config = node.config();
        let mut attempt = 1;

        loop {
            match self
                .attempt(node, component, inputs.clone(), &config, options.timeout)
                .await
            {
                Ok(output) => return (Ok(output), attempt - 1),
                Err(e) if attempt >= attempts => {
                    let err = if attempts > 1 {
                        ExecutionError::RetriesExhausted {
                            node_id: node.id.clone(),
                            attempts,
                            last_error: Box::new(e),
                        }
                    } else {
                        e
                    };
                    return (Err(err), attempt - 1);
                }
                Err(e) => {
                    let backoff = options.backoff(attempt);
                    log::warn!(
                        "Node {} attempt {}/{} failed: {}; retrying in {:?}",
                        node.id,
                        attempt,
                        attempts,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(
        &self,
        node: &Node,
        component: &AIComponent,
        inputs: Value,
        config: &Map<String, Value>,
        timeout: Duration,
    ) -> Result<Value, ExecutionError> {
        match tokio::time::timeout(timeout, self.runtime.execute(component, inputs, config)).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ExecutionError::Component {
                node_id: node.id.clone(),
                message: e.to_string(),
            }),
            Err(_) => Err(ExecutionError::Timeout {
                node_id: node.id.clone(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

/// Collect a node's inputs from its direct predecessors, keyed by
/// predecessor id.
///
/// A predecessor output of the form `{"output": x}` forwards `x`; anything
/// else is forwarded as is. Predecessors without output give `null`.
fn gather_inputs(node_id: &str, reverse: &Adjacency, outputs: &HashMap<String, Value>) -> Value {
    let mut inputs = Map::new();

    for parent in reverse.get(node_id).into_iter().flatten() {
        if parent == node_id {
            continue;
        }
        let value = match outputs.get(parent) {
            Some(output) => output.get("output").unwrap_or(output).clone(),
            None => Value::Null,
        };
        inputs.insert(parent.clone(), value);
    }

    Value::Object(inputs)
}
