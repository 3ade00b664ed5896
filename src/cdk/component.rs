// SPDX-License-Identifier: MIT

//! Component catalog types and the execution capability
//!
//! An `AIComponent` is a read-only catalog entry supplied by an external
//! registry. Nodes reference components by id; the engine never mutates
//! them. Running a component goes through the `ComponentExecutor` trait so
//! real backends and test doubles plug in the same way.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;

use super::error::ComponentError;

/// A catalog entry describing a reusable AI component
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AIComponent {
    /// Unique identifier referenced by `node.data.componentId`
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Component kind, compared against the node type
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub inputs: Vec<Port>,
    #[serde(default)]
    pub outputs: Vec<Port>,
    #[serde(default)]
    pub config_schema: ConfigSchema,
}

/// A named, typed input or output of a component
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Port {
    pub name: String,
    #[serde(rename = "type")]
    pub port_type: String,
    #[serde(default)]
    pub required: bool,
}

/// Constraints on a node's `config` map
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, Default, PartialEq)]
pub struct ConfigSchema {
    /// Fields that must be present
    #[serde(default)]
    pub required: Vec<String>,
    /// Known fields and their constraints
    #[serde(default)]
    pub properties: HashMap<String, ConfigField>,
}

/// Constraints on a single config field
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, Default, PartialEq)]
pub struct ConfigField {
    #[serde(rename = "type", default)]
    pub field_type: Option<FieldType>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(rename = "enum", default)]
    pub allowed: Option<Vec<Value>>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Primitive types a config field may declare
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    /// Check whether a JSON value has this type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }
}

/// Capability for running a component.
///
/// `inputs` is an object keyed by predecessor node id. Implementations must
/// be cancel-safe: the engine drops the future when a node times out.
#[async_trait]
pub trait ComponentExecutor: Send + Sync {
    async fn execute(
        &self,
        component: &AIComponent,
        inputs: Value,
        config: &Map<String, Value>,
    ) -> Result<Value, ComponentError>;
}

/// Simulated component runtime.
///
/// Waits for a fixed latency and echoes what it was given under an
/// `output` key. Used by the CLI `run` command.
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    latency: Duration,
}

impl SimulatedExecutor {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

#[async_trait]
impl ComponentExecutor for SimulatedExecutor {
    async fn execute(
        &self,
        component: &AIComponent,
        inputs: Value,
        config: &Map<String, Value>,
    ) -> Result<Value, ComponentError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        Ok(json!({
            "output": {
                "componentId": component.id,
                "type": component.component_type,
                "inputs": inputs,
                "config": config,
            }
        }))
    }
}
