// SPDX-License-Identifier: MIT

//! Workflow loader - YAML/JSON file loading and parsing
//!
//! JSON is a subset of YAML, so both formats go through `serde_yaml`.

use std::fs;
use std::path::Path;

use super::catalog::ComponentCatalog;
use super::types::WorkflowGraph;
use crate::cdk::component::AIComponent;
use crate::cdk::error::FlowError;

/// Loads workflow graphs and component catalogs from files
pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a workflow graph (`{nodes, edges}`) from a file
    pub fn load_workflow<P: AsRef<Path>>(&self, path: P) -> Result<WorkflowGraph, FlowError> {
        let path = path.as_ref();
        log::debug!("Loading workflow from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::parse_workflow(&content)
    }

    /// Parse a workflow graph from a YAML or JSON string
    pub fn parse_workflow(content: &str) -> Result<WorkflowGraph, FlowError> {
        let graph: WorkflowGraph = serde_yaml::from_str(content)?;
        Ok(graph)
    }

    /// Load a component catalog (a list of components) from a file
    pub fn load_catalog<P: AsRef<Path>>(&self, path: P) -> Result<ComponentCatalog, FlowError> {
        let path = path.as_ref();
        log::debug!("Loading component catalog from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::parse_catalog(&content)
    }

    /// Parse a component catalog from a YAML or JSON string
    pub fn parse_catalog(content: &str) -> Result<ComponentCatalog, FlowError> {
        let components: Vec<AIComponent> = serde_yaml::from_str(content)?;
        Ok(ComponentCatalog::new(components))
    }
}

impl Default for WorkflowLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flowforge::workflow::types::NodeType;
    use serde_json::json;

    #[test]
    fn test_parse_yaml_workflow() {
        let yaml = r#"
nodes:
  - id: start
    type: start
    position: { x: 0, y: 0 }
    data:
      componentId: trigger
      label: Start
  - id: summarize
    type: action
    position: { x: 200, y: 0 }
    data:
      componentId: llm
      config:
        temperature: 0.2
edges:
  - id: e1
    source: start
    target: summarize
"#;
        let graph = WorkflowLoader::parse_workflow(yaml).unwrap();

        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[0].node_type, NodeType::Start);
        assert_eq!(graph.nodes[0].data.label.as_deref(), Some("Start"));
        let config = graph.nodes[1].config();
        assert_eq!(config.get("temperature"), Some(&json!(0.2)));
        assert_eq!(graph.edges[0].source, "start");
    }

    #[test]
    fn test_parse_json_workflow_with_unknown_type() {
        let json = r#"{
            "nodes": [
                {"id": "a", "type": "webhook", "position": {"x": 1, "y": 2}, "data": {}}
            ],
            "edges": []
        }"#;
        let graph = WorkflowLoader::parse_workflow(json).unwrap();
        assert_eq!(
            graph.nodes[0].node_type,
            NodeType::Unknown("webhook".to_string())
        );
    }

    #[test]
    fn test_parse_catalog() {
        let yaml = r#"
- id: llm
  name: LLM
  type: action
  inputs:
    - name: prompt
      type: string
      required: true
  outputs: []
  configSchema:
    required: [model]
    properties:
      model:
        type: string
        enum: [small, large]
      temperature:
        type: number
        min: 0
        max: 2
"#;
        let catalog = WorkflowLoader::parse_catalog(yaml).unwrap();

        let llm = catalog.get("llm").unwrap();
        assert_eq!(llm.component_type, "action");
        assert_eq!(llm.config_schema.required, vec!["model"]);
        assert_eq!(llm.config_schema.properties["temperature"].max, Some(2.0));
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let err = WorkflowLoader::parse_workflow("nodes: [unclosed").unwrap_err();
        assert!(matches!(err, FlowError::Yaml(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = WorkflowLoader::new()
            .load_workflow("/nonexistent/workflow.yaml")
            .unwrap_err();
        assert!(matches!(err, FlowError::Io(_)));
    }
}
