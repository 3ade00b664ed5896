// SPDX-License-Identifier: MIT

pub mod cache;
pub mod catalog;
pub mod executor;
pub mod graph;
pub mod loader;
pub mod schema;
pub mod transformer;
pub mod types;
pub mod validator;

pub use cache::{CacheEntry, WorkflowCache};
pub use catalog::ComponentCatalog;
pub use executor::{ExecutionOptions, ExecutionResult, RunStatus, WorkflowExecutor};
pub use loader::WorkflowLoader;
pub use types::{Edge, Node, NodeType, WorkflowGraph};
pub use validator::{ValidationResult, WorkflowValidator};
