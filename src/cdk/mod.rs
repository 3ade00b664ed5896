// SPDX-License-Identifier: MIT

//! Component development kit: error types, catalog entries and the
//! component execution capability shared by the workflow engine.

pub mod component;
pub mod error;

pub use component::{
    AIComponent, ComponentExecutor, ConfigField, ConfigSchema, FieldType, Port, SimulatedExecutor,
};
pub use error::{ComponentError, ExecutionError, FlowError, WorkflowError};
