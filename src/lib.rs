// SPDX-License-Identifier: MIT

//! flowforge-rs: a workflow graph engine for AI component pipelines.
//!
//! `cdk` holds the shared error types, catalog component types and the
//! `ComponentExecutor` capability. `flowforge` holds engine configuration
//! and the workflow modules: validation, transformation, execution and
//! caching of node/edge graphs.

pub mod cdk;
pub mod flowforge;
