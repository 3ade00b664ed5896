use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use flowforge_rs::cdk::component::SimulatedExecutor;
use flowforge_rs::flowforge::config::EngineConfig;
use flowforge_rs::flowforge::workflow::executor::{ExecutionOptions, WorkflowExecutor};
use flowforge_rs::flowforge::workflow::loader::WorkflowLoader;
use flowforge_rs::flowforge::workflow::transformer;
use flowforge_rs::flowforge::workflow::types::WorkflowGraph;
use flowforge_rs::flowforge::workflow::validator::WorkflowValidator;
use serde::Serialize;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a workflow against a component catalog
    Validate {
        /// Path to the workflow file (YAML or JSON)
        #[arg(short, long)]
        workflow: PathBuf,

        /// Path to the component catalog file
        #[arg(short, long)]
        catalog: PathBuf,
    },
    /// Validate and run a workflow with simulated components
    Run {
        /// Path to the workflow file (YAML or JSON)
        #[arg(short, long)]
        workflow: PathBuf,

        /// Path to the component catalog file
        #[arg(short, long)]
        catalog: PathBuf,

        /// Run independent nodes concurrently
        #[arg(long)]
        parallel: bool,

        /// Per-node timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Total attempts per node
        #[arg(long)]
        retry: Option<u32>,
    },
    /// Print node counts, types and complexity of a workflow
    Metadata {
        #[arg(short, long)]
        workflow: PathBuf,
    },
    /// Print the optimized workflow as a hierarchy
    Hierarchy {
        #[arg(short, long)]
        workflow: PathBuf,
    },
    /// Print the JSON Schema of the workflow file format
    Schema,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = EngineConfig::from_env()?;
    let loader = WorkflowLoader::new();

    match args.command {
        Commands::Validate { workflow, catalog } => {
            let graph = loader
                .load_workflow(&workflow)
                .with_context(|| format!("loading workflow {}", workflow.display()))?;
            let catalog = loader
                .load_catalog(&catalog)
                .with_context(|| format!("loading catalog {}", catalog.display()))?;

            let result = WorkflowValidator::new(catalog).validate(&graph);
            print_json(&result)?;

            if !result.is_valid {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Run {
            workflow,
            catalog,
            parallel,
            timeout_ms,
            retry,
        } => {
            let graph = loader
                .load_workflow(&workflow)
                .with_context(|| format!("loading workflow {}", workflow.display()))?;
            let catalog = loader
                .load_catalog(&catalog)
                .with_context(|| format!("loading catalog {}", catalog.display()))?;

            let mut options = ExecutionOptions::from(&config).with_parallel(parallel);
            if let Some(ms) = timeout_ms {
                options = options.with_timeout(Duration::from_millis(ms));
            }
            if let Some(retry) = retry {
                options = options.with_retry(retry);
            }

            log::info!(
                "Running workflow {} ({} components in catalog)",
                workflow.display(),
                catalog.len()
            );
            let runtime = Arc::new(SimulatedExecutor::new(config.simulated_latency));
            let executor = WorkflowExecutor::new(catalog, runtime);
            let result = executor.execute(&graph, &options).await?;
            print_json(&result)?;

            if !result.success {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Metadata { workflow } => {
            let graph = loader
                .load_workflow(&workflow)
                .with_context(|| format!("loading workflow {}", workflow.display()))?;
            print_json(&transformer::generate_metadata(&graph.nodes, &graph.edges))?;
        }
        Commands::Hierarchy { workflow } => {
            let graph = loader
                .load_workflow(&workflow)
                .with_context(|| format!("loading workflow {}", workflow.display()))?;
            let optimized = transformer::optimize(&graph);
            let hierarchy = transformer::to_hierarchy(&optimized.nodes, &optimized.edges);
            print_json(&hierarchy)?;
        }
        Commands::Schema => {
            print_json(&schemars::schema_for!(WorkflowGraph))?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
