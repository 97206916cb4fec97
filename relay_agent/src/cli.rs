//! Command-line interface for RelayKit.
//!
//! # Examples
//!
//! Route a request through a configured workflow:
//!
//! ```bash
//! $ relay run "Analyze sales data and create a report" --workflow router
//! ```
//!
//! List units that advertise a capability:
//!
//! ```bash
//! $ relay agents --capability analysis
//! ```
//!
//! Validate `config.yml` (and `config_local.yml`):
//!
//! ```bash
//! $ relay check --config ./deploy
//! ```

use crate::workflow::{build_workflow, RunReport};
use anyhow::Context;
use clap::{Parser, Subcommand};
use relay_core::UnitRegistry;
use relay_runtime::{init_logging, register_configured_units, AppConfig, LlmFactory};
use std::path::{Path, PathBuf};

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "relay", version, about = "Route requests through a pipeline of task units")]
struct Cli {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Run a request through a workflow and print the run report
    Run {
        /// Request text
        request: String,

        /// Directory containing config.yml
        #[arg(short, long, default_value = ".")]
        config: PathBuf,

        /// Workflow to run
        #[arg(short, long, default_value = "sequential")]
        workflow: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List configured units
    Agents {
        #[arg(short, long, default_value = ".")]
        config: PathBuf,

        /// Only units with this capability
        #[arg(long)]
        capability: Option<String>,
    },

    /// Validate configuration
    Check {
        #[arg(short, long, default_value = ".")]
        config: PathBuf,
    },
}

fn load_config(dir: &Path) -> anyhow::Result<AppConfig> {
    AppConfig::load(dir)
        .with_context(|| format!("Failed to load configuration from {}", dir.display()))
}

fn configured_registry(config: &AppConfig) -> UnitRegistry {
    let mut registry = UnitRegistry::new();
    register_configured_units(&mut registry, config);
    registry
}

/// Entry point for the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.action {
        Action::Run {
            request,
            config,
            workflow,
            json,
        } => {
            let config = load_config(&config)?;
            // A subscriber may already be installed by an embedding process.
            let _ = init_logging(&config.logging);

            let registry = configured_registry(&config);
            let mut factory = LlmFactory::new();
            let mut engine = build_workflow(&workflow, &config, &registry, &mut factory)
                .with_context(|| format!("Failed to build workflow '{}'", workflow))?;

            let report = engine.run(&request).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }

            if !report.is_success() {
                std::process::exit(1);
            }
        }

        Action::Agents { config, capability } => {
            let config = load_config(&config)?;
            let registry = configured_registry(&config);

            for name in registry.discover(capability.as_deref()) {
                if let Some(info) = registry.info(&name) {
                    let capabilities: Vec<&str> = info
                        .descriptor
                        .capabilities()
                        .iter()
                        .map(String::as_str)
                        .collect();
                    println!("{} v{}", name, info.version);
                    println!("   {}", info.descriptor.description());
                    if !capabilities.is_empty() {
                        println!("   capabilities: {}", capabilities.join(", "));
                    }
                }
            }
        }

        Action::Check { config } => {
            let config = load_config(&config)?;
            println!(
                "Configuration valid: {} v{} ({})",
                config.app_name, config.version, config.environment
            );
            println!(
                "   {} LLM clients, {} agents, {} workflows",
                config.llm_clients.len(),
                config.agents.len(),
                config.workflows.len()
            );

            for name in config.missing_api_keys() {
                println!("   warning: LLM client '{}' has no API key configured", name);
            }
        }
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    match (&report.result, &report.error) {
        (Some(output), _) => {
            println!("Workflow completed: {} steps in {:.2}s", report.steps, report.duration);
            println!();
            println!("{}", output.summary);
        }
        (None, Some(error)) => {
            println!("Workflow failed at step {} after {:.2}s", report.steps, report.duration);
            println!("   Error: {}", error);
            match report.rollback {
                Some(true) => println!("   Rollback: completed"),
                Some(false) => println!("   Rollback: incomplete"),
                None => println!("   Rollback: not attempted"),
            }
        }
        (None, None) => println!("Workflow finished without output"),
    }
}
