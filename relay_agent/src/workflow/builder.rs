//! Workflow construction from application configuration.

use crate::workflow::engine::{EngineConfig, WorkflowEngine};
use relay_core::{GenerationError, RegistryError, Unit, UnitRegistry};
use relay_runtime::{AppConfig, ConfigError, LlmFactory, WorkflowKind};

/// Errors raised while assembling a workflow.
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    /// A referenced configuration section is missing
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A unit could not be instantiated
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A text-generation client could not be created
    #[error(transparent)]
    Client(#[from] GenerationError),
}

/// Builds the workflow named `name`.
///
/// Each listed agent is instantiated through `registry` with the client
/// for its `llm_provider`. Router workflows decompose and select with
/// the `default_llm` client.
///
/// # Arguments
///
/// * `name` - Key in the `workflows` section
/// * `config` - Loaded application configuration
/// * `registry` - Unit constructors, keyed by agent name
/// * `factory` - Client cache shared across units
pub fn build_workflow(
    name: &str,
    config: &AppConfig,
    registry: &UnitRegistry,
    factory: &mut LlmFactory,
) -> Result<WorkflowEngine, BuildError> {
    let workflow = config.workflow_config(name)?;

    let mut units: Vec<Box<dyn Unit>> = Vec::with_capacity(workflow.agents.len());
    for agent_name in &workflow.agents {
        let agent = config.agent_config(agent_name)?;
        let generator = factory.create_client(config.llm_config(&agent.llm_provider)?)?;
        units.push(registry.create(agent_name, generator)?);
    }

    let engine = match workflow.kind {
        WorkflowKind::Sequential => WorkflowEngine::sequential(name, units),
        WorkflowKind::Router => {
            let generator = factory.create_client(config.llm_config(&config.default_llm)?)?;
            WorkflowEngine::router(name, units, generator)
        }
    };

    Ok(engine.with_config(EngineConfig::from_settings(workflow, &config.retry)))
}
