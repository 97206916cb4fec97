//! Stock units backed by a text generator.

use crate::config::{AgentConfig, AppConfig, UnitKind};
use crate::prompts::{self, render};
use async_trait::async_trait;
use relay_core::{
    preview, AgentDescriptor, RegistryError, RunContext, TextGenerator, Unit, UnitError, UnitRegistry,
};
use std::sync::Arc;

/// Renders the run context as `key: value` lines.
fn format_context(context: &RunContext) -> String {
    if context.is_empty() {
        return prompts::NO_CONTEXT.to_string();
    }
    context
        .iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect::<Vec<_>>()
        .join("\n")
}

fn with_system_prompt(system_prompt: &str, prompt: String) -> String {
    if system_prompt.is_empty() {
        prompt
    } else {
        format!("{}\n\n{}", system_prompt, prompt)
    }
}

async fn generate(generator: &dyn TextGenerator, prompt: &str) -> Result<String, UnitError> {
    generator
        .generate(prompt)
        .await
        .map(|generation| generation.content)
        .map_err(|e| UnitError::Failed(e.to_string()))
}

/// General-purpose task unit.
///
/// Rejects tasks shorter than three characters and reports its output as
/// `Agent` / `Output` / `Status` lines.
pub struct TaskUnit {
    descriptor: AgentDescriptor,
    generator: Arc<dyn TextGenerator>,
    system_prompt: String,
}

impl TaskUnit {
    pub fn new(descriptor: AgentDescriptor, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            descriptor,
            generator,
            system_prompt: String::new(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }
}

#[async_trait]
impl Unit for TaskUnit {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    fn validate(&self, task: &str, _context: &RunContext) -> bool {
        if task.trim().chars().count() < 3 {
            tracing::error!(unit = %self.name(), "task too short");
            return false;
        }
        true
    }

    async fn execute(&mut self, task: &str, context: &RunContext) -> Result<String, UnitError> {
        let prompt = render(
            prompts::GENERAL_TASK_PROMPT,
            &[
                ("task", task),
                ("context", format_context(context).as_str()),
                ("requirements", prompts::DEFAULT_REQUIREMENTS),
            ],
        );
        tracing::info!(unit = %self.name(), task = %preview(task, 50), "executing task");
        generate(self.generator.as_ref(), &with_system_prompt(&self.system_prompt, prompt)).await
    }

    fn format_output(&self, raw: String) -> String {
        format!("Agent: {}\nOutput: {}\nStatus: completed", self.name(), raw.trim())
    }
}

/// Unit specialised for one domain (`data_analysis`, `planning`, ...).
///
/// Off-domain tasks are accepted with a warning.
pub struct DomainUnit {
    descriptor: AgentDescriptor,
    generator: Arc<dyn TextGenerator>,
    domain: String,
    system_prompt: String,
}

impl DomainUnit {
    pub fn new(descriptor: AgentDescriptor, domain: impl Into<String>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            descriptor,
            generator,
            domain: domain.into(),
            system_prompt: String::new(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    fn domain_keyword(&self) -> String {
        match self.domain.as_str() {
            "data_analysis" => "analy".to_string(),
            other => other.replace('_', " "),
        }
    }
}

#[async_trait]
impl Unit for DomainUnit {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    fn validate(&self, task: &str, _context: &RunContext) -> bool {
        if task.trim().is_empty() {
            tracing::error!(unit = %self.name(), "empty task provided");
            return false;
        }
        if !task.to_lowercase().contains(&self.domain_keyword()) {
            tracing::warn!(unit = %self.name(), domain = %self.domain, "task may not be suitable for domain");
        }
        true
    }

    async fn execute(&mut self, task: &str, context: &RunContext) -> Result<String, UnitError> {
        let prompt = render(
            prompts::SPECIALIZED_TASK_PROMPT,
            &[
                ("domain", self.domain.as_str()),
                ("task", task),
                ("context", format_context(context).as_str()),
                ("domain_requirements", prompts::domain_requirements(&self.domain)),
            ],
        );
        tracing::info!(unit = %self.name(), domain = %self.domain, "executing domain task");
        generate(self.generator.as_ref(), &with_system_prompt(&self.system_prompt, prompt)).await
    }

    fn format_output(&self, raw: String) -> String {
        let output = raw.trim();
        let mut lines = vec![
            format!("agent: {}", self.name()),
            format!("domain: {}", self.domain),
        ];

        if self.domain == "data_analysis" {
            lines.push(format!("summary: {}", extract_summary(output)));
            lines.push(format!("details: {}", output));
            lines.push(format!("recommendations: {}", extract_recommendations(output).join(", ")));
        } else {
            lines.push(format!("output: {}", output));
        }
        lines.push("status: completed".to_string());
        lines.join("\n")
    }
}

fn extract_summary(output: &str) -> &str {
    match output.lines().next().map(str::trim) {
        Some(first) if first.chars().count() > 10 => first,
        _ => "Analysis completed",
    }
}

fn extract_recommendations(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|line| line.contains("recommend") || line.contains("suggest"))
        .take(3)
        .collect()
}

/// Builds the unit described by one `agents` entry.
pub fn build_unit(name: &str, config: &AgentConfig, generator: Arc<dyn TextGenerator>) -> Box<dyn Unit> {
    let descriptor = AgentDescriptor::new(name, config.capabilities.iter().cloned(), config.description.clone());
    match config.kind {
        UnitKind::Task => Box::new(TaskUnit::new(descriptor, generator).with_system_prompt(config.system_prompt.clone())),
        UnitKind::Domain => {
            let domain = config.domain.clone().unwrap_or_else(|| "data_analysis".to_string());
            Box::new(DomainUnit::new(descriptor, domain, generator).with_system_prompt(config.system_prompt.clone()))
        }
    }
}

/// Registers one constructor per configured agent, in declaration order.
pub fn register_configured_units(registry: &mut UnitRegistry, config: &AppConfig) {
    for (name, agent) in &config.agents {
        let unit_name = name.clone();
        let agent_config = agent.clone();
        registry.register(
            name.clone(),
            agent.version.clone(),
            agent.capabilities.clone(),
            agent.description.clone(),
            move |generator| Ok::<_, RegistryError>(build_unit(&unit_name, &agent_config, generator)),
        );
    }
}
