//! YAML configuration with local overrides and environment substitution.
//!
//! Configuration is read from `config.yml`, deep-merged with an optional
//! `config_local.yml`, and every string value is passed through `${VAR}`
//! / `${VAR:default}` environment substitution before deserialisation.

use indexmap::IndexMap;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Base configuration file name.
pub const CONFIG_FILE: &str = "config.yml";

/// Optional override file merged on top of [`CONFIG_FILE`].
pub const LOCAL_CONFIG_FILE: &str = "config_local.yml";

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error reading a configuration file
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parsing or schema error
    #[error("Invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Referenced environment variable is not set and has no default
    #[error("Environment variable '{0}' is not set")]
    MissingEnvVar(String),

    /// A named section was requested but is not declared
    #[error("{kind} '{name}' not configured")]
    MissingSection { kind: &'static str, name: String },

    /// A section refers to another section that does not exist
    #[error("{from} refers to unknown {kind} '{name}'")]
    UnknownReference {
        from: String,
        kind: &'static str,
        name: String,
    },
}

/// Text-generation client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name (`openai`, `gemini`)
    pub provider: String,
    /// Model identifier
    pub model: String,
    /// API key; falls back to the provider's environment variable
    #[serde(default)]
    pub api_key: Option<String>,
    /// Endpoint override for compatible servers
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout: u64,
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Kind of stock unit to instantiate for an agent entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// General-purpose task unit
    #[default]
    Task,
    /// Domain-specialised unit
    Domain,
}

/// Unit (agent) configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub description: String,
    /// Name of the `llm_clients` entry backing this unit
    pub llm_provider: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default, alias = "tools")]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub kind: UnitKind,
    /// Specialisation for domain units
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
}

/// How a workflow sequences its units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// Fixed pipeline over the listed units
    #[default]
    Sequential,
    /// Per-subtask unit selection
    Router,
}

/// Workflow configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: WorkflowKind,
    /// Units taking part, in order
    pub agents: Vec<String>,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Run timeout in seconds; `0` disables it
    #[serde(default = "default_run_timeout")]
    pub timeout: u64,
}

impl WorkflowConfig {
    pub fn run_timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (`info`, `relay_agent=debug`, ...)
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Write logs to this file instead of stderr
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file_path: None,
        }
    }
}

/// Step retry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed delay between attempts, in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
}

impl RetrySettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub debug: bool,
    pub llm_clients: BTreeMap<String, LlmConfig>,
    pub default_llm: String,
    /// Agents in declaration order; units register in this order
    pub agents: IndexMap<String, AgentConfig>,
    pub workflows: BTreeMap<String, WorkflowConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl AppConfig {
    /// Loads `config.yml` (and `config_local.yml` if present) from `dir`.
    ///
    /// A `.env` file in the working directory is loaded first, without
    /// overriding variables that are already set.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let _ = dotenv::dotenv();

        let dir = dir.as_ref();
        let mut value = read_yaml(&dir.join(CONFIG_FILE))?;

        let local_path = dir.join(LOCAL_CONFIG_FILE);
        if local_path.exists() {
            let local = read_yaml(&local_path)?;
            merge_values(&mut value, local);
            tracing::debug!(path = %local_path.display(), "merged local configuration");
        }

        Self::from_value(value)
    }

    /// Loads a single configuration file without local overrides.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_value(read_yaml(path.as_ref())?)
    }

    /// Parses configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_yaml::from_str(text)?;
        Self::from_value(value)
    }

    fn from_value(mut value: Value) -> Result<Self, ConfigError> {
        substitute_env_vars(&mut value)?;
        let config: AppConfig = serde_yaml::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-references between sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.llm_clients.contains_key(&self.default_llm) {
            return Err(ConfigError::UnknownReference {
                from: "default_llm".to_string(),
                kind: "llm client",
                name: self.default_llm.clone(),
            });
        }

        for (name, agent) in &self.agents {
            if !self.llm_clients.contains_key(&agent.llm_provider) {
                return Err(ConfigError::UnknownReference {
                    from: format!("agent '{}'", name),
                    kind: "llm client",
                    name: agent.llm_provider.clone(),
                });
            }
        }

        for (name, workflow) in &self.workflows {
            if let Some(missing) = workflow.agents.iter().find(|a| !self.agents.contains_key(*a)) {
                return Err(ConfigError::UnknownReference {
                    from: format!("workflow '{}'", name),
                    kind: "agent",
                    name: missing.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn llm_config(&self, name: &str) -> Result<&LlmConfig, ConfigError> {
        self.llm_clients.get(name).ok_or_else(|| ConfigError::MissingSection {
            kind: "LLM client",
            name: name.to_string(),
        })
    }

    pub fn agent_config(&self, name: &str) -> Result<&AgentConfig, ConfigError> {
        self.agents.get(name).ok_or_else(|| ConfigError::MissingSection {
            kind: "Agent",
            name: name.to_string(),
        })
    }

    pub fn workflow_config(&self, name: &str) -> Result<&WorkflowConfig, ConfigError> {
        self.workflows.get(name).ok_or_else(|| ConfigError::MissingSection {
            kind: "Workflow",
            name: name.to_string(),
        })
    }

    /// LLM clients whose API key is absent or still a placeholder.
    pub fn missing_api_keys(&self) -> Vec<String> {
        self.llm_clients
            .iter()
            .filter(|(_, llm)| {
                llm.api_key
                    .as_deref()
                    .map_or(true, |key| key.is_empty() || key.starts_with("your_"))
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}

fn read_yaml(path: &Path) -> Result<Value, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_yaml::from_str(&text)?;
    // An empty document parses as null; treat it as an empty mapping.
    Ok(if value.is_null() {
        Value::Mapping(Default::default())
    } else {
        value
    })
}

/// Recursively merges `overlay` into `base`. Mappings merge key by key;
/// any other value in `overlay` replaces the base value.
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::([^}]*))?\}").expect("valid env pattern")
    })
}

/// Expands `${VAR}` and `${VAR:default}` in one string.
pub fn expand_env(text: &str) -> Result<String, ConfigError> {
    let mut missing = None;
    let expanded = env_pattern().replace_all(text, |caps: &Captures| {
        let name = &caps[1];
        match (std::env::var(name), caps.get(2)) {
            (Ok(value), _) => value,
            (Err(_), Some(default)) => default.as_str().to_string(),
            (Err(_), None) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(ConfigError::MissingEnvVar(name)),
        None => Ok(expanded.into_owned()),
    }
}

fn substitute_env_vars(value: &mut Value) -> Result<(), ConfigError> {
    match value {
        Value::String(text) if text.contains("${") => {
            *text = expand_env(text)?;
        }
        Value::Sequence(items) => {
            for item in items {
                substitute_env_vars(item)?;
            }
        }
        Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                substitute_env_vars(item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_max_steps() -> usize {
    20
}

fn default_run_timeout() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_app_name() -> String {
    "relaykit".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
llm_clients:
  openai:
    provider: openai
    model: gpt-4o-mini
    api_key: sk-test
default_llm: openai
agents:
  task_agent_1:
    description: Handles general tasks and analysis
    llm_provider: openai
    tools: [general_tasks, analysis]
  task_agent_2:
    description: Handles complex reasoning and planning
    llm_provider: openai
    kind: domain
    domain: planning
workflows:
  sequential:
    type: sequential
    agents: [task_agent_1, task_agent_2]
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = AppConfig::from_yaml_str(SAMPLE).unwrap();

        assert_eq!(config.app_name, "relaykit");
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.delay(), Duration::from_secs(1));

        let agent = config.agent_config("task_agent_1").unwrap();
        assert_eq!(agent.capabilities, vec!["general_tasks", "analysis"]);
        assert_eq!(agent.kind, UnitKind::Task);
        assert_eq!(config.agent_config("task_agent_2").unwrap().kind, UnitKind::Domain);

        let workflow = config.workflow_config("sequential").unwrap();
        assert_eq!(workflow.max_steps, 20);
        assert_eq!(workflow.run_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(workflow.kind, WorkflowKind::Sequential);
    }

    #[test]
    fn test_agents_keep_declaration_order() {
        let config = AppConfig::from_yaml_str(&SAMPLE.replace("task_agent_1:", "zeta_agent:").replace(
            "[task_agent_1, task_agent_2]",
            "[zeta_agent, task_agent_2]",
        ))
        .unwrap();

        let names: Vec<&str> = config.agents.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["zeta_agent", "task_agent_2"]);
    }

    #[test]
    fn test_unknown_workflow_agent_is_rejected() {
        let text = SAMPLE.replace("[task_agent_1, task_agent_2]", "[task_agent_1, ghost]");
        let err = AppConfig::from_yaml_str(&text).unwrap_err();

        assert!(matches!(
            err,
            ConfigError::UnknownReference { kind: "agent", ref name, .. } if name == "ghost"
        ));
    }

    #[test]
    fn test_missing_section_lookup() {
        let config = AppConfig::from_yaml_str(SAMPLE).unwrap();
        let err = config.workflow_config("router").unwrap_err();
        assert_eq!(err.to_string(), "Workflow 'router' not configured");
    }

    #[test]
    fn test_expand_env_with_default() {
        std::env::set_var("RELAY_TEST_PRESENT", "value");
        std::env::remove_var("RELAY_TEST_ABSENT");

        assert_eq!(expand_env("${RELAY_TEST_PRESENT}").unwrap(), "value");
        assert_eq!(expand_env("a-${RELAY_TEST_ABSENT:fallback}-b").unwrap(), "a-fallback-b");
        assert!(matches!(
            expand_env("${RELAY_TEST_ABSENT}"),
            Err(ConfigError::MissingEnvVar(name)) if name == "RELAY_TEST_ABSENT"
        ));
    }

    #[test]
    fn test_merge_values_is_deep() {
        let mut base: Value = serde_yaml::from_str("a: {x: 1, y: 2}\nb: [1, 2]").unwrap();
        let overlay: Value = serde_yaml::from_str("a: {y: 3}\nb: [9]").unwrap();
        merge_values(&mut base, overlay);

        let expected: Value = serde_yaml::from_str("a: {x: 1, y: 3}\nb: [9]").unwrap();
        assert_eq!(base, expected);
    }

    #[test]
    fn test_missing_api_keys() {
        let text = SAMPLE.replace("sk-test", "your_openai_key");
        let config = AppConfig::from_yaml_str(&text).unwrap();
        assert_eq!(config.missing_api_keys(), vec!["openai"]);
    }
}
