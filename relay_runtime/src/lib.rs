//! RelayKit runtime - services around the orchestration core.
//!
//! Configuration loading, logging setup, HTTP text-generation clients
//! and the stock LLM-backed units.

pub mod config;
pub mod llm;
pub mod logging;
pub mod prompts;
pub mod units;

pub use config::{
    AgentConfig, AppConfig, ConfigError, LlmConfig, LogFormat, LoggingConfig, RetrySettings, UnitKind,
    WorkflowConfig, WorkflowKind,
};
pub use llm::{GeminiClient, LlmFactory, OpenAiClient};
pub use logging::{init_logging, LoggingError};
pub use units::{build_unit, register_configured_units, DomainUnit, TaskUnit};
