//! RelayKit core - the contract between the orchestrator and its units.
//!
//! This crate defines the boundary types shared by every RelayKit layer:
//!
//! - [`Unit`]: a task-executing component, driven through a [`UnitHandle`]
//! - [`TextGenerator`]: the port to a language-model backend
//! - [`UnitRegistry`]: startup-time table of unit constructors
//! - [`UnitMemory`]: per-unit exchange buffers
//! - [`RunContext`] and [`ExecutionStep`]: per-run data passed between steps

pub mod error;
pub mod generate;
pub mod memory;
pub mod registry;
pub mod types;
pub mod unit;

pub use error::{GenerationError, MemoryError, RegistryError, UnitError};
pub use generate::{Generation, TextGenerator};
pub use memory::{Exchange, MemoryKind, MemoryMessage, MessageRole, UnitMemory};
pub use registry::{UnitConstructor, UnitInfo, UnitRegistry};
pub use types::{AgentDescriptor, ExecutionStep, RunContext, UnitState};
pub use unit::{preview, Unit, UnitExecution, UnitHandle};
