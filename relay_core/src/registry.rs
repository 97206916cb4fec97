//! Startup-time unit registry.
//!
//! Units are registered by name together with a constructor function.
//! Lookup, discovery and capability matching operate on the registered
//! descriptors; instantiation hands the constructor a text generator.

use crate::error::RegistryError;
use crate::generate::TextGenerator;
use crate::types::AgentDescriptor;
use crate::unit::Unit;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Builds a unit instance bound to a text generator.
pub type UnitConstructor =
    Arc<dyn Fn(Arc<dyn TextGenerator>) -> Result<Box<dyn Unit>, RegistryError> + Send + Sync>;

/// Registration entry for one unit.
#[derive(Clone)]
pub struct UnitInfo {
    /// Descriptor advertised to selection
    pub descriptor: AgentDescriptor,
    /// Registered version string
    pub version: String,
    constructor: UnitConstructor,
}

impl fmt::Debug for UnitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitInfo")
            .field("descriptor", &self.descriptor)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Name-keyed table of unit constructors, iterated in registration order.
#[derive(Clone, Debug, Default)]
pub struct UnitRegistry {
    entries: Vec<UnitInfo>,
    index: HashMap<String, usize>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a unit constructor.
    ///
    /// Registering an existing name replaces the entry but keeps its
    /// original position.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        capabilities: Vec<String>,
        description: impl Into<String>,
        constructor: F,
    ) where
        F: Fn(Arc<dyn TextGenerator>) -> Result<Box<dyn Unit>, RegistryError> + Send + Sync + 'static,
    {
        let name = name.into();
        let version = version.into();
        let info = UnitInfo {
            descriptor: AgentDescriptor::new(name.clone(), capabilities, description),
            version,
            constructor: Arc::new(constructor),
        };

        match self.index.get(&name) {
            Some(&pos) => {
                tracing::warn!(unit = %name, "overwriting existing unit registration");
                self.entries[pos] = info;
            }
            None => {
                tracing::info!(unit = %name, version = %info.version, "registered unit");
                self.index.insert(name, self.entries.len());
                self.entries.push(info);
            }
        }
    }

    /// Names of registered units, optionally filtered by one capability.
    pub fn discover(&self, capability: Option<&str>) -> Vec<String> {
        self.entries
            .iter()
            .filter(|info| capability.map_or(true, |cap| info.descriptor.capabilities().contains(cap)))
            .map(|info| info.descriptor.name().to_string())
            .collect()
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Names of units advertising every required capability.
    pub fn match_capability<S: AsRef<str>>(&self, required: &[S]) -> Vec<String> {
        self.entries
            .iter()
            .filter(|info| info.descriptor.has_capabilities(required))
            .map(|info| info.descriptor.name().to_string())
            .collect()
    }

    pub fn info(&self, name: &str) -> Option<&UnitInfo> {
        self.index.get(name).map(|&pos| &self.entries[pos])
    }

    pub fn descriptor(&self, name: &str) -> Option<&AgentDescriptor> {
        self.info(name).map(|info| &info.descriptor)
    }

    /// Descriptors of every registered unit, in registration order.
    pub fn descriptors(&self) -> Vec<AgentDescriptor> {
        self.entries.iter().map(|info| info.descriptor.clone()).collect()
    }

    /// Instantiates the unit registered under `name`.
    pub fn create(
        &self,
        name: &str,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Box<dyn Unit>, RegistryError> {
        let info = self
            .info(name)
            .ok_or_else(|| RegistryError::UnknownUnit(name.to_string()))?;

        let unit = (info.constructor)(generator)?;
        tracing::info!(unit = %name, "created unit instance");
        Ok(unit)
    }

    /// Registered versions keyed by unit name.
    pub fn list_versions(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|info| (info.descriptor.name().to_string(), info.version.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
