//! Component registry: implementation identifiers to factories.
//!
//! # Responsibilities
//! - Map filter and servlet identifiers to factories
//! - Instantiate components for the assembler with their init parameters
//! - Ship the built-in components under well-known identifiers
//!
//! # Design Decisions
//! - Identifiers stand in for class names; an unknown identifier is an
//!   assembly error, never a silent skip
//! - Registries are cheap to clone (factories are shared)

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::config::{InitParameters, RuntimeMode};
use crate::context::builtin;
use crate::context::filter::Filter;
use crate::context::servlet::Servlet;
use crate::error::{Result, RunnerError};

/// What a factory knows about the component it builds.
#[derive(Debug, Clone, Copy)]
pub struct ComponentConfig<'a> {
    /// Instance name (configured or generated).
    pub name: &'a str,
    pub init_parameters: &'a InitParameters,
    /// Canonical resource root of the owning context.
    pub resource_base: &'a Path,
    pub context_path: &'a str,
    pub runtime_mode: RuntimeMode,
}

impl<'a> ComponentConfig<'a> {
    pub fn init_parameter(&self, key: &str) -> Option<&'a str> {
        self.init_parameters.get(key).map(String::as_str)
    }
}

pub type FilterFactory = Arc<dyn Fn(&ComponentConfig<'_>) -> Result<Arc<dyn Filter>> + Send + Sync>;
pub type ServletFactory =
    Arc<dyn Fn(&ComponentConfig<'_>) -> Result<Arc<dyn Servlet>> + Send + Sync>;

/// Identifier → factory lookup for filters and servlets.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    filters: HashMap<String, FilterFactory>,
    servlets: HashMap<String, ServletFactory>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut filters: Vec<_> = self.filters.keys().collect();
        let mut servlets: Vec<_> = self.servlets.keys().collect();
        filters.sort();
        servlets.sort();
        f.debug_struct("ComponentRegistry")
            .field("filters", &filters)
            .field("servlets", &servlets)
            .finish()
    }
}

impl ComponentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in components.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register(&mut registry);
        registry
    }

    pub fn register_filter<F>(&mut self, id: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ComponentConfig<'_>) -> Result<Arc<dyn Filter>> + Send + Sync + 'static,
    {
        self.filters.insert(id.into(), Arc::new(factory));
        self
    }

    pub fn register_servlet<F>(&mut self, id: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ComponentConfig<'_>) -> Result<Arc<dyn Servlet>> + Send + Sync + 'static,
    {
        self.servlets.insert(id.into(), Arc::new(factory));
        self
    }

    pub fn has_filter(&self, id: &str) -> bool {
        self.filters.contains_key(id)
    }

    pub fn has_servlet(&self, id: &str) -> bool {
        self.servlets.contains_key(id)
    }

    pub fn create_filter(&self, id: &str, config: &ComponentConfig<'_>) -> Result<Arc<dyn Filter>> {
        let factory = self
            .filters
            .get(id)
            .ok_or_else(|| RunnerError::UnregisteredComponent {
                kind: "filter",
                id: id.to_string(),
            })?;
        factory(config)
    }

    pub fn create_servlet(
        &self,
        id: &str,
        config: &ComponentConfig<'_>,
    ) -> Result<Arc<dyn Servlet>> {
        let factory = self
            .servlets
            .get(id)
            .ok_or_else(|| RunnerError::UnregisteredComponent {
                kind: "servlet",
                id: id.to_string(),
            })?;
        factory(config)
    }
}
