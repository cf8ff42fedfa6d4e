//! Turns a `ContextConfig` into a ready `WebContext`.
//!
//! # Responsibilities
//! - Validate the resource root and context path
//! - Instantiate filters and servlets through the registry, in order
//! - Register the finished context with its parent collection
//!
//! # Design Decisions
//! - Registration with the parent is the final step, so a failed assembly
//!   never leaves a partial context visible to request dispatch
//! - Holders without a url pattern exist but carry no mapping

use std::path::Path;
use std::sync::Arc;

use crate::config::ContextConfig;
use crate::context::builtin::implicit_resource_servlet;
use crate::context::handler::{DispatcherType, FilterHolder, ServletHolder, WebContext};
use crate::context::path_spec::PathSpec;
use crate::context::registry::{ComponentConfig, ComponentRegistry};
use crate::context::session::SessionManager;
use crate::error::{Result, RunnerError};

/// Assemble a context from its configuration.
pub fn assemble_context(
    config: ContextConfig,
    registry: &ComponentRegistry,
) -> Result<Arc<WebContext>> {
    if !config.webapp.is_dir() {
        return Err(RunnerError::InvalidWebRoot(config.webapp.clone()));
    }
    let context_path = normalize_context_path(&config.context_path)?;
    let resource_base = config
        .webapp
        .canonicalize()
        .map_err(|_| RunnerError::InvalidWebRoot(config.webapp.clone()))?;

    if let Some(page) = &config.error_page {
        if !page.starts_with('/') {
            return Err(RunnerError::invalid(format!(
                "error page '{}' must start with '/'",
                page
            )));
        }
    }

    let sessions = Arc::new(SessionManager::new(config.max_inactive_interval));

    let mut filters = Vec::with_capacity(config.filters.len());
    for (ordinal, filter) in config.filters.iter().enumerate() {
        let name = holder_name(filter.name.as_deref(), &filter.filter, ordinal);
        let component = component_config(
            &name,
            &filter.init_parameters,
            &resource_base,
            &context_path,
            &config,
        );
        let instance = registry.create_filter(&filter.filter, &component)?;
        let mapping = parse_mapping(&filter.filter_path)?;
        filters.push(FilterHolder {
            name,
            identifier: filter.filter.clone(),
            filter: instance,
            init_parameters: filter.init_parameters.clone(),
            mapping,
            dispatch: vec![DispatcherType::Request, DispatcherType::Error],
        });
    }

    let mut servlets = Vec::with_capacity(config.servlets.len());
    for (ordinal, servlet) in config.servlets.iter().enumerate() {
        let name = holder_name(servlet.name.as_deref(), &servlet.servlet, ordinal);
        let component = component_config(
            &name,
            &servlet.init_parameters,
            &resource_base,
            &context_path,
            &config,
        );
        let instance = registry.create_servlet(&servlet.servlet, &component)?;
        let mapping = parse_mapping(&servlet.path_spec)?;
        servlets.push(ServletHolder {
            name,
            identifier: servlet.servlet.clone(),
            servlet: instance,
            init_parameters: servlet.init_parameters.clone(),
            mapping,
        });
    }

    let context = Arc::new(WebContext {
        resource_servlet: implicit_resource_servlet(&resource_base),
        context_path,
        resource_base,
        filters,
        servlets,
        init_parameters: config.init_parameters,
        attributes: config.attributes,
        error_page: config.error_page,
        runtime_mode: config.runtime_mode,
        sessions,
    });

    tracing::info!(
        context_path = %context.context_path(),
        resource_base = %context.resource_base().display(),
        filters = context.filters().len(),
        servlets = context.servlets().len(),
        mappings = context.mapping_count(),
        max_inactive_secs = config.max_inactive_interval,
        "Context assembled"
    );

    if let Some(parent) = &config.parent {
        parent.add(context.clone());
    }

    Ok(context)
}

/// Validate a context path and trim its trailing slash.
pub fn normalize_context_path(path: &str) -> Result<String> {
    if !path.starts_with('/') {
        return Err(RunnerError::invalid(format!(
            "context path '{}' must start with '/'",
            path
        )));
    }
    if path.contains(['*', '?', '#']) {
        return Err(RunnerError::invalid(format!(
            "context path '{}' contains a reserved character",
            path
        )));
    }
    let trimmed = path.trim_end_matches('/');
    Ok(if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    })
}

fn holder_name(configured: Option<&str>, identifier: &str, ordinal: usize) -> String {
    match configured {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("{}-{}", identifier, ordinal),
    }
}

fn parse_mapping(pattern: &str) -> Result<Option<PathSpec>> {
    if pattern.is_empty() {
        Ok(None)
    } else {
        PathSpec::parse(pattern).map(Some)
    }
}

fn component_config<'a>(
    name: &'a str,
    init_parameters: &'a crate::config::InitParameters,
    resource_base: &'a Path,
    context_path: &'a str,
    config: &ContextConfig,
) -> ComponentConfig<'a> {
    ComponentConfig {
        name,
        init_parameters,
        resource_base,
        context_path,
        runtime_mode: config.runtime_mode,
    }
}
