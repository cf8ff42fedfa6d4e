//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, buffer sizes)
//! - Validate url patterns before any context is assembled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: StartConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::StartConfig;
use crate::context::PathSpec;
use crate::net::{Port, MIN_OUTPUT_BUFFER_SIZE};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a start configuration, collecting every problem found.
pub fn validate_config(config: &StartConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.project_name.trim().is_empty() {
        errors.push(ValidationError::new("project_name", "must not be empty"));
    }

    let http_port = Port::try_from(config.http_port);
    if let Err(e) = &http_port {
        errors.push(ValidationError::new("http_port", e.to_string()));
    }
    let https_port = Port::try_from(config.https_port);
    if let Err(e) = &https_port {
        errors.push(ValidationError::new("https_port", e.to_string()));
    }

    let tls_requested = config
        .key_store_path_resource
        .as_deref()
        .is_some_and(|source| !source.is_empty());
    if let (Ok(http), Ok(https)) = (&http_port, &https_port) {
        if tls_requested && http.get() != 0 && http == https {
            errors.push(ValidationError::new(
                "https_port",
                format!("must differ from http_port ({})", http),
            ));
        }
    }

    if !config.context_path.starts_with('/') {
        errors.push(ValidationError::new("context_path", "must start with '/'"));
    }

    if !config.filter_path.is_empty() {
        if let Err(e) = PathSpec::parse(&config.filter_path) {
            errors.push(ValidationError::new("filter_path", e.to_string()));
        }
    }

    if config.webapp.as_os_str().is_empty() {
        errors.push(ValidationError::new("webapp", "must not be empty"));
    }

    let server = &config.server;
    if server.output_buffer_size < MIN_OUTPUT_BUFFER_SIZE {
        errors.push(ValidationError::new(
            "server.output_buffer_size",
            format!("must be at least {} bytes", MIN_OUTPUT_BUFFER_SIZE),
        ));
    }

    if server.handler_order.is_empty() {
        errors.push(ValidationError::new("server.handler_order", "must not be empty"));
    }
    let mut seen = HashSet::new();
    for slot in &server.handler_order {
        if !seen.insert(*slot) {
            errors.push(ValidationError::new(
                "server.handler_order",
                format!("{:?} listed more than once", slot),
            ));
        }
    }

    if let Some(addr) = &server.management_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "server.management_address",
                format!("'{}' is not a socket address", addr),
            ));
        }
    }

    if let Some(deploy) = &config.deploy {
        if deploy.monitored_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new("deploy.monitored_dir", "must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
