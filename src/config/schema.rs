//! Configuration schema definitions.
//!
//! Every configuration value the runner consumes is defined here. All types
//! derive Serde traits so the same shapes are read from the start config file
//! and from per-app `context.toml` descriptors.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::handler::ContextCollection;

/// Init parameters of a filter, servlet or context. Keys are unique.
pub type InitParameters = BTreeMap<String, String>;

/// Default session idle timeout in seconds.
pub const DEFAULT_MAX_INACTIVE_INTERVAL: u64 = 300;

/// Runtime configuration type handed to applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    #[default]
    Development,
    Deployment,
}

impl RuntimeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeMode::Development => "development",
            RuntimeMode::Deployment => "deployment",
        }
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuntimeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" => Ok(RuntimeMode::Development),
            "deployment" | "production" => Ok(RuntimeMode::Deployment),
            other => Err(format!("unknown runtime configuration type '{}'", other)),
        }
    }
}

/// One entry of the server's top-level handler order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandlerSlot {
    /// The root context of the run config, attached directly.
    RootContext,
    /// The context collection (deployed and child contexts).
    Contexts,
    /// The catch-all default handler.
    Default,
}

/// Filter holder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FilterConfig {
    /// Registry identifier of the filter implementation.
    pub filter: String,

    /// Optional instance name.
    #[serde(default)]
    pub name: Option<String>,

    /// Url pattern the filter is bound to. Empty leaves it unbound.
    #[serde(default)]
    pub filter_path: String,

    #[serde(default)]
    pub init_parameters: InitParameters,
}

impl FilterConfig {
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            name: None,
            filter_path: String::new(),
            init_parameters: InitParameters::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn filter_path(mut self, path: impl Into<String>) -> Self {
        self.filter_path = path.into();
        self
    }

    pub fn init_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.init_parameters.insert(key.into(), value.into());
        self
    }
}

/// Servlet holder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServletConfig {
    /// Registry identifier of the servlet implementation.
    pub servlet: String,

    /// Optional instance name.
    #[serde(default)]
    pub name: Option<String>,

    /// Url pattern the servlet is bound to. Empty leaves it unbound.
    #[serde(default)]
    pub path_spec: String,

    #[serde(default)]
    pub init_parameters: InitParameters,
}

impl ServletConfig {
    pub fn new(servlet: impl Into<String>) -> Self {
        Self {
            servlet: servlet.into(),
            name: None,
            path_spec: String::new(),
            init_parameters: InitParameters::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn path_spec(mut self, path: impl Into<String>) -> Self {
        self.path_spec = path.into();
        self
    }

    pub fn init_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.init_parameters.insert(key.into(), value.into());
        self
    }
}

/// Describes one request-handling context.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Url prefix the context is bound to.
    pub context_path: String,

    /// Resource root. Must exist when the context is assembled.
    pub webapp: PathBuf,

    /// Session idle timeout in seconds (0 = sessions never expire).
    pub max_inactive_interval: u64,

    pub filters: Vec<FilterConfig>,

    pub servlets: Vec<ServletConfig>,

    pub init_parameters: InitParameters,

    /// Context attributes (set by the deployer, visible to components).
    pub attributes: BTreeMap<String, String>,

    /// Path inside the context that renders error responses.
    pub error_page: Option<String>,

    pub runtime_mode: RuntimeMode,

    /// Collection that takes ownership of the assembled context.
    #[serde(skip)]
    pub parent: Option<ContextCollection>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            context_path: "/".to_string(),
            webapp: PathBuf::new(),
            max_inactive_interval: DEFAULT_MAX_INACTIVE_INTERVAL,
            filters: Vec::new(),
            servlets: Vec::new(),
            init_parameters: InitParameters::new(),
            attributes: BTreeMap::new(),
            error_page: None,
            runtime_mode: RuntimeMode::default(),
            parent: None,
        }
    }
}

impl ContextConfig {
    pub fn new(webapp: impl Into<PathBuf>) -> Self {
        Self {
            webapp: webapp.into(),
            ..Self::default()
        }
    }

    pub fn context_path(mut self, path: impl Into<String>) -> Self {
        self.context_path = path.into();
        self
    }

    pub fn max_inactive_interval(mut self, secs: u64) -> Self {
        self.max_inactive_interval = secs;
        self
    }

    pub fn filter(mut self, filter: FilterConfig) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn servlet(mut self, servlet: ServletConfig) -> Self {
        self.servlets.push(servlet);
        self
    }

    pub fn init_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.init_parameters.insert(key.into(), value.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn error_page(mut self, path: impl Into<String>) -> Self {
        self.error_page = Some(path.into());
        self
    }

    pub fn runtime_mode(mut self, mode: RuntimeMode) -> Self {
        self.runtime_mode = mode;
        self
    }

    pub fn parent(mut self, parent: ContextCollection) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Partial context configuration read from deployment descriptors.
///
/// Unset scalars keep the value already in place; components are appended
/// after those already declared; parameters and attributes override by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ContextDescriptor {
    pub context_path: Option<String>,
    pub max_inactive_interval: Option<u64>,
    pub filters: Vec<FilterConfig>,
    pub servlets: Vec<ServletConfig>,
    pub init_parameters: InitParameters,
    pub attributes: BTreeMap<String, String>,
    pub error_page: Option<String>,
    pub runtime_mode: Option<RuntimeMode>,
}

impl ContextDescriptor {
    /// Layer this descriptor over `config`.
    pub fn apply(&self, mut config: ContextConfig) -> ContextConfig {
        if let Some(path) = &self.context_path {
            config.context_path = path.clone();
        }
        if let Some(secs) = self.max_inactive_interval {
            config.max_inactive_interval = secs;
        }
        config.filters.extend(self.filters.iter().cloned());
        config.servlets.extend(self.servlets.iter().cloned());
        config
            .init_parameters
            .extend(self.init_parameters.iter().map(|(k, v)| (k.clone(), v.clone())));
        config
            .attributes
            .extend(self.attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(page) = &self.error_page {
            config.error_page = Some(page.clone());
        }
        if let Some(mode) = self.runtime_mode {
            config.runtime_mode = mode;
        }
        config
    }
}

/// Listener and handler tuning for the server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Interface the listeners bind to.
    pub host: String,

    /// Idle timeout of the plain HTTP listener in milliseconds.
    pub plain_idle_timeout_ms: u64,

    /// Idle timeout of the TLS listener in milliseconds.
    pub tls_idle_timeout_ms: u64,

    /// Connection buffer size in bytes (minimum 8192).
    pub output_buffer_size: usize,

    /// Order in which top-level handlers see a request.
    pub handler_order: Vec<HandlerSlot>,

    /// Strict-Transport-Security max-age; negative disables the header.
    pub sts_max_age_secs: i64,

    pub sts_include_subdomains: bool,

    /// Directories searched for `resource:` certificate sources.
    pub resource_roots: Vec<PathBuf>,

    /// Prometheus exposition address for the management listener.
    pub management_address: Option<String>,

    /// Grace period for in-flight requests on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            plain_idle_timeout_ms: 1000 * 60 * 60,
            tls_idle_timeout_ms: 500_000,
            output_buffer_size: 32768,
            handler_order: vec![HandlerSlot::Contexts, HandlerSlot::Default],
            sts_max_age_secs: -1,
            sts_include_subdomains: false,
            resource_roots: vec![PathBuf::from("resources")],
            management_address: None,
            shutdown_grace_secs: 10,
        }
    }
}

/// Hot deployment settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DeploySettings {
    /// Directory scanned for apps.
    pub monitored_dir: PathBuf,

    /// Descriptor applied to every deployed app before its own.
    #[serde(default)]
    pub defaults_descriptor: Option<PathBuf>,
}

/// Process-level bootstrap parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StartConfig {
    pub project_name: String,

    /// Registry identifier of the application filter. Empty serves static
    /// resources only.
    pub application_name: String,

    pub runtime_configuration_type: RuntimeMode,

    /// Session timeout in seconds.
    pub session_timeout: u64,

    pub project_directory: PathBuf,

    /// Log file, removed and recreated at every start.
    pub log_file: Option<PathBuf>,

    pub webapp: PathBuf,

    pub filter_path: String,

    pub context_path: String,

    pub key_store_password: Option<String>,

    /// Certificate store: a path or `resource:<name>`.
    pub key_store_path_resource: Option<String>,

    pub http_port: i64,

    pub https_port: i64,

    pub server: ServerSettings,

    pub deploy: Option<DeploySettings>,
}

impl Default for StartConfig {
    fn default() -> Self {
        Self {
            project_name: "webapp".to_string(),
            application_name: String::new(),
            runtime_configuration_type: RuntimeMode::Development,
            session_timeout: DEFAULT_MAX_INACTIVE_INTERVAL,
            project_directory: PathBuf::from("."),
            log_file: None,
            webapp: PathBuf::from("src/main/webapp"),
            filter_path: "/*".to_string(),
            context_path: "/".to_string(),
            key_store_password: None,
            key_store_path_resource: None,
            http_port: 8080,
            https_port: 8443,
            server: ServerSettings::default(),
            deploy: None,
        }
    }
}
