//! Startup translation from `StartConfig` to a runnable `RunConfig`.
//!
//! # Responsibilities
//! - Derive the root context configuration from process parameters
//! - Assemble the root context into a fresh context collection
//! - Build the deployment manager when a monitored directory is configured
//!
//! # Design Decisions
//! - Relative webapp, log and deploy paths resolve against the project
//!   directory
//! - The runtime mode travels as configuration into every context, never as
//!   process-wide state

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ContextConfig, FilterConfig, ServletConfig, StartConfig};
use crate::context::{assemble_context, builtin, ComponentRegistry, WebContext};
use crate::deploy::{new_deployment_manager, DeploymentManager};
use crate::error::Result;
use crate::handler::ContextCollection;
use crate::lifecycle::server::RunConfig;
use crate::net::Port;

/// Context init parameter naming the application.
pub const APPLICATION_NAME_PARAMETER: &str = "applicationName";

/// Context init parameter carrying the runtime mode.
pub const CONFIGURATION_PARAMETER: &str = "configuration";

/// Filter init parameter repeating the filter's url pattern.
pub const FILTER_MAPPING_PARAMETER: &str = "filterMappingUrlPattern";

impl StartConfig {
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_directory.join(path)
        }
    }

    /// Webapp directory, resolved against the project directory.
    pub fn webapp_path(&self) -> PathBuf {
        self.resolve(&self.webapp)
    }

    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.log_file.as_deref().map(|path| self.resolve(path))
    }

    /// Root context configuration for these parameters.
    ///
    /// With an application name set, the application filter and a resource
    /// servlet are both mapped at `filter_path`.
    pub fn context_config(&self) -> ContextConfig {
        let mode = self.runtime_configuration_type;
        let mut context = ContextConfig::new(self.webapp_path())
            .context_path(self.context_path.clone())
            .max_inactive_interval(self.session_timeout)
            .runtime_mode(mode)
            .init_parameter(CONFIGURATION_PARAMETER, mode.as_str());

        if !self.application_name.is_empty() {
            context = context
                .init_parameter(APPLICATION_NAME_PARAMETER, self.application_name.clone())
                .filter(
                    FilterConfig::new(self.application_name.clone())
                        .name(self.project_name.clone())
                        .filter_path(self.filter_path.clone())
                        .init_parameter(FILTER_MAPPING_PARAMETER, self.filter_path.clone()),
                )
                .servlet(ServletConfig::new(builtin::RESOURCE).path_spec(self.filter_path.clone()));
        }
        context
    }
}

/// Build the run config from already assembled parts.
pub fn new_run_config(
    root_context: Option<Arc<WebContext>>,
    contexts: ContextCollection,
    deployer: Option<DeploymentManager>,
    config: &StartConfig,
) -> Result<RunConfig> {
    let mut run = RunConfig::new(Port::try_from(config.http_port)?)
        .tls_port(Port::try_from(config.https_port)?)
        .contexts(contexts)
        .settings(config.server.clone())
        .runtime_mode(config.runtime_configuration_type);
    run.cert_source = config.key_store_path_resource.clone();
    run.key_store_password = config.key_store_password.clone();

    if let Some(root) = root_context {
        run = run.root_context(root);
    }
    if let Some(deployer) = deployer {
        run = run.deployer(deployer);
    }
    Ok(run)
}

/// Assemble everything `config` describes.
pub fn prepare(config: StartConfig, registry: &ComponentRegistry) -> Result<RunConfig> {
    let contexts = ContextCollection::new();
    let root = assemble_context(config.context_config().parent(contexts.clone()), registry)?;

    let deployer = match &config.deploy {
        Some(deploy) => {
            let manager = new_deployment_manager(
                contexts.clone(),
                config.resolve(&deploy.monitored_dir),
                deploy.defaults_descriptor.as_deref().map(|path| config.resolve(path)),
            )?
            .with_registry(registry.clone())
            .with_runtime_mode(config.runtime_configuration_type);
            Some(manager)
        }
        None => None,
    };

    tracing::info!(
        project = %config.project_name,
        context_path = %root.context_path(),
        webapp = %root.resource_base().display(),
        http_port = config.http_port,
        https_port = config.https_port,
        deploy = deployer.is_some(),
        "Startup configuration prepared"
    );
    new_run_config(Some(root), contexts, deployer, &config)
}

/// Conventional `src/main/webapp` directory of a project.
///
/// `project_dir` may be the project itself or its parent.
pub fn webapp_directory(project_dir: &Path, project_name: &str) -> PathBuf {
    let base = if project_dir.ends_with(project_name) {
        project_dir.to_path_buf()
    } else {
        project_dir.join(project_name)
    };
    base.join("src").join("main").join("webapp")
}
