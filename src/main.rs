//! webapp-runner
//!
//! Serves a web application directory through assembled contexts, with an
//! optional TLS listener and optional hot deployment.
//!
//! # Architecture Overview
//!
//! ```text
//!   StartConfig (TOML + CLI overrides)
//!        │
//!        ▼
//!   lifecycle::startup ──▶ context::assembler ──▶ handler::ContextCollection
//!        │                                              ▲
//!        │                               deploy::DeploymentManager (rescans)
//!        ▼
//!   lifecycle::server ──▶ net listeners (HTTP, optional TLS)
//!        │                      │
//!        │                      ▼
//!        │               HandlerCollection ──▶ WebContext
//!        │                                      filters → servlet
//!        ▼
//!   join until SIGINT/SIGTERM ──▶ exit status
//! ```

use std::path::PathBuf;
use std::process;

use clap::Parser;

use webapp_runner::config::loader::{load_config, ConfigError};
use webapp_runner::config::validation::validate_config;
use webapp_runner::config::{DeploySettings, RuntimeMode, StartConfig};
use webapp_runner::context::ComponentRegistry;
use webapp_runner::lifecycle::bootstrap::{self, error_chain, CONFIG_ERROR_EXIT_CODE};
use webapp_runner::lifecycle::startup::prepare;
use webapp_runner::observability::logging::{init_logging, reset_log_file};

#[derive(Parser)]
#[command(name = "webapp-runner")]
#[command(about = "Run a web application directory over HTTP and HTTPS", long_about = None)]
struct Cli {
    /// Start configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    http_port: Option<i64>,

    #[arg(long)]
    https_port: Option<i64>,

    /// Webapp directory served by the root context.
    #[arg(short, long)]
    webapp: Option<PathBuf>,

    #[arg(long)]
    context_path: Option<String>,

    /// Runtime configuration type: development or deployment.
    #[arg(short, long)]
    mode: Option<RuntimeMode>,

    /// Certificate store: a path or `resource:<name>`.
    #[arg(long)]
    keystore: Option<String>,

    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Directory watched for hot-deployed apps.
    #[arg(long)]
    deploy_dir: Option<PathBuf>,
}

impl Cli {
    fn start_config(&self) -> Result<StartConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => StartConfig::default(),
        };

        if let Some(port) = self.http_port {
            config.http_port = port;
        }
        if let Some(port) = self.https_port {
            config.https_port = port;
        }
        if let Some(webapp) = &self.webapp {
            config.webapp = webapp.clone();
        }
        if let Some(path) = &self.context_path {
            config.context_path = path.clone();
        }
        if let Some(mode) = self.mode {
            config.runtime_configuration_type = mode;
        }
        if let Some(keystore) = &self.keystore {
            config.key_store_path_resource = Some(keystore.clone());
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = Some(log_file.clone());
        }
        if let Some(dir) = &self.deploy_dir {
            let defaults = config.deploy.take().and_then(|d| d.defaults_descriptor);
            config.deploy = Some(DeploySettings {
                monitored_dir: dir.clone(),
                defaults_descriptor: defaults,
            });
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.start_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("webapp-runner: {}", e);
            process::exit(CONFIG_ERROR_EXIT_CODE);
        }
    };

    let log_file = config.log_file_path();
    let reset = log_file.as_deref().map(reset_log_file);
    let guard = match init_logging(log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("webapp-runner: {}", e);
            process::exit(CONFIG_ERROR_EXIT_CODE);
        }
    };
    if let (Some(path), Some(Err(e))) = (&log_file, &reset) {
        tracing::error!(path = %path.display(), error = %e, "Log file could not be deleted");
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "webapp-runner starting");

    let code = match prepare(config, &ComponentRegistry::with_builtins()) {
        Ok(run) => bootstrap::run(run).await,
        Err(e) => {
            tracing::error!(error = %error_chain(&e), "Startup configuration rejected");
            CONFIG_ERROR_EXIT_CODE
        }
    };

    tracing::info!(exit_code = code, "Shutdown complete");
    drop(guard);
    process::exit(code);
}
