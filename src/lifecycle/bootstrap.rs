//! Process-level entry into the server lifecycle.
//!
//! # Responsibilities
//! - Run configure → start → join for one `RunConfig`
//! - Turn the outcome into a process exit status
//!
//! # Design Decisions
//! - Configuration errors are reported before anything binds and keep
//!   their own exit status
//! - Anything failing once listeners begin binding exits with 100; there is
//!   no retry and no partial start

use std::error::Error;

use crate::error::Result;
use crate::lifecycle::server::{RunConfig, Server};

/// Exit status after a failure while starting or joining the server.
pub const STARTUP_FAILURE_EXIT_CODE: i32 = 100;

/// Exit status for configuration rejected before the server starts.
pub const CONFIG_ERROR_EXIT_CODE: i32 = 2;

/// Configure, start and join a fresh server, returning the first error.
pub async fn try_run(config: RunConfig) -> Result<()> {
    let mut server = Server::new();
    run_server(&mut server, config).await
}

/// Configure, start and join `server`.
pub async fn run_server(server: &mut Server, config: RunConfig) -> Result<()> {
    server.configure(config)?;
    server.start().await?;
    server.join().await
}

/// Run the server to completion and return the process exit status.
pub async fn run(config: RunConfig) -> i32 {
    let mut server = Server::new();
    run_with(&mut server, config).await
}

/// Like [`run`] for a caller-provided server.
pub async fn run_with(server: &mut Server, config: RunConfig) -> i32 {
    if let Err(e) = server.configure(config) {
        tracing::error!(error = %error_chain(&e), "Invalid server configuration");
        return CONFIG_ERROR_EXIT_CODE;
    }

    let outcome = match server.start().await {
        Ok(()) => server.join().await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(
                error = %error_chain(&e),
                exit_code = STARTUP_FAILURE_EXIT_CODE,
                "Server failed"
            );
            STARTUP_FAILURE_EXIT_CODE
        }
    }
}

/// `error: cause: cause` for logging.
pub fn error_chain(error: &dyn Error) -> String {
    let mut chain = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}
