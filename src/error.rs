//! Error taxonomy for the runner.
//!
//! Configuration and validation errors are local and recoverable. Anything
//! raised after listeners begin binding is reported as `StartupFailure` and
//! ends the process (see `lifecycle::bootstrap`).

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while configuring, assembling or running the server.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Malformed scalar input (bad port, empty required field, bad pattern).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The webapp directory of a context does not exist.
    #[error("webapp directory does not exist: {}", .0.display())]
    InvalidWebRoot(PathBuf),

    /// Certificate store resolution yielded nothing.
    #[error("certificate store not found: {0}")]
    CertificateNotFound(String),

    /// Certificate store was found but holds no usable certificate/key pair.
    #[error("invalid certificate store {}: {reason}", path.display())]
    InvalidCertificate { path: PathBuf, reason: String },

    /// No filter or servlet factory is registered under the identifier.
    #[error("no {kind} registered under '{id}'")]
    UnregisteredComponent { kind: &'static str, id: String },

    /// An operation was called in the wrong lifecycle state.
    #[error("server is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    /// A hot-deployed app could not be extracted or loaded.
    #[error("deployment of {} failed: {reason}", app.display())]
    Deployment { app: PathBuf, reason: String },

    /// Listeners could not be started or the server failed while running.
    #[error("server startup failed: {0}")]
    StartupFailure(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Shorthand for [`RunnerError::InvalidArgument`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// True for the TLS resolution errors that degrade to HTTP-only.
    pub fn is_tls_unavailable(&self) -> bool {
        matches!(
            self,
            RunnerError::CertificateNotFound(_) | RunnerError::InvalidCertificate { .. }
        )
    }
}

pub type Result<T, E = RunnerError> = std::result::Result<T, E>;
