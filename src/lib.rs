//! Embedded web application runner.
//!
//! Assembles servlet-style contexts (filters, servlets, sessions, static
//! resources) from configuration, serves them over plain HTTP and optional
//! TLS, and hot-deploys apps dropped into a monitored directory.

pub mod config;
pub mod context;
pub mod deploy;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::StartConfig;
pub use error::{Result, RunnerError};
pub use lifecycle::{RunConfig, Server, Shutdown};
