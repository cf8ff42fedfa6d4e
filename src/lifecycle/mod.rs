//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     StartConfig → root ContextConfig → assembled context + deployer → RunConfig
//!
//! Bootstrap (bootstrap.rs, server.rs):
//!     configure → start (bind, serve, scan) → join → exit status
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT or Server::stop → drain listeners → stop deployer
//! ```
//!
//! # Design Decisions
//! - Ordered startup: contexts first, then listeners, then the deployer
//! - Ordered shutdown: stop accepting, drain with a grace period, stop
//!   managed components
//! - Lifecycle events are delivered synchronously to attached listeners

pub mod bootstrap;
pub mod events;
pub mod server;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use bootstrap::{run, try_run, CONFIG_ERROR_EXIT_CODE, STARTUP_FAILURE_EXIT_CODE};
pub use events::{LifecycleEvent, LifecycleListener};
pub use server::{RunConfig, Server, ServerState};
pub use shutdown::Shutdown;
pub use startup::{new_run_config, prepare, webapp_directory};
