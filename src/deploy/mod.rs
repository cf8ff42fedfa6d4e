//! Hot deployment subsystem.
//!
//! # Data Flow
//! ```text
//! monitored dir ──(PollWatcher, 1s)──▶ watcher.rs ──change──▶ manager.rs rescan
//!     directory app ─────────────────────────────┐
//!     archive app ──▶ archive.rs extract ──▶ work dir/<app>-<uuid>
//!                                                ▼
//!     defaults descriptor → context.toml → assemble_context → ContextCollection
//! ```
//!
//! # Design Decisions
//! - The scan interval is fixed; it is not a configuration value
//! - Scans run on the blocking pool since they touch the filesystem

pub mod archive;
pub mod manager;
pub mod watcher;

pub use manager::{
    new_deployment_manager, DeploymentManager, ScanReport, APP_DESCRIPTOR,
    CONTAINER_INCLUDE_JAR_PATTERN, CONTAINER_INCLUDE_JAR_PATTERN_ATTRIBUTE, SCAN_INTERVAL,
};
