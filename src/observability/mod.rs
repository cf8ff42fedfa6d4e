//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events: stdout + optional log file)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Operators reading stdout or the log file
//!     → Prometheus scraping the management listener
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event, never formatted-only messages
//! - Metrics are cheap (atomic increments) and recorded even when no
//!   exporter is installed
//! - The management listener follows the server lifecycle

pub mod logging;
pub mod metrics;
