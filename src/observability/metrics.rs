//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define runner metrics (requests, latency, listeners, contexts, sessions)
//! - Expose a Prometheus-compatible endpoint on the management address
//! - Follow the server lifecycle through `ManagementListener`
//!
//! # Metrics
//! - `runner_requests_total` (counter): requests by context, status
//! - `runner_request_duration_seconds` (histogram): latency by context
//! - `runner_listeners_active` (gauge): bound listeners
//! - `runner_contexts_deployed` (gauge): contexts in the collection
//! - `runner_sessions_scavenged_total` (counter): expired sessions removed
//! - `runner_deployments_total` (counter): deploy actions by kind

use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::lifecycle::{LifecycleEvent, LifecycleListener};

static EXPORTER: OnceLock<SocketAddr> = OnceLock::new();

/// Install the Prometheus exporter. Only the first call installs.
pub fn init_exporter(addr: SocketAddr) -> Result<(), String> {
    if let Some(existing) = EXPORTER.get() {
        tracing::debug!(address = %existing, "Metrics exporter already installed");
        return Ok(());
    }
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| e.to_string())?;
    let _ = EXPORTER.set(addr);
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(context_path: &str, status: u16, started: Instant) {
    counter!(
        "runner_requests_total",
        "context" => context_path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("runner_request_duration_seconds", "context" => context_path.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_listeners(active: usize) {
    gauge!("runner_listeners_active").set(active as f64);
}

pub fn record_contexts(deployed: usize) {
    gauge!("runner_contexts_deployed").set(deployed as f64);
}

pub fn record_sessions_scavenged(context_path: &str, removed: usize) {
    counter!("runner_sessions_scavenged_total", "context" => context_path.to_string())
        .increment(removed as u64);
}

pub fn record_deployment(action: &'static str) {
    counter!("runner_deployments_total", "action" => action).increment(1);
}

/// Management component attached to the server.
///
/// Installs the exporter when the server starts and keeps the listener
/// gauge in step with the lifecycle.
#[derive(Debug, Default)]
pub struct ManagementListener {
    address: Option<SocketAddr>,
}

impl ManagementListener {
    pub fn new(address: Option<SocketAddr>) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Option<SocketAddr> {
        self.address
    }
}

impl LifecycleListener for ManagementListener {
    fn on_event(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::Starting => {
                if let Some(addr) = self.address {
                    if let Err(e) = init_exporter(addr) {
                        tracing::warn!(address = %addr, error = %e, "Metrics exporter unavailable");
                    }
                }
            }
            LifecycleEvent::Started { listeners } => record_listeners(*listeners),
            LifecycleEvent::Stopped => record_listeners(0),
            _ => {}
        }
    }
}
