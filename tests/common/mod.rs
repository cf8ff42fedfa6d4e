//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use webapp_runner::config::ServerSettings;
use webapp_runner::lifecycle::{RunConfig, Server, Shutdown};

/// A server started on ephemeral ports, joined on a background task.
pub struct TestServer {
    pub addrs: Vec<SocketAddr>,
    shutdown: Arc<Shutdown>,
    join: JoinHandle<webapp_runner::Result<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addrs[0], path)
    }

    /// Stop the server and wait for it to drain.
    pub async fn stop(self) -> webapp_runner::Result<()> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.join)
            .await
            .expect("server did not stop in time")
            .expect("join task panicked")
    }
}

/// Settings binding to loopback with a short drain.
pub fn loopback_settings() -> ServerSettings {
    ServerSettings {
        host: "127.0.0.1".to_string(),
        shutdown_grace_secs: 1,
        ..ServerSettings::default()
    }
}

pub async fn start(config: RunConfig) -> TestServer {
    let mut server = Server::new();
    server.configure(config).unwrap();
    server.start().await.unwrap();

    let addrs = server.local_addrs().to_vec();
    let shutdown = server.shutdown_handle();
    let join = tokio::spawn(async move { server.join().await });
    TestServer {
        addrs,
        shutdown,
        join,
    }
}

/// Write `files` (relative path, content) under `root`.
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
}

/// Poll `url` until it answers `status` or the timeout elapses.
pub async fn wait_for_status(
    client: &reqwest::Client,
    url: &str,
    status: u16,
    timeout: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if let Ok(response) = client.get(url).send().await {
            if response.status().as_u16() == status {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

/// Self-signed PEM bundle (certificate then key) for `localhost`.
pub fn write_cert_bundle(dir: &Path) -> std::path::PathBuf {
    let key = rcgen::KeyPair::generate().unwrap();
    let params = rcgen::CertificateParams::new(vec!["localhost".to_string()]).unwrap();
    let cert = params.self_signed(&key).unwrap();
    let path = dir.join("keystore.pem");
    std::fs::write(&path, format!("{}{}", cert.pem(), key.serialize_pem())).unwrap();
    path
}
