//! Network listeners: plain HTTP and TLS.
//!
//! # Responsibilities
//! - Validate ports and buffer sizes before anything is bound
//! - Describe a listener (transport, port, idle timeout, request config)
//! - Bind the socket and serve a router with per-listener tuning
//!
//! # Design Decisions
//! - Binding is separate from construction so `Server::configure` never
//!   touches the network; bind failures surface from `Server::start`
//! - Port 0 asks the OS for an ephemeral port

use std::fmt;
use std::net::{SocketAddr, TcpListener as StdTcpListener, ToSocketAddrs};
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use hyper_util::server::conn::auto;

use crate::error::{Result, RunnerError};
use crate::net::connection::{apply_customizers, ConnectionMeta, SecureRequestCustomizer};
use crate::net::tls::TlsContext;

/// Smallest output buffer hyper accepts.
pub const MIN_OUTPUT_BUFFER_SIZE: usize = 8192;

/// Scheme of secure listeners.
pub const HTTPS: &str = "https";

/// A TCP port in `0..=65535`. Zero means "any free port".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Port(u16);

impl Port {
    pub const fn new(port: u16) -> Self {
        Self(port)
    }

    pub fn get(self) -> u16 {
        self.0
    }

    pub fn is_ephemeral(self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<i64> for Port {
    type Error = RunnerError;

    fn try_from(value: i64) -> Result<Self> {
        u16::try_from(value)
            .map(Port)
            .map_err(|_| RunnerError::invalid(format!("port {} is outside 0..=65535", value)))
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request-handling configuration shared by listeners.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Scheme used when redirecting to a confidential channel.
    pub secure_scheme: String,
    /// Port used when redirecting to a confidential channel.
    pub secure_port: Port,
    /// Maximum buffered bytes per connection.
    pub output_buffer_size: usize,
    /// Present on configs handed to TLS listeners.
    pub secure_customizer: Option<SecureRequestCustomizer>,
}

impl ListenerConfig {
    /// Copy of this config with the secure-request customizer attached.
    pub fn with_customizer(&self, customizer: SecureRequestCustomizer) -> Self {
        Self {
            secure_customizer: Some(customizer),
            ..self.clone()
        }
    }
}

/// Build the base listener config.
pub fn new_http_listener_config(
    secure_scheme: &str,
    secure_port: i64,
    output_buffer_size: usize,
) -> Result<ListenerConfig> {
    let secure_port = Port::try_from(secure_port)?;
    if secure_scheme.trim().is_empty() {
        return Err(RunnerError::invalid("secure scheme must not be empty"));
    }
    if output_buffer_size < MIN_OUTPUT_BUFFER_SIZE {
        return Err(RunnerError::invalid(format!(
            "output buffer size {} is below the minimum of {}",
            output_buffer_size, MIN_OUTPUT_BUFFER_SIZE
        )));
    }
    Ok(ListenerConfig {
        secure_scheme: secure_scheme.to_string(),
        secure_port,
        output_buffer_size,
        secure_customizer: None,
    })
}

#[derive(Debug, Clone)]
enum Transport {
    Plain,
    Tls(TlsContext),
}

/// An unbound listener description.
#[derive(Debug, Clone)]
pub struct Listener {
    config: ListenerConfig,
    transport: Transport,
    port: Port,
    idle_timeout: Duration,
}

/// Create a plain HTTP listener.
pub fn new_listener(config: ListenerConfig, port: i64, idle_timeout_ms: u64) -> Result<Listener> {
    Ok(Listener {
        config,
        transport: Transport::Plain,
        port: Port::try_from(port)?,
        idle_timeout: Duration::from_millis(idle_timeout_ms),
    })
}

/// Create a TLS listener speaking HTTP/1.1 (and h2 via ALPN).
pub fn new_tls_listener(
    tls: TlsContext,
    config: ListenerConfig,
    port: i64,
    idle_timeout_ms: u64,
) -> Result<Listener> {
    Ok(Listener {
        config,
        transport: Transport::Tls(tls),
        port: Port::try_from(port)?,
        idle_timeout: Duration::from_millis(idle_timeout_ms),
    })
}

impl Listener {
    pub fn port(&self) -> Port {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        matches!(self.transport, Transport::Tls(_))
    }

    pub fn scheme(&self) -> &'static str {
        if self.is_secure() {
            HTTPS
        } else {
            "http"
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Bind the socket on `host`.
    pub async fn bind(&self, host: &str) -> Result<BoundListener> {
        let addr = resolve(host, self.port)?;
        let inner = StdTcpListener::bind(addr).map_err(|e| {
            RunnerError::StartupFailure(format!("failed to bind {}: {}", addr, e))
        })?;
        let local_addr = inner.local_addr()?;

        let tls = match &self.transport {
            Transport::Plain => None,
            Transport::Tls(context) => Some(context.rustls_config().await?),
        };

        tracing::info!(
            address = %local_addr,
            scheme = self.scheme(),
            ephemeral = self.port.is_ephemeral(),
            idle_timeout_ms = self.idle_timeout.as_millis() as u64,
            "Listener bound"
        );

        Ok(BoundListener {
            inner,
            local_addr,
            config: self.config.clone(),
            tls,
            idle_timeout: self.idle_timeout,
        })
    }
}

fn resolve(host: &str, port: Port) -> Result<SocketAddr> {
    (host, port.get())
        .to_socket_addrs()
        .map_err(|e| RunnerError::StartupFailure(format!("cannot resolve '{}': {}", host, e)))?
        .next()
        .ok_or_else(|| RunnerError::StartupFailure(format!("'{}' resolved to no address", host)))
}

/// A bound socket ready to serve.
pub struct BoundListener {
    inner: StdTcpListener,
    local_addr: SocketAddr,
    config: ListenerConfig,
    tls: Option<RustlsConfig>,
    idle_timeout: Duration,
}

impl fmt::Debug for BoundListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundListener")
            .field("local_addr", &self.local_addr)
            .field("secure", &self.tls.is_some())
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}

impl BoundListener {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }

    /// Serve `app` until `handle` is shut down.
    pub async fn serve(self, app: Router, handle: Handle) -> std::io::Result<()> {
        let secure = self.tls.is_some();
        let meta = ConnectionMeta {
            scheme: if secure { HTTPS } else { "http" },
            secure,
            local_addr: self.local_addr,
            secure_scheme: self.config.secure_scheme.clone(),
            secure_port: self.config.secure_port,
        };
        let app = apply_customizers(app, meta, self.config.secure_customizer.as_ref());
        let make_service = app.into_make_service_with_connect_info::<SocketAddr>();

        match self.tls {
            None => {
                let mut server = axum_server::from_tcp(self.inner).handle(handle);
                tune(server.http_builder(), self.idle_timeout, self.config.output_buffer_size);
                server.serve(make_service).await
            }
            Some(tls) => {
                let mut server =
                    axum_server::tls_rustls::from_tcp_rustls(self.inner, tls).handle(handle);
                tune(server.http_builder(), self.idle_timeout, self.config.output_buffer_size);
                server.serve(make_service).await
            }
        }
    }
}

fn tune(builder: &mut auto::Builder<TokioExecutor>, idle_timeout: Duration, buffer_size: usize) {
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(idle_timeout)
        .max_buf_size(buffer_size);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::connection::new_secure_request_customizer;

    #[test]
    fn port_range_is_enforced() {
        assert_eq!(Port::try_from(0).unwrap().get(), 0);
        assert_eq!(Port::try_from(65_535).unwrap().get(), 65_535);
        assert!(matches!(Port::try_from(-1), Err(RunnerError::InvalidArgument(_))));
        assert!(matches!(Port::try_from(65_536), Err(RunnerError::InvalidArgument(_))));
    }

    #[test]
    fn http_config_validates_inputs() {
        let config = new_http_listener_config("https", 8443, 32_768).unwrap();
        assert_eq!(config.secure_port, Port::new(8443));
        assert!(config.secure_customizer.is_none());

        assert!(new_http_listener_config("https", 70_000, 32_768).is_err());
        assert!(new_http_listener_config("", 8443, 32_768).is_err());
        assert!(new_http_listener_config("https", 8443, 1024).is_err());
    }

    #[test]
    fn customized_config_keeps_base_values() {
        let base = new_http_listener_config("https", 8443, 16_384).unwrap();
        let secure = base.with_customizer(new_secure_request_customizer(-1, false));
        assert_eq!(secure.output_buffer_size, 16_384);
        assert!(secure.secure_customizer.is_some());
        assert!(base.secure_customizer.is_none());
    }

    #[test]
    fn plain_listener_properties() {
        let config = new_http_listener_config("https", 8443, 32_768).unwrap();
        let listener = new_listener(config, 8080, 3_600_000).unwrap();
        assert_eq!(listener.port(), Port::new(8080));
        assert!(!listener.is_secure());
        assert_eq!(listener.scheme(), "http");
        assert_eq!(listener.idle_timeout(), Duration::from_secs(3600));
    }

    #[test]
    fn listener_rejects_bad_port() {
        let config = new_http_listener_config("https", 8443, 32_768).unwrap();
        assert!(new_listener(config, 99_999, 1000).is_err());
    }

    #[tokio::test]
    async fn ephemeral_bind_reports_real_port() {
        let config = new_http_listener_config("https", 8443, 32_768).unwrap();
        let listener = new_listener(config, 0, 1000).unwrap();
        assert!(listener.port().is_ephemeral());
        let bound = listener.bind("127.0.0.1").await.unwrap();
        assert_ne!(bound.local_addr().port(), 0);
        assert!(!bound.is_secure());
    }

    #[tokio::test]
    async fn bind_conflict_is_startup_failure() {
        let taken = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let config = new_http_listener_config("https", 8443, 32_768).unwrap();
        let listener = new_listener(config, i64::from(port), 1000).unwrap();
        let err = listener.bind("127.0.0.1").await.unwrap_err();
        assert!(matches!(err, RunnerError::StartupFailure(_)));
    }
}
