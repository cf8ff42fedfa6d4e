//! Server bootstrap state machine.
//!
//! # Responsibilities
//! - Attach the plain listener and, when a certificate store resolves, the
//!   TLS listener
//! - Compose the top-level handler order from settings
//! - Bind, serve and join; stop gracefully on signal or `stop`
//!
//! # Data Flow
//! ```text
//! RunConfig
//!     → configure: listeners, handler collection, deployer, management
//!     → start: bind every listener → one serving task each
//!              deployer scan + watch, session scavenger
//!     → join: wait for SIGINT/SIGTERM or stop() → graceful drain → Stopped
//! ```
//!
//! # Design Decisions
//! - States only move forward: Created → Configured → Started → Stopped
//! - An unusable certificate store degrades to HTTP only, never fails
//! - Startup is all or nothing: a listener that cannot bind stops the server

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use axum_server::Handle;
use tokio::task::{JoinHandle, JoinSet};
use tower_http::trace::TraceLayer;

use crate::config::{HandlerSlot, RuntimeMode, ServerSettings};
use crate::context::WebContext;
use crate::deploy::DeploymentManager;
use crate::error::{Result, RunnerError};
use crate::handler::{ContextCollection, DefaultHandler, Handler, HandlerCollection};
use crate::lifecycle::events::{LifecycleEvent, LifecycleListener};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::shutdown_signal;
use crate::net::{
    new_http_listener_config, new_listener, new_secure_request_customizer, new_tls_context,
    new_tls_listener, Listener, Port, HTTPS,
};
use crate::observability::metrics::{self, ManagementListener};

/// How often expired sessions are dropped.
pub const SESSION_SCAVENGE_INTERVAL: Duration = Duration::from_secs(60);

/// Everything the server needs to run. Consumed by `Server::configure`.
#[derive(Debug)]
pub struct RunConfig {
    pub http_port: Port,
    pub tls_port: Port,
    /// Certificate store path or `resource:<name>`.
    pub cert_source: Option<String>,
    pub key_store_password: Option<String>,
    pub root_context: Option<Arc<WebContext>>,
    pub handlers: Option<HandlerCollection>,
    pub contexts: Option<ContextCollection>,
    pub deployer: Option<DeploymentManager>,
    pub settings: ServerSettings,
    pub runtime_mode: RuntimeMode,
}

impl RunConfig {
    /// A run config serving plain HTTP on `http_port`; TLS port 8443.
    pub fn new(http_port: Port) -> Self {
        Self {
            http_port,
            tls_port: Port::new(8443),
            cert_source: None,
            key_store_password: None,
            root_context: None,
            handlers: None,
            contexts: None,
            deployer: None,
            settings: ServerSettings::default(),
            runtime_mode: RuntimeMode::default(),
        }
    }

    pub fn tls(
        mut self,
        port: Port,
        cert_source: impl Into<String>,
        password: Option<String>,
    ) -> Self {
        self.tls_port = port;
        self.cert_source = Some(cert_source.into());
        self.key_store_password = password;
        self
    }

    pub fn tls_port(mut self, port: Port) -> Self {
        self.tls_port = port;
        self
    }

    pub fn root_context(mut self, context: Arc<WebContext>) -> Self {
        self.root_context = Some(context);
        self
    }

    pub fn handlers(mut self, handlers: HandlerCollection) -> Self {
        self.handlers = Some(handlers);
        self
    }

    pub fn contexts(mut self, contexts: ContextCollection) -> Self {
        self.contexts = Some(contexts);
        self
    }

    pub fn deployer(mut self, deployer: DeploymentManager) -> Self {
        self.deployer = Some(deployer);
        self
    }

    pub fn settings(mut self, settings: ServerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn runtime_mode(mut self, mode: RuntimeMode) -> Self {
        self.runtime_mode = mode;
        self
    }
}

/// Lifecycle state of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Configured,
    Started,
    Stopped,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerState::Created => "created",
            ServerState::Configured => "configured",
            ServerState::Started => "started",
            ServerState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Running {
    tasks: JoinSet<std::io::Result<()>>,
    handles: Vec<Handle>,
    scavenger: JoinHandle<()>,
}

/// The web server.
pub struct Server {
    state: ServerState,
    settings: ServerSettings,
    listeners: Vec<Listener>,
    handlers: Option<HandlerCollection>,
    contexts: Option<ContextCollection>,
    deployer: Option<DeploymentManager>,
    lifecycle_listeners: Vec<Arc<dyn LifecycleListener>>,
    shutdown: Arc<Shutdown>,
    local_addrs: Vec<SocketAddr>,
    running: Option<Running>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("state", &self.state)
            .field("listeners", &self.listeners)
            .field("local_addrs", &self.local_addrs)
            .field("contexts", &self.contexts)
            .finish_non_exhaustive()
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    pub fn new() -> Self {
        Self {
            state: ServerState::Created,
            settings: ServerSettings::default(),
            listeners: Vec::new(),
            handlers: None,
            contexts: None,
            deployer: None,
            lifecycle_listeners: Vec::new(),
            shutdown: Arc::new(Shutdown::new()),
            local_addrs: Vec::new(),
            running: None,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    /// Addresses actually bound; empty until started.
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    pub fn handlers(&self) -> Option<&HandlerCollection> {
        self.handlers.as_ref()
    }

    pub fn contexts(&self) -> Option<&ContextCollection> {
        self.contexts.as_ref()
    }

    pub fn deployer(&self) -> Option<&DeploymentManager> {
        self.deployer.as_ref()
    }

    /// Handle that stops a running server from anywhere.
    pub fn shutdown_handle(&self) -> Arc<Shutdown> {
        self.shutdown.clone()
    }

    /// Attach an extra listener before the server starts.
    pub fn add_listener(&mut self, listener: Listener) -> Result<()> {
        if !matches!(self.state, ServerState::Created | ServerState::Configured) {
            return Err(self.invalid_state("created or configured"));
        }
        tracing::debug!(port = %listener.port(), scheme = listener.scheme(), "Listener attached");
        self.listeners.push(listener);
        Ok(())
    }

    pub fn add_lifecycle_listener(&mut self, listener: Arc<dyn LifecycleListener>) {
        self.lifecycle_listeners.push(listener);
    }

    /// Wire listeners, handlers and managed components.
    pub fn configure(&mut self, config: RunConfig) -> Result<()> {
        self.expect_state(ServerState::Created)?;
        let settings = config.settings;

        // Nothing below touches `self` until every fallible step has passed.
        let management = settings
            .management_address
            .as_deref()
            .map(|addr| {
                addr.parse::<SocketAddr>().map_err(|e| {
                    RunnerError::invalid(format!("management address '{}': {}", addr, e))
                })
            })
            .transpose()?;

        let base = new_http_listener_config(
            HTTPS,
            i64::from(config.tls_port.get()),
            settings.output_buffer_size,
        )?;
        let mut listeners = vec![new_listener(
            base.clone(),
            i64::from(config.http_port.get()),
            settings.plain_idle_timeout_ms,
        )?];

        let cert_source = config
            .cert_source
            .as_deref()
            .map(str::trim)
            .filter(|source| !source.is_empty());
        match cert_source {
            None => tracing::info!("TLS unavailable: no certificate store configured"),
            Some(source) => match new_tls_context(
                source,
                &settings.resource_roots,
                config.key_store_password.as_deref(),
                None,
            ) {
                Ok(tls) => {
                    let customizer = new_secure_request_customizer(
                        settings.sts_max_age_secs,
                        settings.sts_include_subdomains,
                    );
                    let listener = new_tls_listener(
                        tls,
                        base.with_customizer(customizer),
                        i64::from(config.tls_port.get()),
                        settings.tls_idle_timeout_ms,
                    )?;
                    tracing::info!(
                        port = %config.tls_port,
                        cert_source = %source,
                        "TLS listener attached"
                    );
                    listeners.push(listener);
                }
                Err(e) => {
                    tracing::warn!(
                        cert_source = %source,
                        error = %e,
                        "TLS unavailable: certificate store unusable, serving HTTP only"
                    );
                }
            },
        }

        let contexts = config.contexts.unwrap_or_default();
        let mut handlers = config.handlers.unwrap_or_default();
        let order = &settings.handler_order;

        if let Some(root) = &config.root_context {
            if !order.contains(&HandlerSlot::RootContext)
                && contexts.get(root.context_path()).is_none()
            {
                contexts.add(root.clone());
            }
        }

        let show_contexts = config.runtime_mode == RuntimeMode::Development;
        let mut composed = Vec::with_capacity(order.len());
        for slot in order {
            match slot {
                HandlerSlot::RootContext => match &config.root_context {
                    Some(root) => composed.push(Handler::Context(root.clone())),
                    None => tracing::debug!("No root context, slot skipped"),
                },
                HandlerSlot::Contexts => composed.push(Handler::Contexts(contexts.clone())),
                HandlerSlot::Default => composed.push(Handler::Default(DefaultHandler::new(
                    Some(contexts.clone()),
                    show_contexts,
                ))),
            }
        }
        handlers.set_handlers(composed);

        if let Some(deployer) = &config.deployer {
            if !deployer.contexts().same_as(&contexts) {
                tracing::warn!(
                    dir = %deployer.monitored_dir().display(),
                    "Deployer targets a context collection the server does not route to"
                );
            }
        }

        tracing::info!(
            listeners = self.listeners.len() + listeners.len(),
            handlers = ?handlers.handlers().iter().map(Handler::kind).collect::<Vec<_>>(),
            contexts = contexts.len(),
            deployer = config.deployer.is_some(),
            runtime_mode = %config.runtime_mode,
            "Server configured"
        );

        self.listeners.extend(listeners);
        self.lifecycle_listeners
            .push(Arc::new(ManagementListener::new(management)));
        self.settings = settings;
        self.handlers = Some(handlers);
        self.contexts = Some(contexts);
        self.deployer = config.deployer;
        self.state = ServerState::Configured;
        self.emit(LifecycleEvent::Configured);
        Ok(())
    }

    /// Bind every listener and begin serving.
    pub async fn start(&mut self) -> Result<()> {
        self.expect_state(ServerState::Configured)?;
        self.emit(LifecycleEvent::Starting);

        let mut bound = Vec::with_capacity(self.listeners.len());
        for listener in self.listeners.clone() {
            match listener.bind(&self.settings.host).await {
                Ok(listener) => bound.push(listener),
                Err(e) => return Err(self.fail(startup_failure(e))),
            }
        }

        let handlers = Arc::new(self.handlers.clone().unwrap_or_default());
        let app = Router::new()
            .fallback(dispatch)
            .with_state(handlers.clone())
            .layer(TraceLayer::new_for_http());

        let mut tasks = JoinSet::new();
        let mut handles = Vec::with_capacity(bound.len());
        for listener in bound {
            let handle = Handle::new();
            self.local_addrs.push(listener.local_addr());
            handles.push(handle.clone());
            tasks.spawn(listener.serve(app.clone(), handle));
        }

        if let Some(deployer) = &self.deployer {
            if let Err(e) = deployer.start().await {
                for handle in &handles {
                    handle.shutdown();
                }
                tasks.abort_all();
                return Err(self.fail(startup_failure(e)));
            }
        }

        let scavenger = tokio::spawn(scavenge_sessions(handlers));
        self.running = Some(Running {
            tasks,
            handles,
            scavenger,
        });
        self.state = ServerState::Started;

        tracing::info!(addresses = ?self.local_addrs, "Server started");
        self.emit(LifecycleEvent::Started {
            listeners: self.local_addrs.len(),
        });
        Ok(())
    }

    /// Wait for a shutdown request, then stop gracefully.
    ///
    /// A serving task that ends on its own is reported as a startup failure.
    pub async fn join(&mut self) -> Result<()> {
        self.expect_state(ServerState::Started)?;
        let Some(mut running) = self.running.take() else {
            return Err(self.invalid_state("started"));
        };

        let shutdown = self.shutdown.clone();
        let outcome = tokio::select! {
            _ = shutdown_signal() => Ok(()),
            _ = shutdown.triggered() => Ok(()),
            Some(joined) = running.tasks.join_next() => Err(match joined {
                Ok(Ok(())) => {
                    RunnerError::StartupFailure("listener stopped unexpectedly".to_string())
                }
                Ok(Err(e)) => RunnerError::StartupFailure(format!("listener failed: {}", e)),
                Err(e) => RunnerError::StartupFailure(format!("listener task failed: {}", e)),
            }),
        };

        self.shutdown.trigger();
        self.emit(LifecycleEvent::Stopping);
        let grace = Duration::from_secs(self.settings.shutdown_grace_secs);
        tracing::info!(grace_secs = grace.as_secs(), "Stopping listeners");
        for handle in &running.handles {
            handle.graceful_shutdown(Some(grace));
        }
        while let Some(joined) = running.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Listener closed with error"),
                Err(e) => tracing::warn!(error = %e, "Listener task aborted"),
            }
        }
        running.scavenger.abort();

        if let Some(deployer) = &self.deployer {
            deployer.stop();
        }

        self.state = ServerState::Stopped;
        match &outcome {
            Ok(()) => {
                tracing::info!("Server stopped");
                self.emit(LifecycleEvent::Stopped);
            }
            Err(e) => {
                tracing::error!(error = %e, "Server stopped after failure");
                self.emit(LifecycleEvent::Failed);
            }
        }
        outcome
    }

    /// Ask a running server to stop. `join` returns once drained.
    pub fn stop(&self) {
        tracing::info!(state = %self.state, "Stop requested");
        self.shutdown.trigger();
    }

    fn emit(&self, event: LifecycleEvent) {
        tracing::debug!(event = %event, "Lifecycle event");
        for listener in &self.lifecycle_listeners {
            listener.on_event(&event);
        }
    }

    fn fail(&mut self, error: RunnerError) -> RunnerError {
        tracing::error!(error = %error, "Server failed to start");
        self.state = ServerState::Stopped;
        self.emit(LifecycleEvent::Failed);
        error
    }

    fn expect_state(&self, expected: ServerState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.invalid_state(expected.as_str()))
        }
    }

    fn invalid_state(&self, expected: &'static str) -> RunnerError {
        RunnerError::InvalidState {
            expected,
            actual: self.state.as_str(),
        }
    }
}

fn startup_failure(error: RunnerError) -> RunnerError {
    match error {
        RunnerError::StartupFailure(_) => error,
        other => RunnerError::StartupFailure(other.to_string()),
    }
}

async fn dispatch(State(handlers): State<Arc<HandlerCollection>>, req: Request<Body>) -> Response {
    handlers.handle(req).await
}

/// Contexts currently reachable through the handler tree.
fn live_contexts(handlers: &HandlerCollection) -> Vec<Arc<WebContext>> {
    let mut contexts: Vec<Arc<WebContext>> = Vec::new();
    for handler in handlers.handlers() {
        let found = match handler {
            Handler::Context(context) => vec![context.clone()],
            Handler::Contexts(collection) => collection.contexts(),
            Handler::Default(_) => Vec::new(),
        };
        for context in found {
            if !contexts.iter().any(|known| Arc::ptr_eq(known, &context)) {
                contexts.push(context);
            }
        }
    }
    contexts
}

async fn scavenge_sessions(handlers: Arc<HandlerCollection>) {
    let mut interval = tokio::time::interval(SESSION_SCAVENGE_INTERVAL);
    interval.tick().await;
    loop {
        interval.tick().await;
        for context in live_contexts(&handlers) {
            let removed = context.sessions().scavenge();
            if removed > 0 {
                tracing::debug!(
                    context_path = %context.context_path(),
                    removed,
                    "Expired sessions dropped"
                );
                metrics::record_sessions_scavenged(context.context_path(), removed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextConfig;
    use crate::context::{assemble_context, ComponentRegistry};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<LifecycleEvent>>);

    impl LifecycleListener for Recorder {
        fn on_event(&self, event: &LifecycleEvent) {
            self.0.lock().unwrap().push(*event);
        }
    }

    fn local_settings() -> ServerSettings {
        ServerSettings {
            host: "127.0.0.1".to_string(),
            shutdown_grace_secs: 1,
            ..ServerSettings::default()
        }
    }

    fn root(dir: &std::path::Path) -> Arc<WebContext> {
        assemble_context(ContextConfig::new(dir), &ComponentRegistry::with_builtins()).unwrap()
    }

    fn write_bundle(dir: &std::path::Path) -> std::path::PathBuf {
        let key = rcgen::KeyPair::generate().unwrap();
        let params = rcgen::CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        let cert = params.self_signed(&key).unwrap();
        let path = dir.join("keystore.pem");
        std::fs::write(&path, format!("{}{}", cert.pem(), key.serialize_pem())).unwrap();
        path
    }

    #[test]
    fn missing_certificate_serves_http_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::new(Port::new(8080))
            .tls(Port::new(8443), dir.path().join("absent.pem").display().to_string(), None)
            .root_context(root(dir.path()))
            .settings(local_settings());

        let mut server = Server::new();
        server.configure(config).unwrap();
        assert_eq!(server.state(), ServerState::Configured);
        assert_eq!(server.listeners().len(), 1);
        assert_eq!(server.listeners()[0].port(), Port::new(8080));
        assert!(!server.listeners()[0].is_secure());
    }

    #[test]
    fn valid_certificate_adds_tls_listener() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = write_bundle(dir.path());
        let config = RunConfig::new(Port::new(8080))
            .tls(Port::new(8443), bundle.display().to_string(), Some("changeit".into()))
            .settings(local_settings());

        let mut server = Server::new();
        server.configure(config).unwrap();
        let listeners = server.listeners();
        assert_eq!(listeners.len(), 2);
        assert_ne!(listeners[0].port(), listeners[1].port());
        assert!(!listeners[0].is_secure());
        assert!(listeners[1].is_secure());
        assert_eq!(listeners[1].port(), Port::new(8443));
        assert!(listeners[1].config().secure_customizer.is_some());
        assert_eq!(listeners[0].idle_timeout(), Duration::from_millis(3_600_000));
        assert_eq!(listeners[1].idle_timeout(), Duration::from_millis(500_000));
    }

    #[test]
    fn default_order_routes_root_through_contexts() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::new(Port::new(8080))
            .root_context(root(dir.path()))
            .settings(local_settings());

        let mut server = Server::new();
        server.configure(config).unwrap();
        let kinds: Vec<_> = server
            .handlers()
            .unwrap()
            .handlers()
            .iter()
            .map(Handler::kind)
            .collect();
        assert_eq!(kinds, vec!["contexts", "default"]);
        assert!(server.contexts().unwrap().get("/").is_some());
    }

    #[test]
    fn explicit_order_attaches_root_context() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ServerSettings {
            handler_order: vec![
                HandlerSlot::RootContext,
                HandlerSlot::Contexts,
                HandlerSlot::Default,
            ],
            ..local_settings()
        };
        let config = RunConfig::new(Port::new(8080))
            .root_context(root(dir.path()))
            .runtime_mode(RuntimeMode::Deployment)
            .settings(settings);

        let mut server = Server::new();
        server.configure(config).unwrap();
        let handlers = server.handlers().unwrap().handlers();
        let kinds: Vec<_> = handlers.iter().map(Handler::kind).collect();
        assert_eq!(kinds, vec!["root-context", "contexts", "default"]);
        assert!(server.contexts().unwrap().is_empty());
        match &handlers[2] {
            Handler::Default(default) => assert!(!default.shows_contexts()),
            other => panic!("unexpected handler {:?}", other.kind()),
        }
    }

    #[test]
    fn bad_management_address_is_rejected() {
        let settings = ServerSettings {
            management_address: Some("not-an-address".into()),
            ..local_settings()
        };
        let err = Server::new()
            .configure(RunConfig::new(Port::new(8080)).settings(settings))
            .unwrap_err();
        assert!(matches!(err, RunnerError::InvalidArgument(_)));
    }

    #[test]
    fn failed_configure_leaves_server_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let root = root(dir.path());
        let contexts = ContextCollection::new();
        let bad = ServerSettings {
            management_address: Some("not-an-address".into()),
            ..local_settings()
        };

        let mut server = Server::new();
        let err = server
            .configure(
                RunConfig::new(Port::new(0))
                    .root_context(root.clone())
                    .contexts(contexts.clone())
                    .settings(bad),
            )
            .unwrap_err();
        assert!(matches!(err, RunnerError::InvalidArgument(_)));
        assert_eq!(server.state(), ServerState::Created);
        assert!(server.listeners().is_empty());
        assert!(server.lifecycle_listeners.is_empty());
        assert!(contexts.is_empty());

        server
            .configure(
                RunConfig::new(Port::new(0))
                    .root_context(root)
                    .contexts(contexts.clone())
                    .settings(local_settings()),
            )
            .unwrap();
        assert_eq!(server.state(), ServerState::Configured);
        assert_eq!(server.listeners().len(), 1);
        assert_eq!(server.lifecycle_listeners.len(), 1);
        assert_eq!(contexts.len(), 1);
    }

    #[tokio::test]
    async fn operations_require_their_state() {
        let mut server = Server::new();
        assert!(matches!(server.start().await, Err(RunnerError::InvalidState { .. })));
        assert!(matches!(server.join().await, Err(RunnerError::InvalidState { .. })));

        server.configure(RunConfig::new(Port::new(0)).settings(local_settings())).unwrap();
        let err = server
            .configure(RunConfig::new(Port::new(0)).settings(local_settings()))
            .unwrap_err();
        assert!(matches!(
            err,
            RunnerError::InvalidState { expected: "created", actual: "configured" }
        ));
    }

    #[tokio::test]
    async fn start_stop_join() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder::default());
        let mut server = Server::new();
        server.add_lifecycle_listener(recorder.clone());
        server
            .configure(
                RunConfig::new(Port::new(0))
                    .root_context(root(dir.path()))
                    .settings(local_settings()),
            )
            .unwrap();

        server.start().await.unwrap();
        assert_eq!(server.state(), ServerState::Started);
        assert_eq!(server.local_addrs().len(), 1);
        assert_ne!(server.local_addrs()[0].port(), 0);
        let extra = server.listeners()[0].clone();
        assert!(server.add_listener(extra).is_err());

        server.stop();
        server.join().await.unwrap();
        assert_eq!(server.state(), ServerState::Stopped);

        let events = recorder.0.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                LifecycleEvent::Configured,
                LifecycleEvent::Starting,
                LifecycleEvent::Started { listeners: 1 },
                LifecycleEvent::Stopping,
                LifecycleEvent::Stopped,
            ]
        );
    }

    #[tokio::test]
    async fn bind_conflict_fails_start() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let mut server = Server::new();
        server
            .configure(RunConfig::new(Port::new(port)).settings(local_settings()))
            .unwrap();
        let err = server.start().await.unwrap_err();
        assert!(matches!(err, RunnerError::StartupFailure(_)));
        assert_eq!(server.state(), ServerState::Stopped);
    }
}
