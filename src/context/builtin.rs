//! Built-in filters and servlets.
//!
//! Filters: `request-log`, `response-headers`, `require-secure`.
//! Servlets: `resource` (alias `default`) and `text`.

use std::net::IpAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::context::filter::{Filter, FilterChain};
use crate::context::handler::{set_path, DispatchInfo};
use crate::context::registry::{ComponentConfig, ComponentRegistry};
use crate::context::servlet::Servlet;
use crate::error::{Result, RunnerError};
use crate::net::ConnectionMeta;

pub const REQUEST_LOG: &str = "request-log";
pub const RESPONSE_HEADERS: &str = "response-headers";
pub const REQUIRE_SECURE: &str = "require-secure";
pub const RESOURCE: &str = "resource";
pub const DEFAULT: &str = "default";
pub const TEXT: &str = "text";

/// Welcome file used when `welcomeFiles` is not set.
pub const DEFAULT_WELCOME_FILE: &str = "index.html";

pub(crate) fn register(registry: &mut ComponentRegistry) {
    registry
        .register_filter(REQUEST_LOG, request_log_filter)
        .register_filter(RESPONSE_HEADERS, response_headers_filter)
        .register_filter(REQUIRE_SECURE, require_secure_filter)
        .register_servlet(RESOURCE, resource_servlet)
        .register_servlet(DEFAULT, resource_servlet)
        .register_servlet(TEXT, text_servlet);
}

// --- filters ---

struct RequestLogFilter {
    name: String,
}

pub fn request_log_filter(config: &ComponentConfig<'_>) -> Result<Arc<dyn Filter>> {
    Ok(Arc::new(RequestLogFilter {
        name: config.name.to_string(),
    }))
}

#[async_trait]
impl Filter for RequestLogFilter {
    async fn do_filter(&self, req: Request<Body>, chain: FilterChain<'_>) -> Response {
        let started = Instant::now();
        let method = req.method().clone();
        let uri = req
            .extensions()
            .get::<DispatchInfo>()
            .map(|info| info.request_uri.clone())
            .unwrap_or_else(|| req.uri().to_string());

        let response = chain.proceed(req).await;

        tracing::info!(
            filter = %self.name,
            method = %method,
            uri = %uri,
            status = response.status().as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Request handled"
        );
        response
    }
}

struct ResponseHeadersFilter {
    headers: Vec<(HeaderName, HeaderValue)>,
}

/// Every init parameter becomes a response header.
pub fn response_headers_filter(config: &ComponentConfig<'_>) -> Result<Arc<dyn Filter>> {
    let headers = config
        .init_parameters
        .iter()
        .map(|(name, value)| {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| RunnerError::invalid(format!("header name '{}': {}", name, e)))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| RunnerError::invalid(format!("header value for {}: {}", name, e)))?;
            Ok((name, value))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Arc::new(ResponseHeadersFilter { headers }))
}

#[async_trait]
impl Filter for ResponseHeadersFilter {
    async fn do_filter(&self, req: Request<Body>, chain: FilterChain<'_>) -> Response {
        let mut response = chain.proceed(req).await;
        for (name, value) in &self.headers {
            response.headers_mut().insert(name.clone(), value.clone());
        }
        response
    }
}

struct RequireSecureFilter;

/// Redirects requests that arrived over plain HTTP to the secure listener.
pub fn require_secure_filter(_config: &ComponentConfig<'_>) -> Result<Arc<dyn Filter>> {
    Ok(Arc::new(RequireSecureFilter))
}

#[async_trait]
impl Filter for RequireSecureFilter {
    async fn do_filter(&self, req: Request<Body>, chain: FilterChain<'_>) -> Response {
        let Some(meta) = req.extensions().get::<ConnectionMeta>().cloned() else {
            return chain.proceed(req).await;
        };
        if meta.secure {
            return chain.proceed(req).await;
        }

        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(|host| host_without_port(host).to_string())
            .unwrap_or_else(|| match meta.local_addr.ip() {
                IpAddr::V4(ip) => ip.to_string(),
                IpAddr::V6(ip) => format!("[{}]", ip),
            });
        let uri = req
            .extensions()
            .get::<DispatchInfo>()
            .map(|info| info.request_uri.clone())
            .unwrap_or_else(|| req.uri().to_string());
        let location = format!(
            "{}://{}:{}{}",
            meta.secure_scheme, host, meta.secure_port, uri
        );

        tracing::debug!(location = %location, "Redirecting to secure channel");
        (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
    }
}

fn host_without_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port))
            if !name.is_empty()
                && port.chars().all(|c| c.is_ascii_digit())
                && (!name.contains(':') || name.ends_with(']')) =>
        {
            name
        }
        _ => host,
    }
}

// --- servlets ---

struct ResourceServlet {
    base: PathBuf,
    welcome_files: Vec<String>,
    precompressed: bool,
}

/// Static files from the context's resource root.
///
/// Init parameters: `resourceBase` (relative to the resource root unless
/// absolute), `welcomeFiles` (comma separated, default `index.html`),
/// `precompressed` (`true` serves `.gz`/`.br` siblings when accepted).
pub fn resource_servlet(config: &ComponentConfig<'_>) -> Result<Arc<dyn Servlet>> {
    Ok(Arc::new(ResourceServlet::from_config(config)))
}

impl ResourceServlet {
    fn from_config(config: &ComponentConfig<'_>) -> Self {
        let base = match config.init_parameter("resourceBase") {
            Some(base) if Path::new(base).is_absolute() => PathBuf::from(base),
            Some(base) => config.resource_base.join(base),
            None => config.resource_base.to_path_buf(),
        };
        let welcome_files = config
            .init_parameter("welcomeFiles")
            .map(|files| {
                files
                    .split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_else(|| vec![DEFAULT_WELCOME_FILE.to_string()]);
        let precompressed = config
            .init_parameter("precompressed")
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));
        Self {
            base,
            welcome_files,
            precompressed,
        }
    }
}

/// The servlet a context falls back to when no mapping matches.
pub(crate) fn implicit_resource_servlet(resource_base: &Path) -> Arc<dyn Servlet> {
    Arc::new(ResourceServlet {
        base: resource_base.to_path_buf(),
        welcome_files: vec![DEFAULT_WELCOME_FILE.to_string()],
        precompressed: false,
    })
}

#[async_trait]
impl Servlet for ResourceServlet {
    async fn service(&self, mut req: Request<Body>) -> Response {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            return (
                StatusCode::METHOD_NOT_ALLOWED,
                [(header::ALLOW, "GET, HEAD")],
            )
                .into_response();
        }

        let path = req.uri().path().to_string();
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return StatusCode::NOT_FOUND.into_response();
        }

        let candidate = self.base.join(relative);
        let is_dir = tokio::fs::metadata(&candidate)
            .await
            .is_ok_and(|meta| meta.is_dir());
        if is_dir {
            if !path.ends_with('/') {
                return redirect_to_directory(&req, &path);
            }
            for welcome in &self.welcome_files {
                let file = candidate.join(welcome);
                if tokio::fs::metadata(&file).await.is_ok_and(|meta| meta.is_file()) {
                    if !set_path(&mut req, &format!("{}{}", path, welcome)) {
                        return StatusCode::BAD_REQUEST.into_response();
                    }
                    break;
                }
            }
        }

        let mut serve = ServeDir::new(&self.base).append_index_html_on_directories(false);
        if self.precompressed {
            serve = serve.precompressed_gzip().precompressed_br();
        }
        match serve.oneshot(req).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        }
    }
}

fn redirect_to_directory(req: &Request<Body>, path: &str) -> Response {
    let prefix = req
        .extensions()
        .get::<DispatchInfo>()
        .map(|info| info.context_path.trim_end_matches('/').to_string())
        .unwrap_or_default();
    let location = match req.uri().query() {
        Some(query) => format!("{}{}/?{}", prefix, path, query),
        None => format!("{}{}/", prefix, path),
    };
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

struct TextServlet {
    content: String,
    content_type: HeaderValue,
    status: StatusCode,
}

/// A fixed response. Init parameters: `content`, `contentType` (default
/// `text/plain; charset=utf-8`), `status` (default 200).
pub fn text_servlet(config: &ComponentConfig<'_>) -> Result<Arc<dyn Servlet>> {
    let content_type = config
        .init_parameter("contentType")
        .unwrap_or("text/plain; charset=utf-8");
    let content_type = HeaderValue::try_from(content_type)
        .map_err(|e| RunnerError::invalid(format!("contentType: {}", e)))?;
    let status = match config.init_parameter("status") {
        Some(code) => code
            .parse::<u16>()
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .ok_or_else(|| {
                RunnerError::invalid(format!("status '{}' is not a status code", code))
            })?,
        None => StatusCode::OK,
    };
    Ok(Arc::new(TextServlet {
        content: config.init_parameter("content").unwrap_or_default().to_string(),
        content_type,
        status,
    }))
}

#[async_trait]
impl Servlet for TextServlet {
    async fn service(&self, _req: Request<Body>) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, self.content_type.clone())],
            self.content.clone(),
        )
            .into_response()
    }
}
