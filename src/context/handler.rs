//! The assembled request-handling context and its request dispatch.
//!
//! # Responsibilities
//! - Own the filters, servlets, parameters and sessions of one context
//! - Resolve the path inside the context and pick the servlet
//! - Run the matching filters in declared order, then the servlet
//! - Re-dispatch failed requests to the error page
//!
//! # Data Flow
//! ```text
//! Request (full path)
//!     → strip context path, attach ContextInfo + SessionAccess
//!     → select servlet (exact > prefix > regex > suffix > default > resources)
//!     → FilterChain (filters mapped for REQUEST) → servlet
//!     → status >= 400 and error page set: ERROR dispatch, original status kept
//!     → Set-Cookie for new sessions
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::config::{InitParameters, RuntimeMode};
use crate::context::filter::{Filter, FilterChain};
use crate::context::path_spec::PathSpec;
use crate::context::servlet::Servlet;
use crate::context::session::{
    session_id_from_cookie, SessionAccess, SessionManager, SESSION_COOKIE,
};

/// Which kind of dispatch is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatcherType {
    Request,
    Error,
}

/// Request extension describing the current dispatch.
#[derive(Debug, Clone)]
pub struct DispatchInfo {
    pub dispatcher: DispatcherType,
    pub context_path: String,
    pub servlet_path: String,
    pub path_info: Option<String>,
    /// Path and query as the client sent them.
    pub request_uri: String,
    /// Status that triggered an ERROR dispatch.
    pub error_status: Option<StatusCode>,
}

impl DispatchInfo {
    /// Servlet path followed by path info.
    pub fn path_in_context(&self) -> String {
        match &self.path_info {
            Some(info) => format!("{}{}", self.servlet_path, info),
            None => self.servlet_path.clone(),
        }
    }
}

/// Request extension giving components access to their context.
#[derive(Clone)]
pub struct ContextInfo {
    pub context: Arc<WebContext>,
}

/// A filter instance and its optional url mapping.
pub struct FilterHolder {
    pub(crate) name: String,
    pub(crate) identifier: String,
    pub(crate) filter: Arc<dyn Filter>,
    pub(crate) init_parameters: InitParameters,
    pub(crate) mapping: Option<PathSpec>,
    pub(crate) dispatch: Vec<DispatcherType>,
}

impl FilterHolder {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn init_parameters(&self) -> &InitParameters {
        &self.init_parameters
    }

    pub fn mapping(&self) -> Option<&PathSpec> {
        self.mapping.as_ref()
    }

    pub fn dispatch_types(&self) -> &[DispatcherType] {
        &self.dispatch
    }

    fn applies(&self, path: &str, dispatcher: DispatcherType) -> bool {
        self.dispatch.contains(&dispatcher)
            && self.mapping.as_ref().is_some_and(|spec| spec.matches(path))
    }
}

/// A servlet instance and its optional url mapping.
pub struct ServletHolder {
    pub(crate) name: String,
    pub(crate) identifier: String,
    pub(crate) servlet: Arc<dyn Servlet>,
    pub(crate) init_parameters: InitParameters,
    pub(crate) mapping: Option<PathSpec>,
}

impl ServletHolder {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn init_parameters(&self) -> &InitParameters {
        &self.init_parameters
    }

    pub fn mapping(&self) -> Option<&PathSpec> {
        self.mapping.as_ref()
    }
}

/// An assembled, immutable request-handling context.
pub struct WebContext {
    pub(crate) context_path: String,
    pub(crate) resource_base: PathBuf,
    pub(crate) filters: Vec<FilterHolder>,
    pub(crate) servlets: Vec<ServletHolder>,
    pub(crate) resource_servlet: Arc<dyn Servlet>,
    pub(crate) init_parameters: InitParameters,
    pub(crate) attributes: BTreeMap<String, String>,
    pub(crate) error_page: Option<String>,
    pub(crate) runtime_mode: RuntimeMode,
    pub(crate) sessions: Arc<SessionManager>,
}

impl fmt::Debug for WebContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebContext")
            .field("context_path", &self.context_path)
            .field("resource_base", &self.resource_base)
            .field("filters", &self.filters.iter().map(|h| &h.name).collect::<Vec<_>>())
            .field("servlets", &self.servlets.iter().map(|h| &h.name).collect::<Vec<_>>())
            .field("runtime_mode", &self.runtime_mode)
            .finish()
    }
}

impl WebContext {
    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    pub fn resource_base(&self) -> &Path {
        &self.resource_base
    }

    pub fn filters(&self) -> &[FilterHolder] {
        &self.filters
    }

    pub fn servlets(&self) -> &[ServletHolder] {
        &self.servlets
    }

    pub fn init_parameters(&self) -> &InitParameters {
        &self.init_parameters
    }

    pub fn init_parameter(&self, key: &str) -> Option<&str> {
        self.init_parameters.get(key).map(String::as_str)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn error_page(&self) -> Option<&str> {
        self.error_page.as_deref()
    }

    pub fn runtime_mode(&self) -> RuntimeMode {
        self.runtime_mode
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Number of url mappings (filters and servlets).
    pub fn mapping_count(&self) -> usize {
        self.filters.iter().filter(|h| h.mapping.is_some()).count()
            + self.servlets.iter().filter(|h| h.mapping.is_some()).count()
    }

    /// Whether a request for `path` belongs to this context.
    pub fn accepts(&self, path: &str) -> bool {
        self.path_in_context(path).is_some()
    }

    /// The path inside the context. Empty when `path` equals a non-root
    /// context path exactly.
    pub fn path_in_context<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.context_path == "/" {
            return Some(path);
        }
        let rest = path.strip_prefix(self.context_path.as_str())?;
        (rest.is_empty() || rest.starts_with('/')).then_some(rest)
    }

    /// Handle a request addressed with its full path.
    pub async fn handle(self: &Arc<Self>, mut req: Request<Body>) -> Response {
        let started = Instant::now();
        let request_uri = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());
        let full_path = req.uri().path().to_string();

        let target = match self.path_in_context(&full_path) {
            Some("") => {
                let location = match req.uri().query() {
                    Some(query) => format!("{}/?{}", self.context_path, query),
                    None => format!("{}/", self.context_path),
                };
                return (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
            }
            Some(target) => target.to_string(),
            None => return StatusCode::NOT_FOUND.into_response(),
        };
        if !set_path(&mut req, &target) {
            return StatusCode::BAD_REQUEST.into_response();
        }

        let requested = req
            .headers()
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(session_id_from_cookie)
            .map(str::to_string);
        let session = SessionAccess::new(self.sessions.clone(), requested.as_deref());
        req.extensions_mut().insert(session.clone());
        req.extensions_mut().insert(ContextInfo {
            context: Arc::clone(self),
        });

        let retained = self
            .error_page
            .as_ref()
            .map(|_| (req.headers().clone(), req.extensions().clone()));

        let mut response = self
            .dispatch(req, &target, DispatcherType::Request, &request_uri, None)
            .await;

        let status = response.status();
        if let (Some(page), Some((headers, extensions))) = (&self.error_page, retained) {
            if status.is_client_error() || status.is_server_error() {
                response = self
                    .dispatch_error(page, status, headers, extensions, &request_uri)
                    .await
                    .unwrap_or(response);
            }
        }

        if session.is_new() {
            if let Some(cookie) = session
                .id()
                .and_then(|id| session_cookie(&id, &self.context_path))
            {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
        }

        crate::observability::metrics::record_request(
            &self.context_path,
            response.status().as_u16(),
            started,
        );
        response
    }

    async fn dispatch(
        &self,
        mut req: Request<Body>,
        target: &str,
        dispatcher: DispatcherType,
        request_uri: &str,
        error_status: Option<StatusCode>,
    ) -> Response {
        let (servlet, servlet_path, path_info) = match self.select_servlet(target) {
            Some((holder, spec)) => {
                let (servlet_path, path_info) = spec.split(target);
                (
                    holder.servlet.clone(),
                    servlet_path.to_string(),
                    path_info.map(str::to_string),
                )
            }
            None => (self.resource_servlet.clone(), target.to_string(), None),
        };

        let filters: Vec<Arc<dyn Filter>> = self
            .filters
            .iter()
            .filter(|holder| holder.applies(target, dispatcher))
            .map(|holder| holder.filter.clone())
            .collect();

        req.extensions_mut().insert(DispatchInfo {
            dispatcher,
            context_path: self.context_path.clone(),
            servlet_path,
            path_info,
            request_uri: request_uri.to_string(),
            error_status,
        });

        FilterChain::new(&filters, servlet.as_ref()).proceed(req).await
    }

    async fn dispatch_error(
        &self,
        page: &str,
        status: StatusCode,
        headers: HeaderMap,
        extensions: axum::http::Extensions,
        request_uri: &str,
    ) -> Option<Response> {
        let uri: Uri = page.parse().ok()?;
        let mut req = Request::new(Body::empty());
        *req.method_mut() = Method::GET;
        *req.uri_mut() = uri;
        *req.headers_mut() = headers;
        *req.extensions_mut() = extensions;

        tracing::debug!(
            context_path = %self.context_path,
            status = status.as_u16(),
            error_page = page,
            "Error dispatch"
        );

        let mut response = self
            .dispatch(req, page, DispatcherType::Error, request_uri, Some(status))
            .await;
        *response.status_mut() = status;
        Some(response)
    }

    fn select_servlet(&self, target: &str) -> Option<(&ServletHolder, &PathSpec)> {
        self.servlets
            .iter()
            .filter_map(|holder| {
                holder
                    .mapping
                    .as_ref()
                    .filter(|spec| spec.matches(target))
                    .map(|spec| (holder, spec))
            })
            .min_by_key(|(_, spec)| spec.precedence())
    }
}

/// Replace the path of a request, keeping its query.
pub(crate) fn set_path(req: &mut Request<Body>, path: &str) -> bool {
    let path_and_query = match req.uri().query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    match path_and_query.parse::<Uri>() {
        Ok(uri) => {
            *req.uri_mut() = uri;
            true
        }
        Err(_) => false,
    }
}

fn session_cookie(id: &str, context_path: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; Path={}; HttpOnly",
        SESSION_COOKIE, id, context_path
    ))
    .ok()
}
