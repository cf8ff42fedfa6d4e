//! Context and handler collections.
//!
//! # Responsibilities
//! - Hold the live set of contexts, keyed by context path
//! - Route a request to the context with the longest matching path
//! - Run top-level handlers in the configured order
//!
//! # Design Decisions
//! - Reads take a lock-free snapshot; deploys and undeploys swap in a new
//!   vector
//! - A handler that does not accept a request hands it back unchanged

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::context::WebContext;
use crate::handler::default_handler::DefaultHandler;

/// The live set of contexts. Clones share the same set.
#[derive(Clone)]
pub struct ContextCollection {
    contexts: Arc<ArcSwap<Vec<Arc<WebContext>>>>,
}

impl Default for ContextCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContextCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.contexts.load();
        f.debug_list()
            .entries(snapshot.iter().map(|c| c.context_path()))
            .finish()
    }
}

impl ContextCollection {
    pub fn new() -> Self {
        Self {
            contexts: Arc::new(ArcSwap::from_pointee(Vec::new())),
        }
    }

    /// Add a context, replacing one registered under the same path.
    /// Returns the replaced context.
    pub fn add(&self, context: Arc<WebContext>) -> Option<Arc<WebContext>> {
        let mut replaced = None;
        self.contexts.rcu(|current| {
            let mut next = Vec::clone(current);
            replaced = None;
            let existing = next
                .iter()
                .position(|c| c.context_path() == context.context_path());
            match existing {
                Some(index) => {
                    replaced = Some(std::mem::replace(&mut next[index], context.clone()));
                }
                None => next.push(context.clone()),
            }
            next
        });

        tracing::info!(
            context_path = %context.context_path(),
            replaced = replaced.is_some(),
            "Context registered"
        );
        crate::observability::metrics::record_contexts(self.len());
        replaced
    }

    /// Remove the context registered under `context_path`.
    pub fn remove(&self, context_path: &str) -> Option<Arc<WebContext>> {
        let mut removed = None;
        self.contexts.rcu(|current| {
            let mut next = Vec::clone(current);
            let existing = next.iter().position(|c| c.context_path() == context_path);
            removed = existing.map(|index| next.remove(index));
            next
        });

        if removed.is_some() {
            tracing::info!(context_path = %context_path, "Context removed");
            crate::observability::metrics::record_contexts(self.len());
        }
        removed
    }

    /// Remove `context` itself. A different context registered under the
    /// same path is left alone.
    pub fn remove_context(&self, context: &Arc<WebContext>) -> bool {
        let mut removed = false;
        self.contexts.rcu(|current| {
            let mut next = Vec::clone(current);
            let before = next.len();
            next.retain(|c| !Arc::ptr_eq(c, context));
            removed = next.len() != before;
            next
        });

        if removed {
            tracing::info!(context_path = %context.context_path(), "Context removed");
            crate::observability::metrics::record_contexts(self.len());
        }
        removed
    }

    pub fn get(&self, context_path: &str) -> Option<Arc<WebContext>> {
        self.contexts
            .load()
            .iter()
            .find(|c| c.context_path() == context_path)
            .cloned()
    }

    /// Snapshot of the registered contexts in registration order.
    pub fn contexts(&self) -> Vec<Arc<WebContext>> {
        self.contexts.load_full().as_ref().clone()
    }

    /// The context with the longest path accepting `request_path`.
    pub fn find(&self, request_path: &str) -> Option<Arc<WebContext>> {
        self.contexts
            .load()
            .iter()
            .filter(|c| c.accepts(request_path))
            .max_by_key(|c| c.context_path().len())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.contexts.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.load().is_empty()
    }

    /// Whether both handles share the same underlying set.
    pub fn same_as(&self, other: &ContextCollection) -> bool {
        Arc::ptr_eq(&self.contexts, &other.contexts)
    }
}

/// One top-level handler.
#[derive(Clone, Debug)]
pub enum Handler {
    /// A single context attached directly.
    Context(Arc<WebContext>),
    /// Every registered context.
    Contexts(ContextCollection),
    /// Catch-all.
    Default(DefaultHandler),
}

impl Handler {
    pub fn kind(&self) -> &'static str {
        match self {
            Handler::Context(_) => "root-context",
            Handler::Contexts(_) => "contexts",
            Handler::Default(_) => "default",
        }
    }

    /// Handle the request, or give it back when not accepted.
    pub async fn handle(&self, req: Request<Body>) -> Result<Response, Request<Body>> {
        match self {
            Handler::Context(context) => {
                if context.accepts(req.uri().path()) {
                    Ok(context.handle(req).await)
                } else {
                    Err(req)
                }
            }
            Handler::Contexts(contexts) => match contexts.find(req.uri().path()) {
                Some(context) => Ok(context.handle(req).await),
                None => Err(req),
            },
            Handler::Default(default) => Ok(default.handle(req).await),
        }
    }
}

/// Ordered list of top-level handlers; the first that accepts wins.
#[derive(Clone, Debug, Default)]
pub struct HandlerCollection {
    handlers: Vec<Handler>,
}

impl HandlerCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, handler: Handler) -> &mut Self {
        self.handlers.push(handler);
        self
    }

    /// Replace the handler list.
    pub fn set_handlers(&mut self, handlers: Vec<Handler>) {
        self.handlers = handlers;
    }

    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// First context collection among the handlers.
    pub fn context_collection(&self) -> Option<&ContextCollection> {
        self.handlers.iter().find_map(|handler| match handler {
            Handler::Contexts(contexts) => Some(contexts),
            _ => None,
        })
    }

    pub async fn handle(&self, mut req: Request<Body>) -> Response {
        for handler in &self.handlers {
            match handler.handle(req).await {
                Ok(response) => return response,
                Err(unhandled) => req = unhandled,
            }
        }
        StatusCode::NOT_FOUND.into_response()
    }
}
