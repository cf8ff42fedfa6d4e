//! The servlet seam: the component that produces a response.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

/// Terminal request handler of a context.
///
/// Implementations find the context, dispatch and session through the
/// request extensions (`ContextInfo`, `DispatchInfo`, `SessionAccess`).
#[async_trait]
pub trait Servlet: Send + Sync {
    async fn service(&self, req: Request<Body>) -> Response;
}
