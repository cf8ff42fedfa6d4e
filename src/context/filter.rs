//! The filter seam and the chain that threads requests through filters.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use crate::context::servlet::Servlet;

/// Intercepts a request before the servlet.
///
/// A filter either answers the request itself or calls
/// [`FilterChain::proceed`] to pass it on.
#[async_trait]
pub trait Filter: Send + Sync {
    async fn do_filter(&self, req: Request<Body>, chain: FilterChain<'_>) -> Response;
}

/// The remaining filters plus the target servlet.
pub struct FilterChain<'a> {
    filters: &'a [Arc<dyn Filter>],
    servlet: &'a dyn Servlet,
}

impl<'a> FilterChain<'a> {
    pub fn new(filters: &'a [Arc<dyn Filter>], servlet: &'a dyn Servlet) -> Self {
        Self { filters, servlet }
    }

    /// Filters left before the servlet runs.
    pub fn remaining(&self) -> usize {
        self.filters.len()
    }

    /// Pass the request to the next filter, or the servlet when none remain.
    pub async fn proceed(self, req: Request<Body>) -> Response {
        match self.filters.split_first() {
            Some((next, rest)) => {
                next.do_filter(req, FilterChain::new(rest, self.servlet))
                    .await
            }
            None => self.servlet.service(req).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum::response::IntoResponse;

    struct Tag(&'static str);

    #[async_trait]
    impl Filter for Tag {
        async fn do_filter(&self, mut req: Request<Body>, chain: FilterChain<'_>) -> Response {
            let trail = req
                .headers()
                .get("x-trail")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            let trail = format!("{}{}", trail, self.0);
            req.headers_mut()
                .insert("x-trail", HeaderValue::from_str(&trail).unwrap());
            chain.proceed(req).await
        }
    }

    struct Stop;

    #[async_trait]
    impl Filter for Stop {
        async fn do_filter(&self, _req: Request<Body>, _chain: FilterChain<'_>) -> Response {
            "stopped".into_response()
        }
    }

    struct Echo;

    #[async_trait]
    impl Servlet for Echo {
        async fn service(&self, req: Request<Body>) -> Response {
            let trail = req
                .headers()
                .get("x-trail")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            trail.into_response()
        }
    }

    async fn body_of(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn filters_run_in_order_then_servlet() {
        let filters: Vec<Arc<dyn Filter>> = vec![Arc::new(Tag("a")), Arc::new(Tag("b"))];
        let chain = FilterChain::new(&filters, &Echo);
        assert_eq!(chain.remaining(), 2);

        let response = chain.proceed(Request::new(Body::empty())).await;
        assert_eq!(body_of(response).await, "ab");
    }

    #[tokio::test]
    async fn filter_can_short_circuit() {
        let filters: Vec<Arc<dyn Filter>> = vec![Arc::new(Stop), Arc::new(Tag("never"))];
        let response = FilterChain::new(&filters, &Echo)
            .proceed(Request::new(Body::empty()))
            .await;
        assert_eq!(body_of(response).await, "stopped");
    }
}
