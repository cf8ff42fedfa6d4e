//! Per-connection request metadata and request customizers.
//!
//! # Responsibilities
//! - Stamp every request with the listener it arrived on (`ConnectionMeta`)
//! - Apply the secure-request customizer on TLS listeners (secure flag,
//!   Strict-Transport-Security header)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::{self, Next},
    response::Response,
    Router,
};

use crate::net::listener::Port;

/// Marks requests secure and optionally adds the STS response header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecureRequestCustomizer {
    /// `None` disables the Strict-Transport-Security header.
    pub sts_max_age: Option<Duration>,
    pub sts_include_subdomains: bool,
}

impl SecureRequestCustomizer {
    /// Header value for Strict-Transport-Security, if enabled.
    pub fn sts_header_value(&self) -> Option<HeaderValue> {
        let max_age = self.sts_max_age?;
        let value = if self.sts_include_subdomains {
            format!("max-age={}; includeSubDomains", max_age.as_secs())
        } else {
            format!("max-age={}", max_age.as_secs())
        };
        HeaderValue::from_str(&value).ok()
    }
}

/// Build a secure-request customizer. A negative max-age disables STS.
pub fn new_secure_request_customizer(
    sts_max_age_secs: i64,
    sts_include_subdomains: bool,
) -> SecureRequestCustomizer {
    let sts_max_age = u64::try_from(sts_max_age_secs).ok().map(Duration::from_secs);
    SecureRequestCustomizer {
        sts_max_age,
        sts_include_subdomains,
    }
}

/// Request extension describing the connection a request arrived on.
#[derive(Debug, Clone)]
pub struct ConnectionMeta {
    /// `http` or `https`.
    pub scheme: &'static str,
    /// True when the request arrived over TLS.
    pub secure: bool,
    pub local_addr: SocketAddr,
    /// Scheme used for confidential redirects.
    pub secure_scheme: String,
    /// Port used for confidential redirects.
    pub secure_port: Port,
}

struct Stamp {
    meta: ConnectionMeta,
    sts: Option<HeaderValue>,
}

/// Wrap `app` so requests carry `meta` and responses get the STS header.
pub(crate) fn apply_customizers(
    app: Router,
    meta: ConnectionMeta,
    secure: Option<&SecureRequestCustomizer>,
) -> Router {
    let sts = if meta.secure {
        secure.and_then(SecureRequestCustomizer::sts_header_value)
    } else {
        None
    };
    let stamp = Arc::new(Stamp { meta, sts });
    app.layer(middleware::from_fn_with_state(stamp, stamp_request))
}

async fn stamp_request(State(stamp): State<Arc<Stamp>>, mut req: Request, next: Next) -> Response {
    req.extensions_mut().insert(stamp.meta.clone());
    let mut response = next.run(req).await;
    if let Some(value) = &stamp.sts {
        response
            .headers_mut()
            .insert(header::STRICT_TRANSPORT_SECURITY, value.clone());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn meta(secure: bool) -> ConnectionMeta {
        ConnectionMeta {
            scheme: if secure { "https" } else { "http" },
            secure,
            local_addr: "127.0.0.1:8443".parse().unwrap(),
            secure_scheme: "https".into(),
            secure_port: Port::new(8443),
        }
    }

    #[test]
    fn negative_max_age_disables_sts() {
        let customizer = new_secure_request_customizer(-1, true);
        assert!(customizer.sts_max_age.is_none());
        assert!(customizer.sts_header_value().is_none());
    }

    #[test]
    fn sts_value_includes_subdomains() {
        let customizer = new_secure_request_customizer(3600, true);
        assert_eq!(
            customizer.sts_header_value().unwrap(),
            "max-age=3600; includeSubDomains"
        );
    }

    #[tokio::test]
    async fn secure_listener_adds_sts_and_meta() {
        let app = Router::new().fallback(|req: Request| async move {
            let secure = req.extensions().get::<ConnectionMeta>().map(|m| m.secure);
            if secure == Some(true) {
                StatusCode::OK
            } else {
                StatusCode::BAD_REQUEST
            }
        });
        let customizer = new_secure_request_customizer(60, false);
        let app = apply_customizers(app, meta(true), Some(&customizer));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::STRICT_TRANSPORT_SECURITY).unwrap(),
            "max-age=60"
        );
    }

    #[tokio::test]
    async fn plain_listener_never_sends_sts() {
        let app = Router::new().fallback(|| async { StatusCode::OK });
        let customizer = new_secure_request_customizer(60, false);
        let app = apply_customizers(app, meta(false), Some(&customizer));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().get(header::STRICT_TRANSPORT_SECURITY).is_none());
    }
}
