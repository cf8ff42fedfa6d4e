//! Catch-all handler for requests no context accepted.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::handler::collection::ContextCollection;

/// Answers 404. In development it lists the known contexts on `GET /`.
#[derive(Clone, Debug)]
pub struct DefaultHandler {
    contexts: Option<ContextCollection>,
    show_contexts: bool,
}

impl DefaultHandler {
    pub fn new(contexts: Option<ContextCollection>, show_contexts: bool) -> Self {
        Self {
            contexts,
            show_contexts,
        }
    }

    pub fn shows_contexts(&self) -> bool {
        self.show_contexts
    }

    pub async fn handle(&self, req: Request<Body>) -> Response {
        let listing = match &self.contexts {
            Some(contexts)
                if self.show_contexts
                    && req.method() == Method::GET
                    && req.uri().path() == "/" =>
            {
                contexts
            }
            _ => return StatusCode::NOT_FOUND.into_response(),
        };

        let mut body = String::from(
            "<html><head><title>Error 404 - Not Found</title></head><body>\n\
             <h2>Error 404 - Not Found.</h2>\n\
             <p>No context on this server matched or handled this request.</p>\n\
             <p>Contexts known to this server are:</p>\n<ul>\n",
        );
        for context in listing.contexts() {
            let path = context.context_path();
            body.push_str(&format!(
                "<li><a href=\"{}\">{}</a> &rarr; {}</li>\n",
                path,
                path,
                context.resource_base().display()
            ));
        }
        body.push_str("</ul>\n</body></html>\n");

        (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            body,
        )
            .into_response()
    }
}
