//! Top-level handler tree.
//!
//! # Data Flow
//! ```text
//! axum fallback
//!     → HandlerCollection (handlers in configured order)
//!         → Handler::Context   (root context attached directly)
//!         → Handler::Contexts  (ContextCollection, longest path match)
//!         → Handler::Default   (404, optional context listing)
//! ```

pub mod collection;
pub mod default_handler;

pub use collection::{ContextCollection, Handler, HandlerCollection};
pub use default_handler::DefaultHandler;
