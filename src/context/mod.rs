//! Web contexts: assembly and request dispatch.
//!
//! # Data Flow
//! ```text
//! ContextConfig
//!     → assembler.rs (validate, instantiate components via registry.rs)
//!     → WebContext (handler.rs), registered with its parent collection
//!
//! Request
//!     → WebContext::handle
//!     → path_spec.rs picks servlet and filters
//!     → filter.rs chain → servlet.rs
//!     → session.rs tracks the caller across requests
//! ```
//!
//! # Design Decisions
//! - Components are looked up by identifier, never by reflection
//! - A context is immutable once assembled; redeploying replaces it

pub mod assembler;
pub mod builtin;
pub mod filter;
pub mod handler;
pub mod path_spec;
pub mod registry;
pub mod servlet;
pub mod session;

pub use assembler::assemble_context;
pub use filter::{Filter, FilterChain};
pub use handler::{ContextInfo, DispatchInfo, DispatcherType, WebContext};
pub use path_spec::PathSpec;
pub use registry::{ComponentConfig, ComponentRegistry};
pub use servlet::Servlet;
pub use session::{SessionAccess, SessionManager, SESSION_COOKIE};
