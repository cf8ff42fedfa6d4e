//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! StartConfig ports + ServerSettings
//!     → listener.rs (validated ListenerConfig, Listener descriptions)
//!     → tls.rs (optional certificate store → TlsContext)
//!     → Server::start binds each Listener
//!     → connection.rs (ConnectionMeta + secure-request customizer per request)
//!     → handler collection
//! ```
//!
//! # Design Decisions
//! - Listener descriptions are plain values; nothing binds until start
//! - TLS is optional and degrades to plain HTTP when the store is unusable
//! - Every request knows which listener it came through

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{new_secure_request_customizer, ConnectionMeta, SecureRequestCustomizer};
pub use listener::{
    new_http_listener_config, new_listener, new_tls_listener, BoundListener, Listener,
    ListenerConfig, Port, HTTPS, MIN_OUTPUT_BUFFER_SIZE,
};
pub use tls::{new_tls_context, CertSource, TlsContext};
