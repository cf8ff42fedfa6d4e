//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → StartConfig (validated, immutable)
//!     → lifecycle::startup translates it into RunConfig + ContextConfig
//!
//! Per-app descriptors (context.toml):
//!     deploy scanner finds app
//!     → loader.rs loads descriptor
//!     → layered after the defaults descriptor (ContextDescriptor::apply)
//!     → ContextConfig handed to the context assembler
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; it is consumed once at startup
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::ContextConfig;
pub use schema::ContextDescriptor;
pub use schema::DeploySettings;
pub use schema::FilterConfig;
pub use schema::HandlerSlot;
pub use schema::InitParameters;
pub use schema::RuntimeMode;
pub use schema::ServerSettings;
pub use schema::ServletConfig;
pub use schema::StartConfig;
