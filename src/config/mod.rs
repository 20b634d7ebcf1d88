//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: UPSTREAM_PROXY, PROXY_EXCEPTIONS, ...)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → RoutingPolicy built once, shared via Arc
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; there is no reload path
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, LoadedConfig};
pub use schema::{
    AuthConfig, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig, RoutingConfig,
    TimeoutConfig,
};
pub use validation::ValidationError;
