//! Dynamic forward proxy library.
//!
//! Routes each outbound connection either directly to the origin or through
//! a configured upstream proxy, based on a hostname suffix exception list.

pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
pub use routing::{RoutingDecision, RoutingPolicy};
