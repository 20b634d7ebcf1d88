//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     PROXY_EXCEPTIONS / [routing].exceptions
//!     → exceptions.rs (split, trim, lower-case, dedupe)
//!     UPSTREAM_PROXY / [routing].upstream_proxy
//!     → upstream.rs (URL parse, fail fast on malformed input)
//!     → policy.rs (freeze as immutable RoutingPolicy)
//!
//! Per request:
//!     hostname → RoutingPolicy::decide → Direct | ViaUpstream(host, port)
//! ```
//!
//! # Design Decisions
//! - Policy compiled at startup, immutable at runtime
//! - No regex or wildcards: suffix matching only
//! - Deterministic: same hostname always yields the same decision
//! - Exceptions win over upstream routing

pub mod exceptions;
pub mod policy;
pub mod upstream;

pub use exceptions::ExceptionSet;
pub use policy::{RoutingDecision, RoutingPolicy};
pub use upstream::{ConfigurationError, UpstreamTarget};
