//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper http1 with upgrades, proxy auth)
//!     → hook.rs (ConnectionHook → RoutingPolicy decides Direct | ViaUpstream)
//!     → CONNECT: tunnel.rs (dial origin, or CONNECT through upstream, then splice)
//!     → otherwise: forward.rs (absolute-form request to origin or upstream)
//!     → response.rs (strip hop-by-hop headers)
//!     → Send to client
//! ```

pub mod error;
pub mod forward;
pub mod hook;
pub mod request;
pub mod response;
pub mod server;
pub mod tunnel;

pub use error::ProxyError;
pub use hook::{ConnectTarget, ConnectionHook, RoutingHook};
pub use server::{ProxyServer, ProxyState};
