//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (lifecycle tracking for graceful shutdown)
//!     → Hand off to HTTP layer
//!
//! Outbound connection (origin or upstream proxy)
//!     → dial.rs (connect with timeout)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection and tunnel tracked for graceful shutdown
//! - Every outbound connect has a deadline

pub mod connection;
pub mod dial;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use dial::dial;
pub use listener::{ConnectionPermit, Listener, ListenerError};
