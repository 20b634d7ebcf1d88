//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields
//!     → one span per proxied request, carrying a UUID request_id
//!
//! logging.rs installs the subscriber (pretty or JSON, EnvFilter)
//! ```

pub mod logging;
