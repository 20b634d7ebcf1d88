//! Per-connection forwarding errors.
//!
//! These never reach the routing policy. Each one becomes a 502, or a 504
//! when a deadline expired, for the client and a log line for the operator.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream proxy {target} refused CONNECT with status {status}")]
    UpstreamRejected { target: String, status: StatusCode },

    #[error("HTTP error: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("request failed: {0}")]
    Client(#[from] hyper_util::client::legacy::Error),

    #[error("invalid request: {0}")]
    Request(#[from] axum::http::Error),
}

impl ProxyError {
    pub fn connect(target: impl std::fmt::Display, source: std::io::Error) -> Self {
        Self::Connect {
            target: target.to_string(),
            source,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Connect { source, .. } if caused_by_timeout(source) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            ProxyError::Client(e) if caused_by_timeout(e) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Hyper(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

/// True if any error in the `source()` chain is an I/O timeout.
///
/// The pooled client reports its connect timeout as an `io::Error` buried
/// under its own error types.
fn caused_by_timeout(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(io) = err.downcast_ref::<io::Error>() {
            if io.kind() == io::ErrorKind::TimedOut {
                return true;
            }
        }
        current = err.source();
    }
    false
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
