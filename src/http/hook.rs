//! Outbound-connection extension point.
//!
//! The server calls [`ConnectionHook::before_upstream_connection`] once per
//! outbound connection attempt, before any socket is opened. `None` means
//! "connect to the requested origin as usual"; `Some(target)` redirects the
//! connection to `target` instead.
//!
//! [`RoutingHook`] adapts a [`RoutingPolicy`] to this interface. It only
//! translates; every decision is made by the policy.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;

use crate::http::request::target_host;
use crate::routing::{RoutingDecision, RoutingPolicy};

/// Alternate connection target returned by a hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Per-connection callback invoked before the outbound socket is opened.
pub trait ConnectionHook: Send + Sync {
    fn before_upstream_connection(&self, request: &Request<Body>) -> Option<ConnectTarget>;
}

/// Routes through the upstream proxy unless an exception matches.
#[derive(Debug, Clone)]
pub struct RoutingHook {
    policy: Arc<RoutingPolicy>,
}

impl RoutingHook {
    pub fn new(policy: Arc<RoutingPolicy>) -> Self {
        Self { policy }
    }
}

impl ConnectionHook for RoutingHook {
    fn before_upstream_connection(&self, request: &Request<Body>) -> Option<ConnectTarget> {
        let host = target_host(request).unwrap_or_default();
        match self.policy.decide(&host) {
            RoutingDecision::Direct => None,
            RoutingDecision::ViaUpstream { host, port } => Some(ConnectTarget { host, port }),
        }
    }
}
