//! Per-request routing decision.
//!
//! # Responsibilities
//! - Combine exception rules and the optional upstream into one decision
//! - Exceptions take absolute precedence over upstream routing
//!
//! # Design Decisions
//! - Pure function of (hostname, fixed configuration); no I/O, no locking
//! - Shared read-only via `Arc` across all connection handlers

use serde::Serialize;

use crate::config::RoutingConfig;
use crate::routing::exceptions::ExceptionSet;
use crate::routing::upstream::{ConfigurationError, UpstreamTarget};

/// Where an outbound connection should go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum RoutingDecision {
    /// Connect straight to the requested origin.
    Direct,
    /// Connect to the upstream proxy instead.
    ViaUpstream { host: String, port: u16 },
}

/// Immutable routing policy built once at startup.
#[derive(Debug, Clone, Default)]
pub struct RoutingPolicy {
    exceptions: ExceptionSet,
    upstream: Option<UpstreamTarget>,
}

impl RoutingPolicy {
    pub fn new(exceptions: ExceptionSet, upstream: Option<UpstreamTarget>) -> Self {
        Self {
            exceptions,
            upstream,
        }
    }

    /// Build from the routing section of the configuration.
    ///
    /// Fails only if an upstream URL is present but malformed.
    pub fn from_config(config: &RoutingConfig) -> Result<Self, ConfigurationError> {
        let exceptions = ExceptionSet::from_entries(&config.exceptions);
        let upstream = UpstreamTarget::parse(config.upstream_proxy.as_deref())?;
        Ok(Self::new(exceptions, upstream))
    }

    /// Decide how to reach `hostname`. Total over its input: an empty
    /// hostname is valid and simply matches no exception.
    pub fn decide(&self, hostname: &str) -> RoutingDecision {
        let hostname = hostname.to_lowercase();

        if self.exceptions.matches(&hostname) {
            tracing::trace!(host = %hostname, "Exception matched, connecting directly");
            return RoutingDecision::Direct;
        }

        match &self.upstream {
            Some(target) => RoutingDecision::ViaUpstream {
                host: target.host().to_string(),
                port: target.port(),
            },
            None => RoutingDecision::Direct,
        }
    }

    pub fn exceptions(&self) -> &ExceptionSet {
        &self.exceptions
    }

    pub fn upstream(&self) -> Option<&UpstreamTarget> {
        self.upstream.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(exceptions: &str, upstream: Option<&str>) -> RoutingPolicy {
        RoutingPolicy::new(
            ExceptionSet::build(exceptions),
            UpstreamTarget::parse(upstream).unwrap(),
        )
    }

    fn via(host: &str, port: u16) -> RoutingDecision {
        RoutingDecision::ViaUpstream {
            host: host.to_string(),
            port,
        }
    }

    #[test]
    fn exceptions_take_precedence_over_upstream() {
        let policy = policy("internal.corp", Some("http://proxy.local:3128"));
        assert_eq!(policy.decide("svc.internal.corp"), RoutingDecision::Direct);
        assert_eq!(policy.decide("example.com"), via("proxy.local", 3128));
    }

    #[test]
    fn no_upstream_is_always_direct() {
        let policy = policy("internal.corp", None);
        for host in ["example.com", "svc.internal.corp", "", "LOCALHOST"] {
            assert_eq!(policy.decide(host), RoutingDecision::Direct);
        }
    }

    #[test]
    fn hostname_is_lowercased_before_matching() {
        let policy = policy("internal.corp", Some("http://proxy.local"));
        assert_eq!(policy.decide("SVC.Internal.CORP"), RoutingDecision::Direct);
        assert_eq!(policy.decide("Example.COM"), via("proxy.local", 80));
    }

    #[test]
    fn empty_hostname_goes_upstream_when_configured() {
        let policy = policy("internal.corp", Some("http://proxy.local:3128"));
        assert_eq!(policy.decide(""), via("proxy.local", 3128));
    }

    #[test]
    fn decide_is_idempotent() {
        let policy = policy("a.com", Some("http://proxy.local:3128"));
        for host in ["x.a.com", "b.com", ""] {
            let first = policy.decide(host);
            for _ in 0..10 {
                assert_eq!(policy.decide(host), first);
            }
        }
    }

    #[test]
    fn from_config_rejects_malformed_upstream() {
        let config = RoutingConfig {
            upstream_proxy: Some("not-a-url".into()),
            exceptions: vec!["a.com".into()],
        };
        assert_eq!(
            RoutingPolicy::from_config(&config).unwrap_err(),
            ConfigurationError::MissingScheme
        );
    }

    #[test]
    fn from_config_builds_policy() {
        let config = RoutingConfig {
            upstream_proxy: Some("http://proxy.local:8080".into()),
            exceptions: vec!["a.com, b.com".into(), "C.com".into()],
        };
        let policy = RoutingPolicy::from_config(&config).unwrap();
        assert_eq!(policy.exceptions().len(), 3);
        assert_eq!(policy.decide("x.c.com"), RoutingDecision::Direct);
        assert_eq!(policy.decide("d.com"), via("proxy.local", 8080));
    }

    #[test]
    fn decision_serializes_with_route_tag() {
        let json = serde_json::to_value(via("proxy.local", 3128)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"route": "via_upstream", "host": "proxy.local", "port": 3128})
        );
        let json = serde_json::to_value(RoutingDecision::Direct).unwrap();
        assert_eq!(json, serde_json::json!({"route": "direct"}));
    }
}
