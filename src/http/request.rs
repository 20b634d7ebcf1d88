//! Extraction of routing-relevant information from proxy requests.
//!
//! # Responsibilities
//! - Find the target host (URI authority first, then `Host` header)
//! - Find the target port, defaulting by method and scheme
//!
//! # Design Decisions
//! - Ports and IPv6 brackets are stripped from the host
//! - A missing host is `None`; the hook treats it as the empty string

use std::str::FromStr;

use axum::http::uri::Authority;
use axum::http::{header, Method, Request};

/// The host the client wants to reach, without port or IPv6 brackets.
pub fn target_host<B>(request: &Request<B>) -> Option<String> {
    if let Some(host) = request.uri().host() {
        return Some(unbracket(host).to_string());
    }
    let authority = host_header(request)?;
    Some(unbracket(authority.host()).to_string())
}

/// The port the client wants to reach.
///
/// CONNECT defaults to 443 and `https` URIs to 443; everything else to 80.
pub fn target_port<B>(request: &Request<B>) -> u16 {
    if let Some(port) = request.uri().port_u16() {
        return port;
    }
    if request.uri().authority().is_none() {
        if let Some(port) = host_header(request).and_then(|a| a.port_u16()) {
            return port;
        }
    }
    if request.method() == Method::CONNECT || request.uri().scheme_str() == Some("https") {
        443
    } else {
        80
    }
}

fn host_header<B>(request: &Request<B>) -> Option<Authority> {
    let value = request.headers().get(header::HOST)?.to_str().ok()?;
    Authority::from_str(value.trim()).ok()
}

fn unbracket(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(method: Method, uri: &str, host: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(host) = host {
            builder = builder.header("Host", host);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn host_from_absolute_uri() {
        let req = request(Method::GET, "http://Example.com:8080/path", Some("other.com"));
        assert_eq!(target_host(&req).as_deref(), Some("Example.com"));
        assert_eq!(target_port(&req), 8080);
    }

    #[test]
    fn host_from_connect_authority() {
        let req = request(Method::CONNECT, "api.example.com:443", None);
        assert_eq!(target_host(&req).as_deref(), Some("api.example.com"));
        assert_eq!(target_port(&req), 443);
    }

    #[test]
    fn host_header_fallback_strips_port() {
        let req = request(Method::GET, "/index.html", Some("svc.internal.corp:8443"));
        assert_eq!(target_host(&req).as_deref(), Some("svc.internal.corp"));
        assert_eq!(target_port(&req), 8443);
    }

    #[test]
    fn ipv6_brackets_are_stripped() {
        let req = request(Method::CONNECT, "[::1]:8443", None);
        assert_eq!(target_host(&req).as_deref(), Some("::1"));
        assert_eq!(target_port(&req), 8443);

        let req = request(Method::GET, "/", Some("[::1]"));
        assert_eq!(target_host(&req).as_deref(), Some("::1"));
        assert_eq!(target_port(&req), 80);
    }

    #[test]
    fn missing_host_is_none() {
        let req = request(Method::GET, "/", None);
        assert_eq!(target_host(&req), None);
        assert_eq!(target_port(&req), 80);
    }

    #[test]
    fn default_ports_by_scheme() {
        let req = request(Method::GET, "https://secure.example.com/", None);
        assert_eq!(target_port(&req), 443);
        let req = request(Method::GET, "http://plain.example.com/", None);
        assert_eq!(target_port(&req), 80);
    }
}
