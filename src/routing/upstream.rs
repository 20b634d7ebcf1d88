//! Upstream proxy endpoint parsing.
//!
//! # Responsibilities
//! - Parse the configured upstream URL once at startup
//! - Reject URLs without a scheme or hostname (fatal configuration error)
//! - Default the port to 80 when unspecified or zero
//! - Keep URL userinfo as credentials for the upstream proxy

use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::{Host, Url};

use crate::auth::Credentials;

/// Port used when the upstream URL does not name one.
pub const DEFAULT_UPSTREAM_PORT: u16 = 80;

/// The upstream proxy URL is present but malformed.
///
/// Raised only while loading configuration; never per request. The raw URL
/// is deliberately not echoed since it may carry credentials.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("invalid upstream proxy URL: {0}")]
    InvalidUrl(url::ParseError),

    #[error("invalid upstream proxy URL: missing scheme")]
    MissingScheme,

    #[error("invalid upstream proxy URL: missing hostname")]
    MissingHost,

    #[error("invalid upstream proxy URL: credentials are not valid UTF-8 once decoded")]
    InvalidCredentials,
}

/// A validated upstream proxy endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    scheme: String,
    host: String,
    port: u16,
    credentials: Option<Credentials>,
}

impl UpstreamTarget {
    /// Parse an optional upstream URL.
    ///
    /// Absent or blank input means "no upstream configured" and is not an
    /// error.
    pub fn parse(raw: Option<&str>) -> Result<Option<Self>, ConfigurationError> {
        let raw = match raw.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(None),
        };

        let url = Url::parse(raw).map_err(|e| match e {
            url::ParseError::RelativeUrlWithoutBase => ConfigurationError::MissingScheme,
            url::ParseError::EmptyHost => ConfigurationError::MissingHost,
            other => ConfigurationError::InvalidUrl(other),
        })?;

        if url.scheme().is_empty() {
            return Err(ConfigurationError::MissingScheme);
        }

        let host = match url.host() {
            Some(Host::Ipv6(addr)) => addr.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Domain(domain)) => domain.to_string(),
            None => String::new(),
        };
        if host.is_empty() {
            return Err(ConfigurationError::MissingHost);
        }

        let port = match explicit_port(&url, raw) {
            Some(0) | None => DEFAULT_UPSTREAM_PORT,
            Some(port) => port,
        };

        let credentials = if url.username().is_empty() {
            None
        } else {
            let username = decode_userinfo(url.username())?;
            let password = decode_userinfo(url.password().unwrap_or_default())?;
            Some(Credentials::new(username, password))
        };

        Ok(Some(Self {
            scheme: url.scheme().to_string(),
            host,
            port,
            credentials,
        }))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Credentials to present to the upstream proxy, if the URL carried any.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }
}

/// `Url` keeps userinfo percent-encoded; the upstream expects the raw text.
fn decode_userinfo(raw: &str) -> Result<String, ConfigurationError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ConfigurationError::InvalidCredentials)
}

/// The port written in the URL, if any.
///
/// `Url::port` hides a port equal to the scheme's default (`https://p:443`),
/// so fall back to inspecting the authority text for that case.
fn explicit_port(url: &Url, raw: &str) -> Option<u16> {
    if let Some(port) = url.port() {
        return Some(port);
    }
    let default = url.port_or_known_default()?;
    let (_, rest) = raw.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host_port = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host_port)| host_port);
    host_port
        .ends_with(&format!(":{}", default))
        .then_some(default)
}

impl std::fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", self.scheme, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}

impl std::fmt::Debug for UpstreamTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamTarget")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("credentials", &self.credentials)
            .finish()
    }
}
