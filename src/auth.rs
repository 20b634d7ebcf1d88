//! Proxy credentials and `Proxy-Authorization: Basic` handling.
//!
//! Used in two directions: verifying credentials presented by clients, and
//! presenting credentials to an authenticated upstream proxy.

use axum::http::HeaderValue;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// A username/password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse the `user:password` form. The username must be non-empty; the
    /// password may contain further colons.
    pub fn parse(raw: &str) -> Option<Self> {
        let (username, password) = raw.split_once(':')?;
        if username.is_empty() {
            return None;
        }
        Some(Self::new(username, password))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Encode as a `Basic` authorization header value.
    pub fn basic_header(&self) -> HeaderValue {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password));
        let mut value = HeaderValue::from_str(&format!("Basic {}", encoded))
            .expect("base64 output is always a valid header value");
        value.set_sensitive(true);
        value
    }

    /// Decode a `Basic` authorization header value.
    pub fn from_basic_header(value: &HeaderValue) -> Option<Self> {
        let value = value.to_str().ok()?;
        let (scheme, encoded) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        Self::parse(&decoded)
    }

    /// Check a presented header against these credentials.
    ///
    /// Both fields are always compared, in constant time for equal lengths.
    pub fn verify(&self, presented: Option<&HeaderValue>) -> bool {
        let Some(creds) = presented.and_then(Self::from_basic_header) else {
            return false;
        };
        let username = constant_time_eq(creds.username.as_bytes(), self.username.as_bytes());
        let password = constant_time_eq(creds.password.as_bytes(), self.password.as_bytes());
        username & password
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
