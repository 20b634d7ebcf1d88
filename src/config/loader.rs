//! Configuration loading from disk and the process environment.
//!
//! Precedence, lowest to highest: built-in defaults, TOML file, environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A validated configuration plus any environment values that were ignored.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: ProxyConfig,
    /// Human-readable notes about environment values that could not be used.
    /// Logged by the caller once logging is up.
    pub warnings: Vec<String>,
}

/// Load, apply environment overrides, and validate.
pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Like [`load_config`], with an injectable environment lookup.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<LoadedConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            parse_config(&content)?
        }
        None => ProxyConfig::default(),
    };

    let warnings = apply_env_overrides(&mut config, lookup);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(LoadedConfig { config, warnings })
}

/// Parse TOML configuration text. Missing sections take their defaults.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Overlay environment variables onto `config`.
///
/// Present-but-empty `UPSTREAM_PROXY`, `PROXY_EXCEPTIONS` and `PROXY_AUTH`
/// clear the corresponding file setting. Unparseable numeric values are
/// skipped and reported in the returned warnings.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut warnings = Vec::new();

    if let Some(value) = lookup("UPSTREAM_PROXY") {
        config.routing.upstream_proxy = non_empty(value);
    }
    if let Some(value) = lookup("PROXY_EXCEPTIONS") {
        config.routing.exceptions = non_empty(value).into_iter().collect();
    }
    if let Some(value) = lookup("PROXY_AUTH") {
        config.auth.credentials = non_empty(value);
    }
    if let Some(value) = lookup("LISTEN_ADDR").and_then(non_empty) {
        config.listener.bind_address = normalize_listen_addr(&value);
    }

    if let Some(value) = lookup("MAX_CONNECTIONS") {
        match value.trim().parse::<usize>() {
            Ok(n) if n > 0 => config.listener.max_connections = n,
            _ => warnings.push(format!("ignoring MAX_CONNECTIONS={:?}: not a positive integer", value)),
        }
    }

    let durations: [(&str, &mut u64); 3] = [
        ("TRANSPORT_DIAL_TIMEOUT", &mut config.timeouts.connect_secs),
        ("CLIENT_REQUEST_TIMEOUT", &mut config.timeouts.request_secs),
        (
            "TUNNEL_CONNECT_READ_WRITE_TIMEOUT",
            &mut config.timeouts.tunnel_handshake_secs,
        ),
    ];
    for (key, slot) in durations {
        let Some(value) = lookup(key) else { continue };
        if value.trim().is_empty() {
            continue;
        }
        match parse_duration_secs(&value) {
            Some(secs) => *slot = secs,
            None => warnings.push(format!("ignoring {}={:?}: not a positive duration", key, value)),
        }
    }

    warnings
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Accept the `:8080` shorthand for "all interfaces".
pub fn normalize_listen_addr(addr: &str) -> String {
    let addr = addr.trim();
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

/// Parse `N`, `Ns`, `Nm` or `Nh` into whole seconds. Zero is rejected.
pub fn parse_duration_secs(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let (digits, multiplier) = match raw.char_indices().last()? {
        (i, 's') => (&raw[..i], 1),
        (i, 'm') => (&raw[..i], 60),
        (i, 'h') => (&raw[..i], 3600),
        _ => (raw, 1),
    };
    let secs = digits.parse::<u64>().ok()?.checked_mul(multiplier)?;
    (secs > 0).then_some(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parse_durations() {
        assert_eq!(parse_duration_secs("30"), Some(30));
        assert_eq!(parse_duration_secs("30s"), Some(30));
        assert_eq!(parse_duration_secs(" 2m "), Some(120));
        assert_eq!(parse_duration_secs("1h"), Some(3600));
        assert_eq!(parse_duration_secs("0s"), None);
        assert_eq!(parse_duration_secs("500ms"), None);
        assert_eq!(parse_duration_secs("abc"), None);
        assert_eq!(parse_duration_secs("-5"), None);
        assert_eq!(parse_duration_secs(""), None);
    }

    #[test]
    fn listen_addr_shorthand() {
        assert_eq!(normalize_listen_addr(":8080"), "0.0.0.0:8080");
        assert_eq!(normalize_listen_addr("127.0.0.1:9000"), "127.0.0.1:9000");
    }

    #[test]
    fn env_overrides_routing_and_listener() {
        let mut config = ProxyConfig::default();
        let warnings = apply_env_overrides(
            &mut config,
            env(&[
                ("UPSTREAM_PROXY", "http://proxy.local:3128"),
                ("PROXY_EXCEPTIONS", "internal.corp, localhost"),
                ("LISTEN_ADDR", ":9090"),
                ("PROXY_AUTH", "alice:secret"),
                ("TRANSPORT_DIAL_TIMEOUT", "3s"),
                ("CLIENT_REQUEST_TIMEOUT", "2m"),
                ("MAX_CONNECTIONS", "64"),
            ]),
        );

        assert!(warnings.is_empty());
        assert_eq!(
            config.routing.upstream_proxy.as_deref(),
            Some("http://proxy.local:3128")
        );
        assert_eq!(config.routing.exceptions, vec!["internal.corp, localhost"]);
        assert_eq!(config.listener.bind_address, "0.0.0.0:9090");
        assert_eq!(config.listener.max_connections, 64);
        assert_eq!(config.auth.credentials.as_deref(), Some("alice:secret"));
        assert_eq!(config.timeouts.connect_secs, 3);
        assert_eq!(config.timeouts.request_secs, 120);
        assert_eq!(config.timeouts.tunnel_handshake_secs, 15);
    }

    #[test]
    fn invalid_env_values_keep_defaults() {
        let mut config = ProxyConfig::default();
        let warnings = apply_env_overrides(
            &mut config,
            env(&[
                ("TRANSPORT_DIAL_TIMEOUT", "soon"),
                ("CLIENT_REQUEST_TIMEOUT", "0"),
                ("TUNNEL_CONNECT_READ_WRITE_TIMEOUT", ""),
                ("MAX_CONNECTIONS", "-1"),
            ]),
        );

        assert_eq!(warnings.len(), 3);
        assert_eq!(config.timeouts.connect_secs, 10);
        assert_eq!(config.timeouts.request_secs, 60);
        assert_eq!(config.timeouts.tunnel_handshake_secs, 15);
        assert_eq!(config.listener.max_connections, 10_000);
    }

    #[test]
    fn empty_env_clears_file_settings() {
        let mut config = parse_config(
            r#"
            [routing]
            upstream_proxy = "http://proxy.local:3128"
            exceptions = ["a.com"]
            "#,
        )
        .unwrap();

        apply_env_overrides(&mut config, env(&[("UPSTREAM_PROXY", ""), ("PROXY_EXCEPTIONS", " ")]));
        assert!(config.routing.upstream_proxy.is_none());
        assert!(config.routing.exceptions.is_empty());
    }

    #[test]
    fn parse_full_file() {
        let config = parse_config(
            r#"
            [listener]
            bind_address = "127.0.0.1:3128"
            max_connections = 100

            [routing]
            upstream_proxy = "http://proxy.corp:8080"
            exceptions = ["internal.corp", "localhost"]

            [auth]
            credentials = "user:pw"

            [timeouts]
            connect_secs = 2

            [observability]
            log_level = "debug"
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:3128");
        assert_eq!(config.listener.max_connections, 100);
        assert_eq!(config.routing.exceptions.len(), 2);
        assert_eq!(config.timeouts.connect_secs, 2);
        assert_eq!(config.timeouts.request_secs, 60);
        assert_eq!(config.observability.log_format, crate::config::LogFormat::Json);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.routing.upstream_proxy.is_none());
    }

    #[test]
    fn load_without_file_validates_env() {
        let err = load_config_with(None, env(&[("UPSTREAM_PROXY", "not-a-url")])).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("missing scheme"));

        let loaded = load_config_with(None, env(&[])).unwrap();
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config_with(Some(Path::new("/nonexistent/dynamic-proxy.toml")), env(&[]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
