//! Hostname-suffix exception rules.
//!
//! # Responsibilities
//! - Normalize the configured exception list (trim, lower-case, dedupe)
//! - Answer "should this host bypass the upstream proxy?"
//!
//! # Design Decisions
//! - Matching is a raw string suffix test, not dot-boundary aware:
//!   `"notexample.com"` matches the exception `"example.com"`. This is a
//!   known quirk kept for compatibility with existing exception lists.
//! - Built once at startup, never mutated afterwards

use std::collections::BTreeSet;

use url::Url;

/// An immutable set of normalized hostname suffixes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionSet {
    suffixes: BTreeSet<String>,
}

impl ExceptionSet {
    /// Build from a comma-separated list such as `"internal.corp, localhost"`.
    ///
    /// Never fails: any input, including the empty string, yields a valid
    /// (possibly empty) set.
    pub fn build(raw: &str) -> Self {
        Self::from_entries([raw])
    }

    /// Build from a list of entries. Each entry may itself be comma-separated.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut suffixes = BTreeSet::new();
        for entry in entries {
            suffixes.extend(entry.as_ref().split(',').filter_map(normalize_suffix));
        }
        Self { suffixes }
    }

    /// Returns true if `hostname` ends with any suffix in the set.
    ///
    /// The caller is expected to have lower-cased `hostname` already.
    pub fn matches(&self, hostname: &str) -> bool {
        self.suffixes
            .iter()
            .any(|suffix| hostname.ends_with(suffix.as_str()))
    }

    pub fn len(&self) -> usize {
        self.suffixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }

    /// Iterate the suffixes in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.suffixes.iter().map(String::as_str)
    }
}

/// Normalize one exception entry. Returns `None` for entries that are empty
/// after trimming.
///
/// Entries written as URLs (`https://internal.corp/`) are reduced to their
/// host, since a bare hostname can never end with `"://"`-style text.
fn normalize_suffix(entry: &str) -> Option<String> {
    let mut entry = entry.trim().to_lowercase();

    if entry.starts_with("http://") || entry.starts_with("https://") {
        if let Some(host) = Url::parse(&entry)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
        {
            entry = host.trim_start_matches('[').trim_end_matches(']').to_string();
        }
    }

    let entry = entry.trim_end_matches('/');
    if entry.is_empty() {
        None
    } else {
        Some(entry.to_string())
    }
}
