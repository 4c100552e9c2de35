//! GraphQL backend configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use crate::consts::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, ENV_API_TOKEN, ENV_CONNECT_TIMEOUT_SECS,
    ENV_GRAPHQL_URL, ENV_REQUEST_TIMEOUT_SECS, ENV_SUPPORTS_UNASSIGN,
};
use crate::source::SourceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for SourceTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphQlConfig {
    pub endpoint: String,
    pub token: Option<String>,
    pub timeouts: SourceTimeouts,
    pub supports_unassign: bool,
}

impl GraphQlConfig {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), token: None, timeouts: SourceTimeouts::default(), supports_unassign: false }
    }

    /// Build config from environment variables.
    ///
    /// Required:
    /// - `CURATOR_GRAPHQL_URL`
    ///
    /// Optional:
    /// - `CURATOR_API_TOKEN`: sent as a bearer token
    /// - `CURATOR_REQUEST_TIMEOUT_SECS`: default 30
    /// - `CURATOR_CONNECT_TIMEOUT_SECS`: default 10
    /// - `CURATOR_SUPPORTS_UNASSIGN`: `true`/`1` when the backend has `removeLinkFromTopic`
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is missing or a value does not parse.
    pub fn from_env() -> Result<Self, SourceError> {
        Self::from_lookup(env_var)
    }

    /// Same as [`GraphQlConfig::from_env`] over an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is missing or a value does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SourceError> {
        let endpoint = lookup(ENV_GRAPHQL_URL)
            .map(|raw| raw.trim().trim_end_matches('/').to_owned())
            .filter(|raw| !raw.is_empty())
            .ok_or_else(|| SourceError::Config(format!("{ENV_GRAPHQL_URL} is not set")))?;
        reqwest::Url::parse(&endpoint).map_err(|e| SourceError::Config(format!("{ENV_GRAPHQL_URL}: {e}")))?;

        let token = lookup(ENV_API_TOKEN).filter(|t| !t.trim().is_empty());
        let timeouts = SourceTimeouts {
            request_secs: parse_u64(&lookup, ENV_REQUEST_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: parse_u64(&lookup, ENV_CONNECT_TIMEOUT_SECS, DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };
        let supports_unassign = parse_bool(lookup(ENV_SUPPORTS_UNASSIGN).as_deref())?;

        Ok(Self { endpoint, token, timeouts, supports_unassign })
    }
}

/// Process environment lookup. Unset and non-UTF-8 values both read as absent.
#[must_use]
pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64, SourceError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| SourceError::Config(format!("{key} must be a whole number of seconds, got '{raw}'"))),
    }
}

fn parse_bool(raw: Option<&str>) -> Result<bool, SourceError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(false),
        Some("1" | "true" | "yes") => Ok(true),
        Some("0" | "false" | "no") => Ok(false),
        Some(other) => Err(SourceError::Config(format!("{ENV_SUPPORTS_UNASSIGN}: expected true or false, got '{other}'"))),
    }
}
