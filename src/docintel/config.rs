//! Document intelligence configuration parsed from environment variables.

use super::types::ExtractError;
use crate::config::env_parse;

pub const ENDPOINT_VAR: &str = "AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT";
pub const KEY_VAR: &str = "AZURE_DOCUMENT_INTELLIGENCE_KEY";

pub const DEFAULT_MODEL: &str = "prebuilt-invoice";
pub const DEFAULT_API_VERSION: &str = "2023-07-31";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MAX_POLLS: u32 = 120;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocIntelTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocIntelConfig {
    /// Resource endpoint without a trailing slash.
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub api_version: String,
    pub poll_interval_ms: u64,
    pub max_polls: u32,
    pub timeouts: DocIntelTimeouts,
}

impl DocIntelConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT`
    /// - `AZURE_DOCUMENT_INTELLIGENCE_KEY`
    ///
    /// Optional:
    /// - `DOCINTEL_MODEL`: default `prebuilt-invoice`
    /// - `DOCINTEL_API_VERSION`: default `2023-07-31`
    /// - `DOCINTEL_POLL_INTERVAL_MS`: default 1000
    /// - `DOCINTEL_MAX_POLLS`: default 120
    /// - `DOCINTEL_REQUEST_TIMEOUT_SECS`: default 60
    /// - `DOCINTEL_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if a credential is missing or the endpoint is not an
    /// http(s) URL.
    pub fn from_env() -> Result<Self, ExtractError> {
        let endpoint = required(ENDPOINT_VAR)?.trim_end_matches('/').to_string();
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(ExtractError::ConfigParse(format!("{ENDPOINT_VAR} must be an http(s) URL, got '{endpoint}'")));
        }
        let api_key = required(KEY_VAR)?;

        Ok(Self {
            endpoint,
            api_key,
            model: std::env::var("DOCINTEL_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            api_version: std::env::var("DOCINTEL_API_VERSION").unwrap_or_else(|_| DEFAULT_API_VERSION.to_string()),
            poll_interval_ms: env_parse("DOCINTEL_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS),
            max_polls: env_parse("DOCINTEL_MAX_POLLS", DEFAULT_MAX_POLLS).max(1),
            timeouts: DocIntelTimeouts {
                request_secs: env_parse("DOCINTEL_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
                connect_secs: env_parse("DOCINTEL_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            },
        })
    }

    /// Config for `endpoint`/`api_key` with every other knob at its default.
    #[must_use]
    pub fn new(endpoint: &str, api_key: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_polls: DEFAULT_MAX_POLLS,
            timeouts: DocIntelTimeouts {
                request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
                connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
        }
    }
}

fn required(var: &str) -> Result<String, ExtractError> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ExtractError::MissingCredentials { var: var.to_string() })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
