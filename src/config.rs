//! Service configuration parsed from environment variables.
//!
//! A `.env` file in the working directory is loaded by `main` before this
//! runs, so both real environment variables and `.env` entries apply.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_DATA_DIR: &str = ".";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
pub const DEFAULT_EXTRACT_CONCURRENCY: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid BIND_ADDR '{0}'")]
    InvalidBindAddr(String),
    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Root of the invoice folder, statement file and result folders.
    pub data_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// Invoices analyzed concurrently during one extraction run.
    pub extract_concurrency: usize,
    /// Optional front-end build directory served as the router fallback.
    pub static_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// - `PORT`: default 5000
    /// - `BIND_ADDR`: default `0.0.0.0`
    /// - `DATA_DIR`: default `.`
    /// - `MAX_UPLOAD_BYTES`: default 25 MiB
    /// - `EXTRACT_CONCURRENCY`: default 4
    /// - `STATIC_DIR`: unset by default
    ///
    /// # Errors
    ///
    /// Returns an error if `BIND_ADDR` is not an IP address or a size knob is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidBindAddr(raw_addr.clone()))?;

        let max_upload_bytes = env_parse("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES);
        if max_upload_bytes == 0 {
            return Err(ConfigError::Zero { key: "MAX_UPLOAD_BYTES" });
        }
        let extract_concurrency = env_parse("EXTRACT_CONCURRENCY", DEFAULT_EXTRACT_CONCURRENCY);
        if extract_concurrency == 0 {
            return Err(ConfigError::Zero { key: "EXTRACT_CONCURRENCY" });
        }

        Ok(Self {
            bind_addr,
            port: env_parse("PORT", DEFAULT_PORT),
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR)),
            max_upload_bytes,
            extract_concurrency,
            static_dir: std::env::var("STATIC_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// Config rooted at `data_dir` with every other knob at its default.
    #[must_use]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr: IpAddr::from([127, 0, 0, 1]),
            port: DEFAULT_PORT,
            data_dir: data_dir.into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            extract_concurrency: DEFAULT_EXTRACT_CONCURRENCY,
            static_dir: None,
        }
    }

    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
