//! services/storefront/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: String,
    pub token_path: PathBuf,
    pub log_level: Level,
    pub page_size: u32,
    pub scroll_threshold: f64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Backend ---
        let api_url = lookup("STOREFRONT_API_URL")
            .unwrap_or_else(|| "http://localhost:5000".to_string());
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(
                "STOREFRONT_API_URL".to_string(),
                format!("'{}' is not an http(s) URL", api_url),
            ));
        }
        let api_url = api_url.trim_end_matches('/').to_string();

        // --- Session storage ---
        let token_path = lookup("STOREFRONT_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.storefront/token"));

        // --- Logging ---
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Catalog paging ---
        let page_size = match lookup("STOREFRONT_PAGE_SIZE") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "STOREFRONT_PAGE_SIZE".to_string(),
                        format!("'{}' is not a positive integer", raw),
                    )
                })?,
            None => 12,
        };

        let scroll_threshold = match lookup("STOREFRONT_SCROLL_THRESHOLD") {
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|px| px.is_finite() && *px >= 0.0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "STOREFRONT_SCROLL_THRESHOLD".to_string(),
                        format!("'{}' is not a non-negative number of pixels", raw),
                    )
                })?,
            None => 100.0,
        };

        Ok(Self {
            api_url,
            token_path,
            log_level,
            page_size,
            scroll_threshold,
        })
    }
}
