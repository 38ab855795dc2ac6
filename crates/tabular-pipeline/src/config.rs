//! Client configuration for talking to the processing service.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic client setup.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default processing service location.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default interval between job status checks.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Default timeout for a single HTTP request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default number of sample rows kept in a dataset preview.
pub const DEFAULT_PREVIEW_ROWS: usize = 20;

/// Configuration for the processing service client and job controller.
///
/// Use [`ClientConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use tabular_pipeline::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://processing.internal:8000")
///     .poll_interval_ms(500)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the processing service.
    /// Default: "http://localhost:8000"
    pub base_url: String,

    /// Interval between job status checks, in milliseconds.
    /// Default: 2000
    pub poll_interval_ms: u64,

    /// Timeout for each HTTP request, in seconds.
    /// Default: 30
    pub request_timeout_secs: u64,

    /// Number of sample rows kept in a dataset preview.
    /// Default: 20
    pub preview_rows: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Build a configuration from `BACKEND_URL` and `POLL_INTERVAL_MS`.
    ///
    /// Unset variables fall back to the defaults.
    pub fn from_env() -> Result<Self, ConfigValidationError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars<F>(lookup: F) -> Result<Self, ConfigValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(url) = lookup("BACKEND_URL") {
            builder = builder.base_url(url);
        }

        if let Some(raw) = lookup("POLL_INTERVAL_MS") {
            let interval_ms = raw
                .trim()
                .parse()
                .map_err(|_| ConfigValidationError::NotANumber {
                    name: "POLL_INTERVAL_MS",
                    value: raw.clone(),
                })?;
            builder = builder.poll_interval_ms(interval_ms);
        }

        builder.build()
    }

    /// Interval between job status checks.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Timeout for each HTTP request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        match Url::parse(&self.base_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            _ => return Err(ConfigValidationError::InvalidBaseUrl(self.base_url.clone())),
        }

        if self.poll_interval_ms == 0 {
            return Err(ConfigValidationError::InvalidPollInterval(
                self.poll_interval_ms,
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidTimeout(
                self.request_timeout_secs,
            ));
        }

        if self.preview_rows == 0 {
            return Err(ConfigValidationError::InvalidPreviewRows(self.preview_rows));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid base URL '{0}' (must be an absolute http(s) URL)")]
    InvalidBaseUrl(String),

    #[error("Invalid poll interval: {0}ms (must be at least 1)")]
    InvalidPollInterval(u64),

    #[error("Invalid request timeout: {0}s (must be at least 1)")]
    InvalidTimeout(u64),

    #[error("Invalid preview row count: {0} (must be at least 1)")]
    InvalidPreviewRows(usize),

    #[error("Invalid {name}: '{value}' is not a whole number")]
    NotANumber { name: &'static str, value: String },
}

/// Builder for [`ClientConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    poll_interval_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    preview_rows: Option<usize>,
}

impl ClientConfigBuilder {
    /// Set the processing service base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the interval between job status checks.
    pub fn poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.poll_interval_ms = Some(interval_ms);
        self
    }

    /// Set the per-request timeout.
    pub fn request_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.request_timeout_secs = Some(timeout_secs);
        self
    }

    /// Set how many sample rows a preview keeps.
    pub fn preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = Some(rows);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `ClientConfig` or an error if validation fails.
    pub fn build(self) -> Result<ClientConfig, ConfigValidationError> {
        let config = ClientConfig {
            base_url: self
                .base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            poll_interval_ms: self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            request_timeout_secs: self
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            preview_rows: self.preview_rows.unwrap_or(DEFAULT_PREVIEW_ROWS),
        };

        config.validate()?;
        Ok(config)
    }
}
