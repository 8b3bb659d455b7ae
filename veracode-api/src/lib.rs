//! # Veracode Reporting API Client Library
//!
//! A Rust client library for the Veracode Reporting REST API, used to generate and
//! retrieve AUDIT reports (audit log exports).
//!
//! This library handles HMAC authentication, regional endpoint routing, transport-level
//! retries and response validation, and exposes the report lifecycle as three calls:
//! generate a report, check its status, and read its (paginated) content.
//!
//! ## Features
//!
//! - 🔐 **HMAC Authentication** - Built-in support for Veracode API credentials
//! - 🌍 **Multi-Regional Support** - Commercial, European and Federal endpoints
//! - 🔄 **Transport Retries** - Exponential backoff and rate-limit aware delays
//! - 📊 **Reporting API** - AUDIT report generation, status checks and paginated retrieval
//! - 🚀 **Async/Await** - Built on tokio
//!
//! ## Quick Start
//!
//! ```no_run
//! use veracode_reporting::{AuditReportRequest, VeracodeClient, VeracodeConfig, VeracodeRegion};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = VeracodeConfig::new("your_api_id", "your_api_key")
//!         .with_region(VeracodeRegion::Commercial);
//!
//!     let client = VeracodeClient::new(config)?;
//!     let reporting = client.reporting_api();
//!
//!     let request = AuditReportRequest::new("2025-01-01", Some("2025-03-31".to_string()));
//!     let report_id = reporting.generate_audit_report(&request).await?;
//!     let report = reporting.get_audit_report(&report_id, None).await?;
//!     println!("Report {} is {}", report_id, report.embedded.status_label());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Regional Support
//!
//! ```no_run
//! use veracode_reporting::{VeracodeConfig, VeracodeRegion};
//!
//! // European region: api.veracode.eu
//! let config = VeracodeConfig::new("api_id", "api_key")
//!     .with_region(VeracodeRegion::European);
//!
//! // US Federal region: api.veracode.us
//! let config = VeracodeConfig::new("api_id", "api_key")
//!     .with_region(VeracodeRegion::Federal);
//! ```

pub mod client;
pub mod json_validator;
pub mod reporting;

use reqwest::Error as ReqwestError;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// Re-export common types for convenience
pub use client::VeracodeClient;
pub use reporting::{
    AuditReportRequest, CompletedReport, GenerateReportResponse, PageMetadata, ReportData,
    ReportResponse, ReportStatus, ReportingApi, ReportingError,
};

/// Custom error type for Veracode API operations.
///
/// This enum represents all possible errors that can occur when talking to the
/// Veracode Reporting API.
#[derive(Debug)]
#[must_use = "Need to handle all error enum types."]
pub enum VeracodeError {
    /// HTTP request failed
    Http(ReqwestError),
    /// JSON serialization/deserialization failed
    Serialization(serde_json::Error),
    /// Authentication error (invalid credentials, signature generation failure, etc.)
    Authentication(String),
    /// API returned an error response
    InvalidResponse(String),
    /// Configuration is invalid
    InvalidConfig(String),
    /// When an item is not found
    NotFound(String),
    /// HTTP 429 returned by the API
    RateLimited {
        /// Value of the `Retry-After` header, when present
        retry_after_seconds: Option<u64>,
        /// Human readable description
        message: String,
    },
    /// All transport retry attempts were used up
    RetryExhausted(String),
}

impl fmt::Display for VeracodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VeracodeError::Http(e) => write!(f, "HTTP error: {e}"),
            VeracodeError::Serialization(e) => write!(f, "Serialization error: {e}"),
            VeracodeError::Authentication(e) => write!(f, "Authentication error: {e}"),
            VeracodeError::InvalidResponse(e) => write!(f, "Invalid response: {e}"),
            VeracodeError::InvalidConfig(e) => write!(f, "Invalid configuration: {e}"),
            VeracodeError::NotFound(e) => write!(f, "Item not found: {e}"),
            VeracodeError::RateLimited {
                retry_after_seconds,
                message,
            } => match retry_after_seconds {
                Some(seconds) => write!(f, "Rate limited: {message} (retry after {seconds}s)"),
                None => write!(f, "Rate limited: {message}"),
            },
            VeracodeError::RetryExhausted(e) => write!(f, "Retries exhausted: {e}"),
        }
    }
}

impl std::error::Error for VeracodeError {}

impl From<ReqwestError> for VeracodeError {
    fn from(error: ReqwestError) -> Self {
        VeracodeError::Http(error)
    }
}

impl From<serde_json::Error> for VeracodeError {
    fn from(error: serde_json::Error) -> Self {
        VeracodeError::Serialization(error)
    }
}

/// Veracode API credentials.
///
/// Both values are held as [`SecretString`] behind an `Arc`, so cloning a config does
/// not copy the secret and `Debug` output never shows it.
#[derive(Clone)]
pub struct VeracodeCredentials {
    api_id: Arc<SecretString>,
    api_key: Arc<SecretString>,
}

impl VeracodeCredentials {
    /// Create credentials from an API key id and secret
    #[must_use]
    pub fn new(api_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_id: Arc::new(SecretString::from(api_id.into())),
            api_key: Arc::new(SecretString::from(api_key.into())),
        }
    }

    /// Expose the API id (needed for signing)
    #[must_use]
    pub fn expose_api_id(&self) -> &str {
        self.api_id.expose_secret()
    }

    /// Expose the API key (needed for signing)
    #[must_use]
    pub fn expose_api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

impl fmt::Debug for VeracodeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VeracodeCredentials")
            .field("api_id", &"[REDACTED]")
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Veracode regions for API access.
///
/// Different regions use different API endpoints. Choose the region
/// that matches your Veracode account configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VeracodeRegion {
    /// Commercial region (default) - api.veracode.com
    #[default]
    Commercial,
    /// European region - api.veracode.eu
    European,
    /// US Federal region - api.veracode.us
    Federal,
}

impl VeracodeRegion {
    /// REST API base URL for the region
    #[must_use]
    pub fn rest_base_url(self) -> &'static str {
        match self {
            VeracodeRegion::Commercial => "https://api.veracode.com",
            VeracodeRegion::European => "https://api.veracode.eu",
            VeracodeRegion::Federal => "https://api.veracode.us",
        }
    }
}

/// Transport retry policy used by [`VeracodeClient`].
///
/// Retries cover connection failures, 5xx responses and HTTP 429. Report-level
/// waiting (a report still being generated) is not a transport retry and is
/// handled by the caller.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Number of retries after the first attempt (0 disables retries)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay_ms: u64,
    /// Upper bound for a single backoff delay
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each attempt
    pub backoff_multiplier: f64,
    /// Upper bound for the sum of all delays of one request
    pub max_total_delay_ms: u64,
    /// Maximum number of 429 responses tolerated for one request
    pub rate_limit_max_attempts: u32,
    /// Extra seconds added when waiting for the next rate-limit window
    pub rate_limit_buffer_seconds: u64,
    /// Whether to add random jitter to backoff delays
    pub jitter_enabled: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            max_total_delay_ms: 300_000,
            rate_limit_max_attempts: 1,
            rate_limit_buffer_seconds: 5,
            jitter_enabled: true,
        }
    }
}

impl RetryConfig {
    /// Create a retry configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of retries
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the initial backoff delay
    #[must_use]
    pub fn with_initial_delay(mut self, delay_ms: u64) -> Self {
        self.initial_delay_ms = delay_ms;
        self
    }

    /// Disable jitter (useful for deterministic tests)
    #[must_use]
    pub fn with_jitter_disabled(mut self) -> Self {
        self.jitter_enabled = false;
        self
    }

    /// Backoff delay for the given (1-based) attempt
    #[must_use]
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(0);
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss)]
        let base = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        #[allow(clippy::cast_precision_loss)]
        let capped = base.min(self.max_delay_ms as f64);

        let with_jitter = if self.jitter_enabled {
            // +/- 25%
            let factor: f64 = rand::random_range(0.75..=1.25);
            capped * factor
        } else {
            capped
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Duration::from_millis(with_jitter.max(0.0) as u64)
    }

    /// Delay to wait after an HTTP 429.
    ///
    /// Uses `Retry-After` when the server sent it, otherwise waits until the next
    /// minute window (Veracode rate limits are per minute) plus a small buffer.
    #[must_use]
    pub fn calculate_rate_limit_delay(&self, retry_after_seconds: Option<u64>) -> Duration {
        if let Some(seconds) = retry_after_seconds {
            return Duration::from_secs(seconds);
        }

        let now_secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let until_next_minute = 60_u64.saturating_sub(now_secs % 60);
        Duration::from_secs(until_next_minute.saturating_add(self.rate_limit_buffer_seconds))
    }

    /// Whether an error is worth another attempt
    #[must_use]
    pub fn is_retryable_error(&self, error: &VeracodeError) -> bool {
        match error {
            VeracodeError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            VeracodeError::RateLimited { .. } => true,
            VeracodeError::Serialization(_)
            | VeracodeError::Authentication(_)
            | VeracodeError::InvalidResponse(_)
            | VeracodeError::InvalidConfig(_)
            | VeracodeError::NotFound(_)
            | VeracodeError::RetryExhausted(_) => false,
        }
    }
}

/// Configuration for the Veracode API client.
///
/// Contains authentication credentials, regional endpoint, HTTP timeouts,
/// proxy settings and the transport retry policy.
#[derive(Debug, Clone)]
pub struct VeracodeConfig {
    /// API credentials used for HMAC signing
    pub credentials: VeracodeCredentials,
    /// Base URL for requests (set from the region, can be overridden)
    pub base_url: String,
    /// Veracode region for your account
    pub region: VeracodeRegion,
    /// Whether to validate TLS certificates (default: true)
    pub validate_certificates: bool,
    /// Connect timeout in seconds
    pub connect_timeout: u64,
    /// Whole-request timeout in seconds
    pub request_timeout: u64,
    /// Optional HTTP(S) proxy URL
    pub proxy_url: Option<String>,
    /// Optional proxy username
    pub proxy_username: Option<SecretString>,
    /// Optional proxy password
    pub proxy_password: Option<SecretString>,
    /// Transport retry policy
    pub retry_config: RetryConfig,
}

impl VeracodeConfig {
    /// Create a new configuration for the Commercial region.
    ///
    /// # Arguments
    ///
    /// * `api_id` - Your Veracode API ID
    /// * `api_key` - Your Veracode API key
    #[must_use]
    pub fn new(api_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::from_credentials(VeracodeCredentials::new(api_id, api_key))
    }

    /// Create a configuration from already loaded credentials
    #[must_use]
    pub fn from_credentials(credentials: VeracodeCredentials) -> Self {
        let region = VeracodeRegion::Commercial;
        Self {
            credentials,
            base_url: region.rest_base_url().to_string(),
            region,
            validate_certificates: true, // Default to secure
            connect_timeout: 30,
            // Report pages can be large; the API may take minutes to serve them
            request_timeout: 300,
            proxy_url: None,
            proxy_username: None,
            proxy_password: None,
            retry_config: RetryConfig::default(),
        }
    }

    /// Set the region for this configuration.
    ///
    /// This also resets `base_url` to the region's REST endpoint.
    #[must_use]
    pub fn with_region(mut self, region: VeracodeRegion) -> Self {
        self.region = region;
        self.base_url = region.rest_base_url().to_string();
        self
    }

    /// Override the base URL (mock servers, gateways)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Disable certificate validation for development environments.
    ///
    /// WARNING: This should only be used in development environments with
    /// self-signed certificates. Never use this in production.
    #[must_use]
    pub fn with_certificate_validation_disabled(mut self) -> Self {
        self.validate_certificates = false;
        self
    }

    /// Route all requests through a proxy
    #[must_use]
    pub fn with_proxy(mut self, proxy_url: &str) -> Self {
        self.proxy_url = Some(proxy_url.to_string());
        self
    }

    /// Basic authentication for the proxy
    #[must_use]
    pub fn with_proxy_auth(mut self, username: &str, password: &str) -> Self {
        self.proxy_username = Some(SecretString::from(username.to_string()));
        self.proxy_password = Some(SecretString::from(password.to_string()));
        self
    }

    /// Set HTTP timeouts in seconds
    #[must_use]
    pub fn with_timeouts(mut self, connect_timeout: u64, request_timeout: u64) -> Self {
        self.connect_timeout = connect_timeout;
        self.request_timeout = request_timeout;
        self
    }

    /// Replace the transport retry policy
    #[must_use]
    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Disable transport retries entirely
    #[must_use]
    pub fn with_retries_disabled(mut self) -> Self {
        self.retry_config.max_attempts = 0;
        self
    }
}

impl VeracodeClient {
    /// Get a reporting API instance.
    /// Uses REST API (api.veracode.*).
    #[must_use]
    pub fn reporting_api(&self) -> ReportingApi {
        ReportingApi::new(self.clone())
    }
}
