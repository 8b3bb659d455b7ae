//! Core Veracode API client implementation.
//!
//! This module contains the foundational client for making authenticated requests
//! to the Veracode API, including HMAC authentication and HTTP request handling.

use hmac::{Hmac, Mac};
use log::{Level, debug, warn};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use sha2::Sha256;
use std::borrow::Cow;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use url::Url;

use crate::{VeracodeConfig, VeracodeError};

// Type aliases for HMAC
type HmacSha256 = Hmac<Sha256>;

// Constants for authentication error messages to avoid repeated allocations
const INVALID_URL_MSG: &str = "Invalid URL";
const INVALID_API_KEY_MSG: &str = "Invalid API key format - must be hex string";
const INVALID_NONCE_MSG: &str = "Invalid nonce format";
const HMAC_CREATION_FAILED_MSG: &str = "Failed to create HMAC";

const AUTH_SCHEME: &str = "VERACODE-HMAC-SHA-256";
const SIGNING_VERSION: &str = "vcode_request_version_1";

/// Core Veracode API client.
///
/// This struct provides the foundational HTTP client with HMAC authentication
/// for making requests to any Veracode API endpoint.
#[derive(Clone)]
pub struct VeracodeClient {
    config: VeracodeConfig,
    client: Client,
}

impl std::fmt::Debug for VeracodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VeracodeClient")
            .field("base_url", &self.config.base_url)
            .field("region", &self.config.region)
            .finish_non_exhaustive()
    }
}

impl VeracodeClient {
    /// Create a new Veracode API client.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration containing API credentials and settings
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy URL is invalid or the HTTP client cannot be built.
    pub fn new(config: VeracodeConfig) -> Result<Self, VeracodeError> {
        let mut client_builder = Client::builder();

        // Use the certificate validation setting from config
        if !config.validate_certificates {
            client_builder = client_builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }

        client_builder = client_builder
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .timeout(Duration::from_secs(config.request_timeout));

        if let Some(proxy_url) = &config.proxy_url {
            let mut proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| VeracodeError::InvalidConfig(format!("Invalid proxy URL: {e}")))?;

            if let (Some(username), Some(password)) =
                (&config.proxy_username, &config.proxy_password)
            {
                proxy = proxy.basic_auth(username.expose_secret(), password.expose_secret());
            }

            client_builder = client_builder.proxy(proxy);
        }

        let client = client_builder.build().map_err(VeracodeError::Http)?;
        Ok(Self { config, client })
    }

    /// Get the base URL for API requests.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Get access to the configuration
    #[must_use]
    pub fn config(&self) -> &VeracodeConfig {
        &self.config
    }

    /// Execute an HTTP request with retry logic and exponential backoff.
    ///
    /// Connection failures and 5xx responses are retried with exponential backoff.
    /// HTTP 429 waits for `Retry-After` (or the next minute window) and is counted
    /// separately against `rate_limit_max_attempts`. Any other response, including
    /// 4xx, is returned to the caller unchanged.
    async fn execute_with_retry<F>(
        &self,
        request_builder: F,
        operation_name: Cow<'_, str>,
    ) -> Result<reqwest::Response, VeracodeError>
    where
        F: Fn() -> Result<reqwest::RequestBuilder, VeracodeError>,
    {
        let retry_config = &self.config.retry_config;
        let start_time = Instant::now();
        let mut total_delay = Duration::from_millis(0);

        // If retries are disabled, make a single attempt
        if retry_config.max_attempts == 0 {
            return request_builder()?
                .send()
                .await
                .map_err(VeracodeError::Http);
        }

        let mut last_error = None;
        let mut rate_limit_attempts: u32 = 0;

        for attempt in 1..=retry_config.max_attempts.saturating_add(1) {
            let is_last_attempt = attempt > retry_config.max_attempts;

            let (error, delay) = match request_builder()?.send().await {
                Ok(response) if response.status().as_u16() == 429 => {
                    let retry_after_seconds = response
                        .headers()
                        .get("retry-after")
                        .and_then(|h| h.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok());

                    rate_limit_attempts = rate_limit_attempts.saturating_add(1);
                    let error = VeracodeError::RateLimited {
                        retry_after_seconds,
                        message: "HTTP 429: Rate limit exceeded".to_string(),
                    };

                    if is_last_attempt || rate_limit_attempts > retry_config.rate_limit_max_attempts
                    {
                        last_error = Some(error);
                        break;
                    }

                    let delay = retry_config.calculate_rate_limit_delay(retry_after_seconds);
                    let wait_time = match retry_after_seconds {
                        Some(seconds) => format!("{seconds}s (from Retry-After header)"),
                        None => format!("{}s (until next minute window)", delay.as_secs()),
                    };
                    warn!("🚦 {operation_name} rate limited on attempt {attempt}, waiting {wait_time}");
                    (error, delay)
                }
                Ok(response) if response.status().is_server_error() && !is_last_attempt => {
                    let error = VeracodeError::InvalidResponse(format!(
                        "HTTP {} from {}",
                        response.status(),
                        response.url()
                    ));
                    (error, retry_config.calculate_delay(attempt))
                }
                Ok(response) => {
                    if let Some((level, message)) =
                        retried_response_log(&operation_name, attempt, response.status())
                    {
                        log::log!(level, "{message}");
                    }
                    return Ok(response);
                }
                Err(e) => {
                    let error = VeracodeError::Http(e);
                    if is_last_attempt || !retry_config.is_retryable_error(&error) {
                        last_error = Some(error);
                        break;
                    }
                    (error, retry_config.calculate_delay(attempt))
                }
            };

            total_delay = total_delay.saturating_add(delay);
            if total_delay.as_millis() > u128::from(retry_config.max_total_delay_ms) {
                last_error = Some(VeracodeError::RetryExhausted(format!(
                    "{} exceeded maximum total retry time of {}ms after {} attempts",
                    operation_name, retry_config.max_total_delay_ms, attempt
                )));
                break;
            }

            warn!(
                "⚠️  {operation_name} failed on attempt {attempt}, retrying in {}ms: {error}",
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            last_error = Some(error);
        }

        match last_error {
            Some(error @ VeracodeError::RetryExhausted(_)) => Err(error),
            // A final 429 is surfaced as-is so callers can inspect Retry-After
            Some(error @ VeracodeError::RateLimited { .. }) => Err(error),
            Some(error) => Err(VeracodeError::RetryExhausted(format!(
                "{} failed after {} attempts over {}ms: {}",
                operation_name,
                retry_config.max_attempts.saturating_add(1),
                start_time.elapsed().as_millis(),
                error
            ))),
            None => Err(VeracodeError::RetryExhausted(format!(
                "{} failed after {} attempts with unknown error",
                operation_name,
                retry_config.max_attempts.saturating_add(1)
            ))),
        }
    }

    /// Generate HMAC signature for authentication based on the official Veracode signing scheme
    fn generate_hmac_signature(
        &self,
        method: &str,
        url: &str,
        timestamp: u64,
        nonce: &str,
    ) -> Result<String, VeracodeError> {
        let url_parsed = Url::parse(url)
            .map_err(|_| VeracodeError::Authentication(INVALID_URL_MSG.to_string()))?;

        let path_and_query = match url_parsed.query() {
            Some(query) => format!("{}?{}", url_parsed.path(), query),
            None => url_parsed.path().to_string(),
        };

        let host = url_parsed.host_str().unwrap_or("");

        let data = format!(
            "id={}&host={}&url={}&method={}",
            self.config.credentials.expose_api_id(),
            host,
            path_and_query,
            method
        );

        let key_bytes = hex::decode(self.config.credentials.expose_api_key())
            .map_err(|_| VeracodeError::Authentication(INVALID_API_KEY_MSG.to_string()))?;

        let nonce_bytes = hex::decode(nonce)
            .map_err(|_| VeracodeError::Authentication(INVALID_NONCE_MSG.to_string()))?;

        // Key chain: key -> nonce -> timestamp -> version string, then sign the data
        let hashed_nonce = hmac_sha256(&key_bytes, &nonce_bytes)?;
        let hashed_timestamp = hmac_sha256(&hashed_nonce, timestamp.to_string().as_bytes())?;
        let hashed_ver_str = hmac_sha256(&hashed_timestamp, SIGNING_VERSION.as_bytes())?;
        let signature = hmac_sha256(&hashed_ver_str, data.as_bytes())?;

        Ok(hex::encode(signature))
    }

    /// Generate authorization header for HMAC authentication
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed, the API key is not hex,
    /// or the system clock is before the Unix epoch.
    pub fn generate_auth_header(&self, method: &str, url: &str) -> Result<String, VeracodeError> {
        #[allow(clippy::cast_possible_truncation)]
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| VeracodeError::Authentication(format!("System time error: {e}")))?
            .as_millis() as u64;

        let nonce_bytes: [u8; 16] = rand::random();
        let nonce = hex::encode(nonce_bytes);

        let signature = self.generate_hmac_signature(method, url, timestamp, &nonce)?;

        Ok(format!(
            "{AUTH_SCHEME} id={},ts={},nonce={},sig={}",
            self.config.credentials.expose_api_id(),
            timestamp,
            nonce,
            signature
        ))
    }

    /// Build a full URL from the base URL, an endpoint and optional query parameters
    fn build_url(&self, endpoint: &str, query_params: &[(&str, String)]) -> String {
        let estimated_capacity = self
            .config
            .base_url
            .len()
            .saturating_add(endpoint.len())
            .saturating_add(query_params.len().saturating_mul(32));

        let mut url = String::with_capacity(estimated_capacity);
        url.push_str(&self.config.base_url);
        url.push_str(endpoint);

        for (i, (key, value)) in query_params.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(&urlencoding::encode(key));
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }

        url
    }

    /// Make a GET request to the specified endpoint.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - The API endpoint path (e.g., "/appsec/v1/analytics/report/{id}")
    /// * `query_params` - Query parameters as key-value pairs (may be empty)
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails or the request fails after all retries.
    pub async fn get(
        &self,
        endpoint: &str,
        query_params: &[(&str, String)],
    ) -> Result<reqwest::Response, VeracodeError> {
        let url = self.build_url(endpoint, query_params);
        debug!("GET {url}");

        // Re-generate auth header for each attempt to avoid signature expiry
        let request_builder = || {
            let auth_header = self.generate_auth_header("GET", &url)?;
            Ok(self
                .client
                .get(&url)
                .header("Authorization", auth_header)
                .header("Content-Type", "application/json"))
        };

        self.execute_with_retry(request_builder, operation_name("GET", endpoint))
            .await
    }

    /// Make a POST request to the specified endpoint.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - The API endpoint path (e.g., "/appsec/v1/analytics/report")
    /// * `body` - Optional request body that implements Serialize
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be serialized, signing fails, or the
    /// request fails after all retries.
    pub async fn post<T: Serialize>(
        &self,
        endpoint: &str,
        body: Option<&T>,
    ) -> Result<reqwest::Response, VeracodeError> {
        let url = self.build_url(endpoint, &[]);
        debug!("POST {url}");

        // Serialize body once outside the retry loop
        let serialized_body = body.map(serde_json::to_string).transpose()?;

        let request_builder = || {
            let auth_header = self.generate_auth_header("POST", &url)?;
            let mut request = self
                .client
                .post(&url)
                .header("Authorization", auth_header)
                .header("Content-Type", "application/json");

            if let Some(ref body_str) = serialized_body {
                request = request.body(body_str.clone());
            }

            Ok(request)
        };

        self.execute_with_retry(request_builder, operation_name("POST", endpoint))
            .await
    }

    /// Checks if the response is successful and returns an error carrying the
    /// operation context, URL, status and body if not.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for HTTP 404, `Authentication` for 401/403 and
    /// `InvalidResponse` for any other non-success status.
    pub async fn handle_response(
        response: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response, VeracodeError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().clone();
        let error_text = response.text().await.unwrap_or_default();
        let message = format!("Failed to {context}\n  URL: {url}\n  HTTP {status}: {error_text}");

        Err(match status.as_u16() {
            404 => VeracodeError::NotFound(message),
            401 | 403 => VeracodeError::Authentication(message),
            _ => VeracodeError::InvalidResponse(message),
        })
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, VeracodeError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| VeracodeError::Authentication(HMAC_CREATION_FAILED_MSG.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Log line for a response that needed more than one attempt
fn retried_response_log(
    operation_name: &str,
    attempt: u32,
    status: StatusCode,
) -> Option<(Level, String)> {
    if attempt <= 1 {
        return None;
    }
    if status.is_success() {
        Some((
            Level::Info,
            format!("✅ {operation_name} succeeded on attempt {attempt}"),
        ))
    } else {
        Some((
            Level::Warn,
            format!("❌ {operation_name} still failing after {attempt} attempts: HTTP {status}"),
        ))
    }
}

fn operation_name<'a>(method: &str, endpoint: &'a str) -> Cow<'a, str> {
    if endpoint.len() < 50 {
        Cow::Owned(format!("{method} {endpoint}"))
    } else {
        Cow::Borrowed("request [long endpoint]")
    }
}
