//! Shared HTTP client utilities

use crate::{EgressError, Result, retry_after::retry_after_from_headers};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Maximum number of idle connections per host
    pub pool_max_idle_per_host: usize,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            connect_timeout_secs: 10,
            pool_max_idle_per_host: 8,
            user_agent: format!("promptrun/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Create a configured HTTP client
pub fn create_client(config: &HttpClientConfig) -> Result<Client> {
    ClientBuilder::new()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        // Providers drop idle connections after 60-120s
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(&config.user_agent)
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .map_err(|e| EgressError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Log response status and headers at debug level
pub(crate) fn log_response_headers(label: &str, response: &reqwest::Response) {
    debug!("┌─────────────────────────────────────────────────────────");
    debug!("│ {} Response Headers", label);
    debug!("├─────────────────────────────────────────────────────────");
    debug!("│ Status: {}", response.status());
    for (name, value) in response.headers() {
        if let Ok(val_str) = value.to_str() {
            debug!("│ {}: {}", name, val_str);
        }
    }
    debug!("└─────────────────────────────────────────────────────────");
}

/// Parse a successful response body into a typed payload
pub(crate) fn parse_body<T: DeserializeOwned>(body: &str, provider: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| EgressError::ParseError(format!("Failed to parse {} response: {}", provider, e)))
}

// Helper trait for turning provider responses into bodies or typed errors
#[async_trait]
pub(crate) trait ProviderResponseHandler {
    async fn provider_body(self, provider: &str) -> Result<String>;
}

#[async_trait]
impl ProviderResponseHandler for reqwest::Response {
    async fn provider_body(self, provider: &str) -> Result<String> {
        let status = self.status();

        if !status.is_success() {
            let status_code = status.as_u16();
            let retry_after_secs = retry_after_from_headers(self.headers());
            let body = self
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());

            debug!(provider, status_code, "Provider returned an error status");

            return Err(if status_code == 429 {
                EgressError::RateLimitExceeded { retry_after_secs }
            } else {
                EgressError::ProviderError {
                    status_code,
                    message: body,
                }
            });
        }

        Ok(self.text().await?)
    }
}
