//! promptrun egress connectors
//!
//! This crate provides the provider call adapters and the response normalizer:
//! - OpenAI chat completions, responses and assistants connectors
//! - Anthropic messages connector
//! - A mock client that fabricates responses without network access
//! - `normalize`, which turns any raw provider response into a `NormalizedResponse`

pub mod adapter;
pub mod anthropic;
pub mod assistants;
pub mod client;
pub mod mock;
pub mod normalize;
pub mod openai;
pub mod responses;
pub mod retry_after;

pub use adapter::{ProviderAdapter, ProviderEndpoints};
pub use normalize::normalize;
pub use retry_after::parse_retry_after;

use thiserror::Error;

/// Errors raised while talking to a provider
#[derive(Debug, Error)]
pub enum EgressError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Provider error ({status_code}): {message}")]
    ProviderError { status_code: u16, message: String },

    #[error("Rate limit exceeded{}", retry_after_secs.map(|s| format!(": retry after {}s", s)).unwrap_or_default())]
    RateLimitExceeded { retry_after_secs: Option<u64> },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Run {run_id} ended with status '{status}': {message}")]
    RunFailed {
        run_id: String,
        status: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, EgressError>;

impl From<EgressError> for promptrun_core::Error {
    fn from(err: EgressError) -> Self {
        match err {
            EgressError::HttpError(e) if e.is_timeout() => {
                promptrun_core::Error::Timeout(e.to_string())
            }
            EgressError::HttpError(e) => promptrun_core::Error::Provider(e.to_string()),
            EgressError::ProviderError {
                status_code,
                message,
            } => promptrun_core::Error::ProviderStatus {
                status_code,
                message,
            },
            EgressError::RateLimitExceeded { retry_after_secs } => {
                promptrun_core::Error::RateLimitExceeded { retry_after_secs }
            }
            EgressError::ParseError(msg) => {
                promptrun_core::Error::Provider(format!("malformed payload: {}", msg))
            }
            EgressError::ConfigError(msg) => promptrun_core::Error::Config(msg),
            EgressError::Timeout(msg) => promptrun_core::Error::Timeout(msg),
            err @ EgressError::RunFailed { .. } => promptrun_core::Error::Provider(err.to_string()),
        }
    }
}
