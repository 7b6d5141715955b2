//! Error types for promptrun core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Missing or inconsistent engine/provider configuration. Never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider returned status {status_code}: {message}")]
    ProviderStatus { status_code: u16, message: String },

    #[error("Rate limit exceeded{}", retry_after_secs.map(|s| format!(": retry after {}s", s)).unwrap_or_default())]
    RateLimitExceeded { retry_after_secs: Option<u64> },

    #[error("Provider call timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors raised before any provider call was attempted.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// True for failures of the provider call itself (network, auth, payload).
    pub fn is_provider(&self) -> bool {
        matches!(
            self,
            Error::Provider(_)
                | Error::ProviderStatus { .. }
                | Error::RateLimitExceeded { .. }
                | Error::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_display() {
        let err = Error::RateLimitExceeded {
            retry_after_secs: Some(30),
        };
        assert_eq!(err.to_string(), "Rate limit exceeded: retry after 30s");

        let err = Error::RateLimitExceeded {
            retry_after_secs: None,
        };
        assert_eq!(err.to_string(), "Rate limit exceeded");
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::Config("missing".into()).is_config());
        assert!(!Error::Config("missing".into()).is_provider());
        assert!(
            Error::ProviderStatus {
                status_code: 401,
                message: "bad key".into()
            }
            .is_provider()
        );
        assert!(Error::Timeout("run".into()).is_provider());
        assert!(!Error::Internal("x".into()).is_provider());
    }
}
