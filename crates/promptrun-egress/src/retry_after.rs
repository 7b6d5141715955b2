//! Retry-After header parsing
//!
//! Adapters never retry. The header is parsed only so that a rate-limit error
//! can tell the caller how long the provider asked it to wait.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use tracing::debug;

/// Parse a `retry-after` value given either as seconds or as an HTTP date
///
/// Dates in the past yield `Some(0)`.
///
/// ```
/// use promptrun_egress::parse_retry_after;
///
/// assert_eq!(parse_retry_after("30"), Some(30));
/// assert_eq!(parse_retry_after("soon"), None);
/// ```
pub fn parse_retry_after(header_value: &str) -> Option<u64> {
    let trimmed = header_value.trim();

    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Some(seconds);
    }

    match chrono::DateTime::parse_from_rfc2822(trimmed) {
        Ok(target_time) => {
            let seconds = target_time
                .signed_duration_since(chrono::Utc::now())
                .num_seconds();
            Some(seconds.max(0) as u64)
        }
        Err(_) => {
            debug!(header_value, "Ignoring unparseable retry-after header");
            None
        }
    }
}

/// Read and parse the `retry-after` header of a response
pub(crate) fn retry_after_from_headers(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_retry_after)
}
