// Typed rate-limit signal, built from whatever the upstream response tells us
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;

/// Raised when a hosting backend refuses a request because of rate limiting.
///
/// Every refinement is optional: a bare `RateLimitError` is still enough for
/// callers to back off, they just fall back to their default delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitError {
    /// Provider tag that returned the limit ("github", "gitlab", ...)
    pub provider: String,
    /// Message or body returned by the API
    pub message: String,
    /// Explicit delay from a `Retry-After` header
    pub retry_after: Option<Duration>,
    /// Requests allowed per window
    pub limit: Option<u64>,
    /// Requests left in the current window
    pub remaining: Option<u64>,
    /// When the window resets
    pub reset_time: Option<DateTime<Utc>>,
}

impl RateLimitError {
    pub fn new(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            message: message.into(),
            retry_after: None,
            limit: None,
            remaining: None,
            reset_time: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn with_reset_time(mut self, reset_time: DateTime<Utc>) -> Self {
        self.reset_time = Some(reset_time);
        self
    }

    pub fn with_rate_limit_info(mut self, limit: u64, remaining: u64) -> Self {
        self.limit = Some(limit);
        self.remaining = Some(remaining);
        self
    }

    /// Build the signal from a refused response.
    ///
    /// Understands both GitHub's `X-RateLimit-*` headers and the unprefixed
    /// `RateLimit-*` family GitLab sends, plus `Retry-After` in seconds.
    /// Headers that are missing or unparsable are simply skipped.
    pub fn from_headers(provider: impl Into<String>, headers: &HeaderMap, body: &str) -> Self {
        let mut err = Self::new(provider, body.trim());

        let limit = header_u64(headers, &["x-ratelimit-limit", "ratelimit-limit"]);
        if let Some(limit) = limit {
            let remaining =
                header_u64(headers, &["x-ratelimit-remaining", "ratelimit-remaining"]).unwrap_or(0);
            err = err.with_rate_limit_info(limit, remaining);
        }

        if let Some(reset) = header_u64(headers, &["x-ratelimit-reset", "ratelimit-reset"]) {
            if let Some(reset_time) = i64::try_from(reset)
                .ok()
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            {
                err = err.with_reset_time(reset_time);
            }
        }

        if let Some(seconds) = header_u64(headers, &["retry-after"]) {
            err = err.with_retry_after(Duration::from_secs(seconds));
        }

        err
    }
}

fn header_u64(headers: &HeaderMap, names: &[&str]) -> Option<u64> {
    names.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    })
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} API rate limit exceeded: {}", self.provider, self.message)?;
        if let Some(retry_after) = self.retry_after.filter(|d| !d.is_zero()) {
            write!(f, " (retry after {}s)", retry_after.as_secs())
        } else if let Some(reset_time) = self.reset_time {
            write!(f, " (resets at {})", reset_time.to_rfc3339())
        } else {
            Ok(())
        }
    }
}

impl std::error::Error for RateLimitError {}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_from_github_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("5000"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1735732800"));
        headers.insert("retry-after", HeaderValue::from_static("120"));

        let err = RateLimitError::from_headers("github", &headers, "API rate limit exceeded");

        assert_eq!(err.limit, Some(5000));
        assert_eq!(err.remaining, Some(0));
        assert_eq!(err.retry_after, Some(Duration::from_secs(120)));
        assert_eq!(err.reset_time.map(|t| t.timestamp()), Some(1_735_732_800));
    }

    #[test]
    fn test_from_gitlab_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("ratelimit-limit", HeaderValue::from_static("600"));
        headers.insert("ratelimit-remaining", HeaderValue::from_static("3"));

        let err = RateLimitError::from_headers("gitlab", &headers, "Retry later");

        assert_eq!(err.limit, Some(600));
        assert_eq!(err.remaining, Some(3));
        assert_eq!(err.retry_after, None);
        assert_eq!(err.reset_time, None);
    }

    #[test]
    fn test_missing_or_garbage_headers_dont_fail() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("soon"));

        let err = RateLimitError::from_headers("github", &headers, "");

        assert_eq!(err.retry_after, None);
        assert_eq!(err.reset_time, None);
        assert_eq!(err.limit, None);
    }

    #[test]
    fn test_display() {
        let plain = RateLimitError::new("github", "rate limit exceeded");
        assert_eq!(plain.to_string(), "github API rate limit exceeded: rate limit exceeded");

        let with_retry = plain.clone().with_retry_after(Duration::from_secs(300));
        assert!(with_retry.to_string().contains("retry after 300s"));

        let reset = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let with_reset = plain.with_reset_time(reset);
        assert!(with_reset.to_string().contains("resets at 2025-01-01T12:00:00"));
    }
}
