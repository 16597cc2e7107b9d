// Rate-limit detection and retry-delay computation
//
// Hosting backends report rate limiting either as a structured response we
// turn into a `RateLimitError`, or as an opaque error string somewhere down a
// wrapped chain. Both have to be caught.
use std::error::Error as StdError;
use std::time::Duration;

use chrono::{DateTime, Utc};

pub use scorecard_api::RateLimitError;

/// Used whenever we know we're rate limited but not for how long
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5 * 60);

const RATE_LIMIT_INDICATORS: &[&str] = &[
    "rate limit",
    "rate-limit",
    "ratelimit",
    "too many requests",
    "429",
    "quota exceeded",
    "api rate limit exceeded",
];

/// Is this error (or anything it wraps) a rate limit?
pub fn is_rate_limit(err: Option<&(dyn StdError + 'static)>) -> bool {
    let Some(err) = err else {
        return false;
    };

    if find_rate_limit(err).is_some() {
        return true;
    }

    chain(err).any(|e| {
        let message = e.to_string().to_lowercase();
        RATE_LIMIT_INDICATORS
            .iter()
            .any(|indicator| message.contains(indicator))
    })
}

/// How long to wait before trying again.
///
/// Zero only for `None`. Any real error gets at least the default, so
/// callers never end up in a hot retry loop.
pub fn retry_delay(err: Option<&(dyn StdError + 'static)>) -> Duration {
    retry_delay_at(err, Utc::now())
}

/// `retry_delay` against an explicit clock
pub fn retry_delay_at(err: Option<&(dyn StdError + 'static)>, now: DateTime<Utc>) -> Duration {
    let Some(err) = err else {
        return Duration::ZERO;
    };

    let Some(signal) = find_rate_limit(err) else {
        return DEFAULT_RETRY_DELAY;
    };

    if let Some(retry_after) = signal.retry_after.filter(|d| !d.is_zero()) {
        return retry_after;
    }

    signal
        .reset_time
        .and_then(|reset| (reset - now).to_std().ok())
        .filter(|d| !d.is_zero())
        .unwrap_or(DEFAULT_RETRY_DELAY)
}

/// First typed rate-limit signal in the error's source chain
pub fn find_rate_limit<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a RateLimitError> {
    chain(err).find_map(|e| e.downcast_ref::<RateLimitError>())
}

fn chain<'a>(err: &'a (dyn StdError + 'static)) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[derive(Debug, thiserror::Error)]
    #[error("API error: {0}")]
    struct Wrapped(#[source] RateLimitError);

    #[derive(Debug, thiserror::Error)]
    #[error("listing failed")]
    struct Opaque(#[source] std::io::Error);

    fn dyn_err<'a>(e: &'a (dyn StdError + 'static)) -> Option<&'a (dyn StdError + 'static)> {
        Some(e)
    }

    #[test]
    fn test_none_is_not_rate_limit() {
        assert!(!is_rate_limit(None));
        assert_eq!(retry_delay(None), Duration::ZERO);
    }

    #[test]
    fn test_typed_signal_detected() {
        let err = RateLimitError::new("github", "slow down");
        assert!(is_rate_limit(dyn_err(&err)));
    }

    #[test]
    fn test_wrapped_typed_signal_detected() {
        let err = Wrapped(RateLimitError::new("github", "x"));
        assert!(is_rate_limit(dyn_err(&err)));
        assert!(find_rate_limit(&err).is_some());
    }

    #[test]
    fn test_message_indicators() {
        let hits = [
            "API rate limit exceeded",
            "API returned status 429: nope",
            "Too Many Requests, please try again later",
            "quota exceeded for this resource",
            "X-RateLimit hit",
        ];
        for msg in hits {
            let err = Error::ApiError(msg.to_string());
            assert!(is_rate_limit(dyn_err(&err)), "expected rate limit for {msg:?}");
        }

        for msg in ["connection timeout", "invalid credentials"] {
            let err = Error::ApiError(msg.to_string());
            assert!(!is_rate_limit(dyn_err(&err)), "unexpected rate limit for {msg:?}");
        }
    }

    #[test]
    fn test_message_found_deeper_in_chain() {
        let err = Opaque(std::io::Error::other("HTTP 429"));
        assert!(is_rate_limit(dyn_err(&err)));
    }

    #[test]
    fn test_explicit_retry_after_wins() {
        let now = Utc::now();
        let err = RateLimitError::new("github", "x")
            .with_retry_after(Duration::from_secs(600))
            .with_reset_time(now + chrono::Duration::minutes(30));
        assert_eq!(retry_delay_at(dyn_err(&err), now), Duration::from_secs(600));
    }

    #[test]
    fn test_future_reset_time() {
        let now = Utc::now();
        let err = RateLimitError::new("github", "x").with_reset_time(now + chrono::Duration::minutes(15));
        assert_eq!(retry_delay_at(dyn_err(&err), now), Duration::from_secs(15 * 60));

        // Against the real clock it's within a small tolerance
        let live = retry_delay(dyn_err(&err));
        assert!(live <= Duration::from_secs(15 * 60));
        assert!(live > Duration::from_secs(15 * 60 - 5));
    }

    #[test]
    fn test_past_reset_time_uses_default() {
        let now = Utc::now();
        let err = RateLimitError::new("github", "x").with_reset_time(now - chrono::Duration::minutes(5));
        assert_eq!(retry_delay_at(dyn_err(&err), now), DEFAULT_RETRY_DELAY);
    }

    #[test]
    fn test_no_timing_info_uses_default() {
        let err = RateLimitError::new("github", "x");
        assert_eq!(retry_delay(dyn_err(&err)), DEFAULT_RETRY_DELAY);
    }

    #[test]
    fn test_non_rate_limit_error_still_gets_default() {
        let err = Error::ApiError("some other error".into());
        assert_eq!(retry_delay(dyn_err(&err)), DEFAULT_RETRY_DELAY);
    }

    #[test]
    fn test_zero_retry_after_falls_through() {
        let err = RateLimitError::new("github", "x").with_retry_after(Duration::ZERO);
        assert_eq!(retry_delay(dyn_err(&err)), DEFAULT_RETRY_DELAY);
    }
}
