//! Retry delay helpers for fetch tiers.
//!
//! Exponential backoff with a ceiling, plus Retry-After header parsing.

use std::time::Duration;

/// Default base delay for the first retry (milliseconds).
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;

/// Default ceiling for any single backoff delay (milliseconds).
pub const DEFAULT_BACKOFF_CAP_MS: u64 = 10_000;

/// Maximum honoured Retry-After value (seconds).
const MAX_RETRY_AFTER_SECS: u64 = 60;

/// Delay before retry number `attempt` (1-based): `min(base * 2^(attempt-1), cap)`.
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    let factor = 2u32.pow(exponent);
    base.checked_mul(factor).unwrap_or(cap).min(cap)
}

/// Parse Retry-After header value (seconds).
/// Returns duration to wait, or None if header is missing/invalid.
pub fn parse_retry_after(header_value: Option<&str>) -> Option<Duration> {
    let value = header_value?.trim();
    let secs = value.parse::<u64>().ok()?;
    Some(Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_backoff_delay() {
        let base = ms(DEFAULT_BACKOFF_BASE_MS);
        let cap = ms(DEFAULT_BACKOFF_CAP_MS);
        assert_eq!(backoff_delay(1, base, cap), ms(1000));
        assert_eq!(backoff_delay(2, base, cap), ms(2000));
        assert_eq!(backoff_delay(3, base, cap), ms(4000));
        assert_eq!(backoff_delay(4, base, cap), ms(8000));
        assert_eq!(backoff_delay(5, base, cap), ms(10_000)); // capped
        assert_eq!(backoff_delay(40, base, cap), ms(10_000)); // capped
    }

    #[test]
    fn test_backoff_attempt_zero_uses_base() {
        assert_eq!(backoff_delay(0, ms(250), ms(10_000)), ms(250));
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after(Some("5")), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(Some(" 0 ")), Some(Duration::from_secs(0)));
        assert_eq!(parse_retry_after(Some("100")), Some(Duration::from_secs(60))); // capped
    }

    #[test]
    fn test_parse_retry_after_invalid() {
        assert_eq!(parse_retry_after(None), None);
        assert_eq!(parse_retry_after(Some("invalid")), None);
    }
}
