use chrono::{DateTime, Utc};
use std::time::Duration;

/// Parses a `Retry-After` value into a wait duration
///
/// Accepts delay-seconds (`"120"`, `"1.5"`) and HTTP-dates
/// (`"Wed, 21 Oct 2015 07:28:00 GMT"`). Dates in the past yield zero.
///
/// # Arguments
///
/// * `value` - The raw header value
/// * `now` - The current wall-clock time, used for HTTP-dates
///
/// # Returns
///
/// * `Some(Duration)` - The requested wait
/// * `None` - The value is empty, negative or unparseable
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(seconds) = value.parse::<f64>() {
        if seconds < 0.0 {
            return None;
        }
        return Duration::try_from_secs_f64(seconds).ok();
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let remaining = date.with_timezone(&Utc) - now;
    Some(remaining.to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 0).unwrap()
    }

    #[test]
    fn test_integer_seconds() {
        assert_eq!(
            parse_retry_after("2", fixed_now()),
            Some(Duration::from_secs(2))
        );
        assert_eq!(
            parse_retry_after(" 120 ", fixed_now()),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn test_fractional_seconds() {
        assert_eq!(
            parse_retry_after("1.5", fixed_now()),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_http_date() {
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", fixed_now()),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_http_date_in_past_is_zero() {
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", fixed_now()),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(parse_retry_after("", fixed_now()), None);
        assert_eq!(parse_retry_after("-5", fixed_now()), None);
        assert_eq!(parse_retry_after("soon", fixed_now()), None);
        assert_eq!(parse_retry_after("NaN", fixed_now()), None);
    }
}
