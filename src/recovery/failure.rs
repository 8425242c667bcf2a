//! Failure values operations return, and the typed error the retry loop
//! surfaces

use crate::recovery::category::{self, ErrorCategory};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

type Source = Arc<dyn StdError + Send + Sync>;

/// Error value returned by operations run under the throttler, the retry
/// loop or a circuit breaker
///
/// Carries the signals classification looks at (code, HTTP status,
/// message) plus any recovery hints the operation can offer.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct Failure {
    pub message: String,
    /// System-style error code such as `ECONNREFUSED`
    pub code: Option<String>,
    pub status: Option<u16>,
    /// Raw `Retry-After` value
    pub retry_after: Option<String>,
    /// Fields that failed validation
    pub invalid_fields: Vec<String>,
    /// Data salvaged before the failure
    pub partial: Option<serde_json::Value>,
    #[source]
    source: Option<Source>,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            status: None,
            retry_after: None,
            invalid_fields: Vec::new(),
            partial: None,
            source: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }

    pub fn with_invalid_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invalid_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_partial(mut self, partial: serde_json::Value) -> Self {
        self.partial = Some(partial);
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn category(&self) -> ErrorCategory {
        category::classify(self)
    }

    /// HTTP 429 or a rate-limit marker in the code or message
    pub fn is_rate_limit(&self) -> bool {
        category::is_rate_limit(self)
    }

    /// The failure and every underlying cause, one per line
    pub fn chain(&self) -> String {
        let mut rendered = self.message.clone();
        let mut current = StdError::source(self);
        while let Some(cause) = current {
            rendered.push_str("\ncaused by: ");
            rendered.push_str(&cause.to_string());
            current = cause.source();
        }
        rendered
    }
}

/// Machine-readable code of a `ScraperError`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The operation failed with a non-retryable failure of this category
    Category(ErrorCategory),
    /// Every attempt failed
    MaxRetriesExceeded,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category(category) => write!(f, "{}", category),
            Self::MaxRetriesExceeded => write!(f, "max_retries_exceeded"),
        }
    }
}

/// Context attached to a `ScraperError`
#[derive(Debug, Clone, Error)]
#[error("{category} failure after {attempts} attempt(s)")]
pub struct ErrorDetails {
    /// The failure that ended the retry loop
    #[source]
    pub original: Failure,
    /// Category of `original`
    pub category: ErrorCategory,
    /// Attempts made, including the last one
    pub attempts: u32,
    /// The resource can be skipped rather than alarmed on
    pub skip: bool,
    pub fatal: bool,
    pub invalid_fields: Vec<String>,
    pub partial: Option<serde_json::Value>,
}

/// Typed error surfaced by `ErrorHandler::retry_with_backoff`
///
/// Branch on `code` rather than on the message.
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message}")]
pub struct ScraperError {
    pub message: String,
    pub code: ErrorCode,
    #[source]
    pub details: ErrorDetails,
}

impl ScraperError {
    pub fn category(&self) -> ErrorCategory {
        self.details.category
    }

    pub fn is_skippable(&self) -> bool {
        self.details.skip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let failure = Failure::new("bad payload")
            .with_code("PARSE_ERROR")
            .with_status(200)
            .with_invalid_fields(["email", "phone"])
            .with_partial(json!({"name": "Acme"}));

        assert_eq!(failure.to_string(), "bad payload");
        assert_eq!(failure.code.as_deref(), Some("PARSE_ERROR"));
        assert_eq!(failure.status, Some(200));
        assert_eq!(failure.invalid_fields, vec!["email", "phone"]);
        assert_eq!(failure.partial, Some(json!({"name": "Acme"})));
        assert_eq!(failure.category(), ErrorCategory::Parsing);
    }

    #[test]
    fn test_chain_renders_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused by peer");
        let failure = Failure::new("connect failed").with_source(io);

        assert!(failure.source().is_some());
        assert_eq!(failure.chain(), "connect failed\ncaused by: refused by peer");
    }

    #[test]
    fn test_scraper_error_display_and_source() {
        let original = Failure::new("HTTP 404").with_status(404);
        let error = ScraperError {
            message: "HTTP 404".to_string(),
            code: ErrorCode::Category(ErrorCategory::NotFound),
            details: ErrorDetails {
                original: original.clone(),
                category: ErrorCategory::NotFound,
                attempts: 1,
                skip: true,
                fatal: false,
                invalid_fields: Vec::new(),
                partial: None,
            },
        };

        assert_eq!(error.to_string(), "[not_found] HTTP 404");
        assert!(error.is_skippable());
        let details = error.source().expect("details are the source");
        assert_eq!(details.to_string(), "not_found failure after 1 attempt(s)");
        assert_eq!(
            details.source().map(|s| s.to_string()),
            Some("HTTP 404".to_string())
        );
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::MaxRetriesExceeded.to_string(), "max_retries_exceeded");
        assert_eq!(
            ErrorCode::Category(ErrorCategory::Auth).to_string(),
            "auth"
        );
    }
}
