//! `reqwest` adapter
//!
//! Turns transport errors and unsuccessful responses into `Failure` values
//! carrying the code, status and `Retry-After` hint that classification and
//! throttling look at.

use crate::recovery::Failure;
use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};

impl Failure {
    /// Failure for an unsuccessful HTTP status
    pub fn from_status(status: StatusCode, retry_after: Option<&str>) -> Self {
        let message = match status.canonical_reason() {
            Some(reason) => format!("HTTP {} {}", status.as_u16(), reason),
            None => format!("HTTP {}", status.as_u16()),
        };

        let failure = Failure::new(message).with_status(status.as_u16());
        match retry_after {
            Some(value) => failure.with_retry_after(value.trim()),
            None => failure,
        }
    }
}

impl From<reqwest::Error> for Failure {
    fn from(error: reqwest::Error) -> Self {
        let code = if error.is_timeout() {
            Some("ETIMEDOUT")
        } else if error.is_connect() {
            Some("ECONNREFUSED")
        } else if error.is_decode() {
            Some("PARSE_ERROR")
        } else {
            None
        };
        let status = error.status();

        let mut failure = Failure::new(error.to_string());
        if let Some(code) = code {
            failure = failure.with_code(code);
        }
        if let Some(status) = status {
            failure = failure.with_status(status.as_u16());
        }
        failure.with_source(error)
    }
}

/// Passes successful responses through and turns the rest into failures
/// that keep the `Retry-After` header
pub fn error_for_status(response: Response) -> Result<Response, Failure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok());
    Err(Failure::from_status(status, retry_after))
}
