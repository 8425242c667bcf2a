//! Sumi-Sift: scraping support toolkit
//!
//! This crate provides the three building blocks a scraping pipeline leans on:
//! an adaptive per-identifier rate limiter, a retry/circuit-breaker error
//! handler, and an HTML contact/company data extractor. The components do
//! not depend on each other; callers compose them.

pub mod config;
pub mod extract;
pub mod http;
pub mod recovery;
pub mod throttle;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Main error type for Sumi-Sift operations
#[derive(Debug, Error)]
pub enum SiftError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Identifier {identifier} is blocked until {until}")]
    Blocked {
        identifier: String,
        until: DateTime<Utc>,
    },

    #[error("Rate limiter shut down before admitting {identifier}")]
    LimiterClosed { identifier: String },

    #[error("Operation failed: {0}")]
    Operation(#[from] recovery::Failure),

    #[error(transparent)]
    Scraper(#[from] recovery::ScraperError),

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for Sumi-Sift operations
pub type Result<T> = std::result::Result<T, SiftError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use extract::{extract_from_html, DataExtractor, ExtractOptions, ExtractedRecord};
pub use recovery::{
    CircuitBreaker, CircuitState, ErrorCategory, ErrorHandler, Failure, RetryContext,
    ScraperError,
};
pub use throttle::{LimitType, RateCeiling, RateLimiter, SmartThrottler};
