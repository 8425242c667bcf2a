use crate::config::types::{
    AdaptiveConfig, BreakerConfig, Config, ExtractorConfig, RetryConfig, ThrottleConfig,
};
use crate::throttle::RateCeiling;
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_throttle_config(&config.throttle)?;
    validate_adaptive_config(&config.adaptive)?;
    validate_retry_config(&config.retry)?;
    validate_breaker_config(&config.circuit_breaker)?;
    validate_extractor_config(&config.extractor)?;
    Ok(())
}

/// Validates the global ceiling and every override
fn validate_throttle_config(config: &ThrottleConfig) -> Result<(), ConfigError> {
    validate_ceiling("throttle.global", &config.global)?;

    for entry in &config.domain {
        validate_name("throttle.domain", &entry.domain)?;
        validate_ceiling(&format!("throttle.domain '{}'", entry.domain), &entry.ceiling)?;
    }

    for entry in &config.api {
        validate_name("throttle.api", &entry.service)?;
        validate_ceiling(&format!("throttle.api '{}'", entry.service), &entry.ceiling)?;
    }

    Ok(())
}

fn validate_ceiling(scope: &str, ceiling: &RateCeiling) -> Result<(), ConfigError> {
    if ceiling.requests < 1 {
        return Err(ConfigError::Validation(format!(
            "{}: requests must be >= 1, got {}",
            scope, ceiling.requests
        )));
    }

    if ceiling.per_seconds < 1 {
        return Err(ConfigError::Validation(format!(
            "{}: per-seconds must be >= 1, got {}",
            scope, ceiling.per_seconds
        )));
    }

    if ceiling.burst < 1 {
        return Err(ConfigError::Validation(format!(
            "{}: burst must be >= 1, got {}",
            scope, ceiling.burst
        )));
    }

    Ok(())
}

fn validate_name(scope: &str, name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "{}: name cannot be empty",
            scope
        )));
    }
    Ok(())
}

/// Validates adaptive throttling thresholds
fn validate_adaptive_config(config: &AdaptiveConfig) -> Result<(), ConfigError> {
    for (name, ratio) in [
        ("increase-success-rate", config.increase_success_rate),
        ("cycle-success-rate", config.cycle_success_rate),
        ("slow-ratio", config.slow_ratio),
    ] {
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(ConfigError::Validation(format!(
                "adaptive.{} must be in (0, 1], got {}",
                name, ratio
            )));
        }
    }

    if config.max_block_ms < config.default_block_ms {
        return Err(ConfigError::Validation(format!(
            "adaptive.max-block-ms ({}) must be >= default-block-ms ({})",
            config.max_block_ms, config.default_block_ms
        )));
    }

    if config.adjustment_interval_ms < 1_000 {
        return Err(ConfigError::Validation(format!(
            "adaptive.adjustment-interval-ms must be >= 1000ms, got {}ms",
            config.adjustment_interval_ms
        )));
    }

    if config.max_requests < 1 {
        return Err(ConfigError::Validation(
            "adaptive.max-requests must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the retry policy
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "retry.max-retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.max_backoff_delay_ms < config.retry_delay_ms {
        return Err(ConfigError::Validation(format!(
            "retry.max-backoff-delay-ms ({}) must be >= retry-delay-ms ({})",
            config.max_backoff_delay_ms, config.retry_delay_ms
        )));
    }

    Ok(())
}

/// Validates circuit breaker thresholds
fn validate_breaker_config(config: &BreakerConfig) -> Result<(), ConfigError> {
    if config.threshold < 1 {
        return Err(ConfigError::Validation(format!(
            "circuit-breaker.threshold must be >= 1, got {}",
            config.threshold
        )));
    }

    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "circuit-breaker.timeout-ms must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates extractor limits and placeholder domains
fn validate_extractor_config(config: &ExtractorConfig) -> Result<(), ConfigError> {
    for domain in &config.placeholder_domains {
        if domain.is_empty() || !domain.contains('.') || domain.contains('@') {
            return Err(ConfigError::Validation(format!(
                "extractor.placeholder-domains entry '{}' is not a domain",
                domain
            )));
        }
    }
    Ok(())
}
