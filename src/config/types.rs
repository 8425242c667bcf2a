use crate::throttle::RateCeiling;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Sumi-Sift
///
/// Every section is optional; missing sections fall back to their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub adaptive: AdaptiveConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default, rename = "circuit-breaker")]
    pub circuit_breaker: BreakerConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

/// Rate ceilings for the global, per-domain and per-API scopes
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    /// Ceiling applied to `LimitType::Global` and to unknown domains
    #[serde(default = "default_global_ceiling")]
    pub global: RateCeiling,

    /// Per-domain overrides
    #[serde(default)]
    pub domain: Vec<DomainLimit>,

    /// Per-external-service overrides (take precedence over built-in defaults)
    #[serde(default)]
    pub api: Vec<ApiLimit>,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global: default_global_ceiling(),
            domain: Vec::new(),
            api: Vec::new(),
        }
    }
}

fn default_global_ceiling() -> RateCeiling {
    RateCeiling::new(100, 60, 10)
}

/// Ceiling override for a single domain
#[derive(Debug, Clone, Deserialize)]
pub struct DomainLimit {
    /// Domain name (e.g., "linkedin.com")
    pub domain: String,

    #[serde(flatten)]
    pub ceiling: RateCeiling,
}

/// Ceiling override for a named external service
#[derive(Debug, Clone, Deserialize)]
pub struct ApiLimit {
    /// Service name (e.g., "apify", "github")
    pub service: String,

    #[serde(flatten)]
    pub ceiling: RateCeiling,
}

/// Adaptive throttling behaviour
///
/// The ratios are empirically chosen defaults and are meant to be tuned.
#[derive(Debug, Clone, Deserialize)]
pub struct AdaptiveConfig {
    /// Whether ceilings are re-evaluated after each throttled call
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Response time above which a success counts as slow (milliseconds)
    #[serde(default = "default_slow_response_ms", rename = "slow-response-ms")]
    pub slow_response_ms: u64,

    /// Block applied on a rate-limit failure without a retry-after hint (milliseconds)
    #[serde(default = "default_block_ms", rename = "default-block-ms")]
    pub default_block_ms: u64,

    /// Upper bound for any rate-limit block (milliseconds)
    #[serde(default = "default_max_block_ms", rename = "max-block-ms")]
    pub max_block_ms: u64,

    /// Period of the background adjustment cycle (milliseconds)
    #[serde(
        default = "default_adjustment_interval_ms",
        rename = "adjustment-interval-ms"
    )]
    pub adjustment_interval_ms: u64,

    /// Success rate above which a ceiling may be raised
    #[serde(default = "default_increase_success_rate", rename = "increase-success-rate")]
    pub increase_success_rate: f64,

    /// Success rate the periodic cycle requires before raising a ceiling
    #[serde(default = "default_cycle_success_rate", rename = "cycle-success-rate")]
    pub cycle_success_rate: f64,

    /// Share of slow successes above which a ceiling is lowered
    #[serde(default = "default_slow_ratio", rename = "slow-ratio")]
    pub slow_ratio: f64,

    /// Consecutive failures above which a ceiling is halved
    #[serde(default = "default_failure_streak", rename = "failure-streak")]
    pub failure_streak: u32,

    /// Minimum gap between two ratio-based adjustments of one lane (milliseconds)
    #[serde(
        default = "default_adjustment_cooldown_ms",
        rename = "adjustment-cooldown-ms"
    )]
    pub adjustment_cooldown_ms: u64,

    /// Calls required before the ratio-based rules apply
    #[serde(default = "default_min_samples", rename = "min-samples")]
    pub min_samples: u64,

    /// Largest value a raised ceiling may reach
    #[serde(default = "default_max_requests", rename = "max-requests")]
    pub max_requests: u32,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            slow_response_ms: default_slow_response_ms(),
            default_block_ms: default_block_ms(),
            max_block_ms: default_max_block_ms(),
            adjustment_interval_ms: default_adjustment_interval_ms(),
            increase_success_rate: default_increase_success_rate(),
            cycle_success_rate: default_cycle_success_rate(),
            slow_ratio: default_slow_ratio(),
            failure_streak: default_failure_streak(),
            adjustment_cooldown_ms: default_adjustment_cooldown_ms(),
            min_samples: default_min_samples(),
            max_requests: default_max_requests(),
        }
    }
}

impl AdaptiveConfig {
    pub fn slow_response(&self) -> Duration {
        Duration::from_millis(self.slow_response_ms)
    }

    pub fn default_block(&self) -> Duration {
        Duration::from_millis(self.default_block_ms)
    }

    pub fn max_block(&self) -> Duration {
        Duration::from_millis(self.max_block_ms)
    }

    pub fn adjustment_interval(&self) -> Duration {
        Duration::from_millis(self.adjustment_interval_ms)
    }

    pub fn adjustment_cooldown(&self) -> Duration {
        Duration::from_millis(self.adjustment_cooldown_ms)
    }
}

fn default_true() -> bool {
    true
}
fn default_slow_response_ms() -> u64 {
    5_000
}
fn default_block_ms() -> u64 {
    60_000
}
fn default_max_block_ms() -> u64 {
    300_000
}
fn default_adjustment_interval_ms() -> u64 {
    60_000
}
fn default_increase_success_rate() -> f64 {
    0.95
}
fn default_cycle_success_rate() -> f64 {
    0.99
}
fn default_slow_ratio() -> f64 {
    0.30
}
fn default_failure_streak() -> u32 {
    3
}
fn default_adjustment_cooldown_ms() -> u64 {
    10_000
}
fn default_min_samples() -> u64 {
    10
}
fn default_max_requests() -> u32 {
    1_000
}

/// Retry policy for the error handler
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per operation
    #[serde(default = "default_max_retries", rename = "max-retries")]
    pub max_retries: u32,

    /// Base delay between attempts (milliseconds)
    #[serde(default = "default_retry_delay_ms", rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Whether the delay doubles with each attempt
    #[serde(default = "default_true", rename = "exponential-backoff")]
    pub exponential_backoff: bool,

    /// Ceiling for any computed backoff (milliseconds)
    #[serde(default = "default_max_backoff_ms", rename = "max-backoff-delay-ms")]
    pub max_backoff_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            exponential_backoff: true,
            max_backoff_delay_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_backoff_delay(&self) -> Duration {
        Duration::from_millis(self.max_backoff_delay_ms)
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1_000
}
fn default_max_backoff_ms() -> u64 {
    30_000
}

/// Circuit breaker thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit
    #[serde(default = "default_threshold")]
    pub threshold: u32,

    /// Hard timeout for each guarded call (milliseconds)
    #[serde(default = "default_call_timeout_ms", rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Cool-down before an open circuit lets a probe through (milliseconds)
    #[serde(default = "default_reset_timeout_ms", rename = "reset-timeout-ms")]
    pub reset_timeout_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            timeout_ms: default_call_timeout_ms(),
            reset_timeout_ms: default_reset_timeout_ms(),
        }
    }
}

impl BreakerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

fn default_threshold() -> u32 {
    5
}
fn default_call_timeout_ms() -> u64 {
    30_000
}
fn default_reset_timeout_ms() -> u64 {
    60_000
}

/// Data extractor limits and pattern overrides
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractorConfig {
    /// Keep at most this many emails
    #[serde(default, rename = "max-emails")]
    pub max_emails: Option<usize>,

    /// Keep at most this many phone numbers
    #[serde(default, rename = "max-phones")]
    pub max_phones: Option<usize>,

    /// Keep at most this many profile URLs per social platform
    #[serde(default, rename = "max-social-per-platform")]
    pub max_social_per_platform: Option<usize>,

    /// Additional placeholder domains whose addresses are discarded
    #[serde(default, rename = "placeholder-domains")]
    pub placeholder_domains: Vec<String>,
}
