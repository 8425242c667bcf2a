//! Adaptive throttling on top of the rate limiter
//!
//! The smart throttler times every operation it admits and feeds the outcome
//! back into the lane's ceiling: rate-limit hits and failure streaks halve it,
//! fast and healthy traffic raises it, and a slow backend lowers it.

use crate::config::{AdaptiveConfig, Config};
use crate::recovery::Failure;
use crate::throttle::schedule::LaneKey;
use crate::throttle::{parse_retry_after, LimitType, RateCeiling, RateLimiter};
use crate::SiftError;
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Rolling outcome metrics for one lane
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentifierMetrics {
    pub successes: u64,
    pub failures: u64,
    pub total_response_time: Duration,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub rate_limit_hits: u64,
    pub slow_responses: u64,
    pub last_adjustment: Option<Instant>,
}

impl IdentifierMetrics {
    pub fn total(&self) -> u64 {
        self.successes + self.failures
    }

    pub fn success_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.successes as f64 / total as f64,
        }
    }

    /// Mean response time of successful calls
    pub fn average_response(&self) -> Duration {
        match self.successes {
            0 => Duration::ZERO,
            n => self.total_response_time / n.min(u32::MAX as u64) as u32,
        }
    }

    /// Share of successful calls that were slow
    pub fn slow_ratio(&self) -> f64 {
        match self.successes {
            0 => 0.0,
            n => self.slow_responses as f64 / n as f64,
        }
    }

    /// Starts a new rolling window, keeping the adjustment timestamp
    fn reset_window(&mut self) {
        *self = Self {
            last_adjustment: self.last_adjustment,
            ..Self::default()
        };
    }
}

/// Rate limiter wrapper that adapts ceilings to observed behaviour
#[derive(Debug)]
pub struct SmartThrottler {
    limiter: RateLimiter,
    config: AdaptiveConfig,
    metrics: Mutex<HashMap<LaneKey, IdentifierMetrics>>,
}

impl SmartThrottler {
    pub fn new(limiter: RateLimiter, config: AdaptiveConfig) -> Self {
        Self {
            limiter,
            config,
            metrics: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(RateLimiter::from_config(config), config.adaptive.clone())
    }

    /// The underlying limiter, for manual blocks and limit updates
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    /// Acquires admission, runs `operation`, and records its outcome
    ///
    /// A failure carrying a rate-limit signal blocks the identifier for the
    /// failure's retry-after hint (or the configured default), capped at the
    /// configured maximum.
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - The operation's value
    /// * `Err(SiftError::Blocked)` - The identifier is blocked; the operation did not run
    /// * `Err(SiftError::Operation)` - The operation failed
    pub async fn throttle<F, Fut, T>(
        &self,
        identifier: &str,
        kind: LimitType,
        operation: F,
    ) -> Result<T, SiftError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        self.limiter.acquire(identifier, kind).await?;

        let started = Instant::now();
        let outcome = operation().await;
        let elapsed = started.elapsed();

        let key = LaneKey::new(kind, identifier);
        let rate_limited = match &outcome {
            Ok(_) => {
                self.record_success(&key, elapsed);
                false
            }
            Err(failure) => self.record_failure(&key, failure),
        };

        if self.config.enabled {
            self.adjust(&key, rate_limited);
        }

        outcome.map_err(SiftError::from)
    }

    fn lock_metrics(&self) -> MutexGuard<'_, HashMap<LaneKey, IdentifierMetrics>> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_success(&self, key: &LaneKey, elapsed: Duration) {
        let slow = elapsed > self.config.slow_response();
        let mut metrics = self.lock_metrics();
        let entry = metrics.entry(key.clone()).or_default();
        entry.successes += 1;
        entry.total_response_time += elapsed;
        entry.consecutive_failures = 0;
        if slow {
            entry.slow_responses += 1;
            tracing::debug!(
                "Slow response from {} ({:?} > {:?})",
                key.identifier,
                elapsed,
                self.config.slow_response()
            );
        }
    }

    /// Records a failure; returns whether it was a rate-limit hit
    fn record_failure(&self, key: &LaneKey, failure: &Failure) -> bool {
        let rate_limited = failure.is_rate_limit();
        {
            let mut metrics = self.lock_metrics();
            let entry = metrics.entry(key.clone()).or_default();
            entry.failures += 1;
            entry.consecutive_failures += 1;
            entry.last_error = Some(failure.message.clone());
            if rate_limited {
                entry.rate_limit_hits += 1;
            }
        }

        if rate_limited {
            let hint = failure
                .retry_after
                .as_deref()
                .and_then(|value| parse_retry_after(value, Utc::now()));
            let duration = hint
                .unwrap_or_else(|| self.config.default_block())
                .min(self.config.max_block());

            tracing::warn!(
                "Rate limited by {} (retry-after {:?}), blocking for {:?}",
                key.identifier,
                failure.retry_after,
                duration
            );
            self.limiter.block(&key.identifier, duration);
        }

        rate_limited
    }

    /// Re-evaluates a lane's ceiling after a call
    fn adjust(&self, key: &LaneKey, rate_limited: bool) {
        let now = Instant::now();
        let mut metrics = self.lock_metrics();
        let Some(entry) = metrics.get_mut(key) else {
            return;
        };

        let current = self.limiter.ceiling(&key.identifier, key.kind);
        let cooled_down = entry
            .last_adjustment
            .map_or(true, |at| now.saturating_duration_since(at) >= self.config.adjustment_cooldown());

        let (requests, reason) =
            if rate_limited || entry.consecutive_failures > self.config.failure_streak {
                (current.requests / 2, "rate limit or failure streak")
            } else if entry.total() >= self.config.min_samples && cooled_down {
                if entry.success_rate() > self.config.increase_success_rate
                    && entry.average_response() < self.config.slow_response() / 2
                {
                    (raise(current, 0.2, self.config.max_requests), "healthy traffic")
                } else if entry.slow_ratio() > self.config.slow_ratio {
                    ((current.requests as f64 * 0.8).floor() as u32, "slow responses")
                } else {
                    return;
                }
            } else {
                return;
            };

        let requests = requests.max(1);
        if requests == current.requests {
            return;
        }

        entry.last_adjustment = Some(now);
        drop(metrics);

        tracing::info!(
            "Adjusting {} limit for {} from {} to {} ({})",
            key.kind,
            key.identifier,
            current.requests,
            requests,
            reason
        );
        self.limiter
            .update_limit(&key.identifier, key.kind, current.with_requests(requests));
    }

    /// Periodic adjustment pass
    ///
    /// Raises the ceiling of every lane with traffic, a near-perfect success
    /// rate and no rate-limit hits, then starts a new metrics window. Lanes
    /// that saw no traffic since the last cycle keep their ceiling and lose
    /// their metrics entry.
    ///
    /// # Returns
    ///
    /// The number of lanes whose ceiling was raised
    pub fn run_adjustment_cycle(&self) -> usize {
        let now = Instant::now();
        let mut raised = 0;
        let mut metrics = self.lock_metrics();

        let before = metrics.len();
        metrics.retain(|_, entry| entry.total() > 0);
        if metrics.len() < before {
            tracing::trace!("Dropped metrics of {} idle lanes", before - metrics.len());
        }

        for (key, entry) in metrics.iter_mut() {
            if entry.success_rate() >= self.config.cycle_success_rate && entry.rate_limit_hits == 0
            {
                let current = self.limiter.ceiling(&key.identifier, key.kind);
                let requests = raise(current, 0.1, self.config.max_requests);
                if requests != current.requests {
                    tracing::info!(
                        "Periodic increase of {} limit for {} from {} to {}",
                        key.kind,
                        key.identifier,
                        current.requests,
                        requests
                    );
                    self.limiter
                        .update_limit(&key.identifier, key.kind, current.with_requests(requests));
                    entry.last_adjustment = Some(now);
                    raised += 1;
                }
            }

            entry.reset_window();
        }

        raised
    }

    /// Runs `run_adjustment_cycle` on the configured interval until the
    /// throttler is dropped
    pub fn spawn_adjustment_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let throttler = Arc::downgrade(self);
        let period = self
            .config
            .adjustment_interval()
            .max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(throttler) = throttler.upgrade() else {
                    break;
                };
                let raised = throttler.run_adjustment_cycle();
                tracing::debug!("Adjustment cycle raised {} limits", raised);
            }
        })
    }

    /// Copy of a lane's metrics, if it has seen traffic
    pub fn metrics(&self, identifier: &str, kind: LimitType) -> Option<IdentifierMetrics> {
        self.lock_metrics()
            .get(&LaneKey::new(kind, identifier))
            .cloned()
    }

    /// Clears metrics and all limiter state
    pub fn reset(&self) {
        self.lock_metrics().clear();
        self.limiter.reset();
    }
}

/// Raises a ceiling by `fraction`, by at least one and at most ten requests
fn raise(current: RateCeiling, fraction: f64, max_requests: u32) -> u32 {
    let step = ((current.requests as f64 * fraction).ceil() as u32).clamp(1, 10);
    current
        .requests
        .saturating_add(step)
        .min(max_requests)
        .max(current.requests)
}
