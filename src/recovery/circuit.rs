//! Circuit breaker
//!
//! `Closed` passes calls through and counts consecutive failures. Reaching
//! the threshold opens the circuit: calls fail fast until the reset timeout
//! elapses, after which the next call runs in `HalfOpen`. Three successes in
//! a row there close the circuit; any failure reopens it.

use crate::config::{BreakerConfig, Config};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Consecutive half-open successes needed to close the circuit
pub const HALF_OPEN_SUCCESSES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Error returned by `CircuitBreaker::execute`
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open; the operation was not called
    #[error("Circuit '{name}' is open until {next_attempt}")]
    Open {
        name: String,
        next_attempt: DateTime<Utc>,
    },

    /// The operation did not finish within the call timeout
    #[error("Call timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Inner(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// The operation's own error, if it produced one
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(error) => Some(error),
            _ => None,
        }
    }
}

/// Point-in-time view of a breaker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failures: u32,
    pub half_open_successes: u32,
    pub last_failure: Option<DateTime<Utc>>,
    /// When an open circuit lets the next call through
    pub next_attempt: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    half_open_successes: u32,
    last_failure: Option<DateTime<Utc>>,
    next_attempt: Option<(Instant, DateTime<Utc>)>,
}

impl BreakerInner {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            half_open_successes: 0,
            last_failure: None,
            next_attempt: None,
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner::closed()),
        }
    }

    pub fn from_config(name: impl Into<String>, config: &Config) -> Self {
        Self::new(name, config.circuit_breaker.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `operation` through the breaker under the call timeout
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - The operation succeeded
    /// * `Err(BreakerError::Open)` - The circuit is open; the operation was not called
    /// * `Err(BreakerError::Timeout)` - The call timed out; counted as a failure
    /// * `Err(BreakerError::Inner)` - The operation failed
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.admit()?;

        let timeout = self.config.timeout();
        match tokio::time::timeout(timeout, operation()).await {
            Ok(Ok(value)) => {
                self.on_success();
                Ok(value)
            }
            Ok(Err(error)) => {
                self.on_failure();
                Err(BreakerError::Inner(error))
            }
            Err(_) => {
                tracing::warn!("Circuit '{}' call timed out after {:?}", self.name, timeout);
                self.on_failure();
                Err(BreakerError::Timeout(timeout))
            }
        }
    }

    /// Fails fast while open; moves to half-open once the cool-down is over
    fn admit<E>(&self) -> Result<(), BreakerError<E>> {
        let mut inner = self.lock();
        if inner.state != CircuitState::Open {
            return Ok(());
        }

        match inner.next_attempt {
            Some((at, at_utc)) if Instant::now() < at => Err(BreakerError::Open {
                name: self.name.clone(),
                next_attempt: at_utc,
            }),
            _ => {
                inner.state = CircuitState::HalfOpen;
                inner.half_open_successes = 0;
                tracing::info!("Circuit '{}' half-open, trying a call", self.name);
                Ok(())
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => inner.failures = 0,
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= HALF_OPEN_SUCCESSES {
                    *inner = BreakerInner {
                        last_failure: inner.last_failure,
                        ..BreakerInner::closed()
                    };
                    tracing::info!("Circuit '{}' closed", self.name);
                }
            }
            // A call admitted before another one reopened the circuit
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.lock();
        inner.failures += 1;
        inner.last_failure = Some(Utc::now());

        let trip = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.failures >= self.config.threshold,
            CircuitState::Open => false,
        };
        if !trip {
            return;
        }

        let cool_down = self.config.reset_timeout();
        let at_utc = chrono::Duration::from_std(cool_down)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        inner.state = CircuitState::Open;
        inner.half_open_successes = 0;
        inner.next_attempt = Some((Instant::now() + cool_down, at_utc));

        tracing::warn!(
            "Circuit '{}' opened after {} failures, next attempt at {}",
            self.name,
            inner.failures,
            at_utc
        );
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn stats(&self) -> BreakerStats {
        let inner = self.lock();
        BreakerStats {
            name: self.name.clone(),
            state: inner.state,
            failures: inner.failures,
            half_open_successes: inner.half_open_successes,
            last_failure: inner.last_failure,
            next_attempt: inner.next_attempt.map(|(_, at)| at),
        }
    }

    /// Forces the circuit closed and clears its counters
    pub fn reset(&self) {
        *self.lock() = BreakerInner::closed();
        tracing::info!("Circuit '{}' reset", self.name);
    }
}

/// Named breakers sharing one configuration, created on first use
#[derive(Debug, Default)]
pub struct CircuitBreakers {
    config: BreakerConfig,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakers {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.circuit_breaker.clone())
    }

    /// The breaker for `name`, created closed if missing
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            breakers
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.config.clone()))),
        )
    }

    /// Stats of every breaker, sorted by name
    pub fn stats(&self) -> Vec<BreakerStats> {
        let breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stats: Vec<BreakerStats> = breakers.values().map(|b| b.stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    pub fn reset_all(&self) {
        let breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        for breaker in breakers.values() {
            breaker.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn create_test_config() -> BreakerConfig {
        BreakerConfig {
            threshold: 5,
            timeout_ms: 1_000,
            reset_timeout_ms: 10_000,
        }
    }

    async fn fail(breaker: &CircuitBreaker) -> BreakerError<&'static str> {
        breaker
            .execute(|| async { Err::<(), _>("boom") })
            .await
            .unwrap_err()
    }

    async fn succeed(breaker: &CircuitBreaker) {
        breaker
            .execute(|| async { Ok::<_, &'static str>(()) })
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold() {
        let breaker = CircuitBreaker::new("api", create_test_config());

        for _ in 0..4 {
            assert!(matches!(fail(&breaker).await, BreakerError::Inner("boom")));
            assert_eq!(breaker.state(), CircuitState::Closed);
        }
        fail(&breaker).await;

        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.stats().failures, 5);
        assert!(breaker.stats().next_attempt.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_fails_fast() {
        let breaker = CircuitBreaker::new("api", create_test_config());
        for _ in 0..5 {
            fail(&breaker).await;
        }

        let calls = AtomicU32::new(0);
        let result = breaker
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &'static str>(())
            })
            .await;

        assert!(result.unwrap_err().is_open());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cycle_back_to_closed() {
        let breaker = CircuitBreaker::new("api", create_test_config());
        for _ in 0..5 {
            fail(&breaker).await;
        }

        tokio::time::sleep(Duration::from_millis(10_001)).await;

        succeed(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        succeed(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        succeed(&breaker).await;

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.stats().failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("api", create_test_config());
        for _ in 0..5 {
            fail(&breaker).await;
        }
        tokio::time::sleep(Duration::from_millis(10_001)).await;

        succeed(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        // Cool-down restarted
        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert!(fail(&breaker).await.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_count() {
        let breaker = CircuitBreaker::new("api", create_test_config());
        for _ in 0..4 {
            fail(&breaker).await;
        }
        succeed(&breaker).await;
        for _ in 0..4 {
            fail(&breaker).await;
        }

        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let breaker = CircuitBreaker::new(
            "slow",
            BreakerConfig {
                threshold: 1,
                ..create_test_config()
            },
        );

        let result = breaker
            .execute(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, &'static str>(())
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Timeout(d)) if d == Duration::from_secs(1)));
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset() {
        let breaker = CircuitBreaker::new("api", create_test_config());
        for _ in 0..5 {
            fail(&breaker).await;
        }

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        succeed(&breaker).await;
    }

    #[tokio::test]
    async fn test_registry_shares_breakers() {
        let registry = CircuitBreakers::new(BreakerConfig {
            threshold: 1,
            ..create_test_config()
        });

        fail(&registry.get("github")).await;
        assert_eq!(registry.get("github").state(), CircuitState::Open);
        assert_eq!(registry.get("openai").state(), CircuitState::Closed);

        let names: Vec<String> = registry.stats().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["github", "openai"]);

        registry.reset_all();
        assert_eq!(registry.get("github").state(), CircuitState::Closed);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
        assert_eq!(CircuitState::Open.to_string(), "OPEN");
    }
}
