//! Failure classification, recovery decisions and the retry loop

use crate::config::{Config, RetryConfig};
use crate::recovery::backoff::{exponential_delay, with_jitter};
use crate::recovery::history::{ErrorEntry, ErrorLog, ErrorStats, Outcome};
use crate::recovery::{ErrorCategory, ErrorCode, ErrorDetails, Failure, ScraperError};
use crate::throttle::parse_retry_after;
use chrono::Utc;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Backoff floor for rate-limited calls without a retry-after hint
pub const RATE_LIMIT_FLOOR: Duration = Duration::from_millis(5000);

/// Backoff floor for server errors
pub const SERVER_ERROR_FLOOR: Duration = Duration::from_millis(2000);

/// Auth refresh is only tried on attempts below this index
const AUTH_REFRESH_ATTEMPTS: u32 = 1;

type RefreshFuture = Pin<Box<dyn Future<Output = bool> + Send>>;

/// Credential refresh hook; resolves to `true` when new credentials are in place
pub type AuthRefresh = Box<dyn Fn() -> RefreshFuture + Send + Sync>;

/// Fallback parser tried on parsing failures
pub type FallbackParser<T> = Box<dyn Fn(&Failure) -> Option<T> + Send + Sync>;

/// Per-call recovery hooks for `ErrorHandler::retry_with_backoff`
pub struct RetryContext<T> {
    /// Operation name recorded in the error log
    pub label: String,
    auth_refresh: Option<AuthRefresh>,
    fallback: Option<FallbackParser<T>>,
}

impl<T> RetryContext<T> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            auth_refresh: None,
            fallback: None,
        }
    }

    pub fn with_auth_refresh<F, Fut>(mut self, refresh: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.auth_refresh = Some(Box::new(move || Box::pin(refresh())));
        self
    }

    pub fn with_fallback<F>(mut self, parser: F) -> Self
    where
        F: Fn(&Failure) -> Option<T> + Send + Sync + 'static,
    {
        self.fallback = Some(Box::new(parser));
        self
    }
}

impl<T> Default for RetryContext<T> {
    fn default() -> Self {
        Self::new("operation")
    }
}

impl<T> fmt::Debug for RetryContext<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryContext")
            .field("label", &self.label)
            .field("auth_refresh", &self.auth_refresh.is_some())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// What to do about one failure
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryDecision<T = ()> {
    pub category: ErrorCategory,
    pub retry: bool,
    /// Wait before the next attempt
    pub delay: Duration,
    pub fatal: bool,
    /// The resource can be skipped rather than alarmed on
    pub skip: bool,
    pub message: String,
    pub invalid_fields: Vec<String>,
    pub partial: Option<serde_json::Value>,
    /// Value produced by the fallback parser; resolves the call
    pub fallback: Option<T>,
}

impl<T> RecoveryDecision<T> {
    fn new(category: ErrorCategory, failure: &Failure) -> Self {
        Self {
            category,
            retry: false,
            delay: Duration::ZERO,
            fatal: false,
            skip: false,
            message: failure.message.clone(),
            invalid_fields: Vec::new(),
            partial: None,
            fallback: None,
        }
    }

    fn retry_after(mut self, delay: Duration) -> Self {
        self.retry = true;
        self.delay = delay;
        self
    }
}

/// Classifies failures, decides on recovery and runs the retry loop
#[derive(Debug)]
pub struct ErrorHandler {
    config: RetryConfig,
    log: Mutex<ErrorLog>,
}

impl ErrorHandler {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            log: Mutex::new(ErrorLog::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.retry.clone())
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn lock_log(&self) -> MutexGuard<'_, ErrorLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Backoff before the attempt after `attempt`
    ///
    /// `base * 2^attempt` plus up to 10% jitter, capped at the configured
    /// maximum. With exponential backoff disabled the delay is `base`.
    pub fn compute_backoff(&self, attempt: u32, base: Duration) -> Duration {
        let cap = self.config.max_backoff_delay();
        if !self.config.exponential_backoff {
            return base.min(cap);
        }
        with_jitter(
            exponential_delay(base, attempt, cap),
            cap,
            &mut rand::thread_rng(),
        )
    }

    /// Classifies `failure`, logs it and decides how to recover
    ///
    /// | Category | Retry | Delay |
    /// |----------|-------|-------|
    /// | network | yes | exponential backoff |
    /// | rate limit | yes | retry-after hint, else backoff with a 5s floor |
    /// | auth | once, if the refresh hook succeeds | none |
    /// | not found | no, marked skippable | - |
    /// | server error | while attempts remain | backoff with a 2s floor |
    /// | parsing | no, fallback parser tried first | - |
    /// | validation | no, invalid fields reported | - |
    /// | unknown | for the first half of the attempts | exponential backoff |
    ///
    /// # Arguments
    ///
    /// * `failure` - The failure to handle
    /// * `attempt` - Zero-based index of the attempt that failed
    /// * `ctx` - Recovery hooks for the call
    pub async fn handle_error<T>(
        &self,
        failure: &Failure,
        attempt: u32,
        ctx: &RetryContext<T>,
    ) -> RecoveryDecision<T> {
        let category = failure.category();
        self.lock_log()
            .record(ErrorEntry::new(failure, category, &ctx.label, attempt));

        let decision = RecoveryDecision::new(category, failure);
        let base = self.config.retry_delay();

        match category {
            ErrorCategory::Network => decision.retry_after(self.compute_backoff(attempt, base)),

            ErrorCategory::RateLimit => {
                let hinted = failure
                    .retry_after
                    .as_deref()
                    .and_then(|value| parse_retry_after(value, Utc::now()));
                let delay = match hinted {
                    Some(delay) => delay.min(self.config.max_backoff_delay()),
                    None => self.compute_backoff(attempt, base.max(RATE_LIMIT_FLOOR)),
                };
                decision.retry_after(delay)
            }

            ErrorCategory::Auth => {
                let refreshed = match &ctx.auth_refresh {
                    Some(refresh) if attempt < AUTH_REFRESH_ATTEMPTS => refresh().await,
                    _ => false,
                };
                if refreshed {
                    tracing::info!("Credentials refreshed for {}, retrying", ctx.label);
                    decision.retry_after(Duration::ZERO)
                } else {
                    RecoveryDecision {
                        fatal: true,
                        ..decision
                    }
                }
            }

            ErrorCategory::NotFound => RecoveryDecision {
                skip: true,
                ..decision
            },

            ErrorCategory::ServerError if attempt < self.config.max_retries => {
                decision.retry_after(self.compute_backoff(attempt, base.max(SERVER_ERROR_FLOOR)))
            }

            ErrorCategory::Parsing => {
                let fallback = ctx.fallback.as_ref().and_then(|parse| parse(failure));
                if fallback.is_some() {
                    tracing::info!("Fallback parser recovered {} after parse failure", ctx.label);
                } else if ctx.fallback.is_some() {
                    tracing::debug!("Fallback parser found nothing for {}", ctx.label);
                }
                RecoveryDecision {
                    partial: failure.partial.clone(),
                    fallback,
                    ..decision
                }
            }

            ErrorCategory::Validation => RecoveryDecision {
                invalid_fields: failure.invalid_fields.clone(),
                ..decision
            },

            ErrorCategory::Unknown if 2 * attempt < self.config.max_retries => {
                decision.retry_after(self.compute_backoff(attempt, base))
            }

            ErrorCategory::ServerError | ErrorCategory::Unknown => decision,
        }
    }

    /// Runs `operation` until it succeeds, a failure is not retryable, or
    /// `max_retries` attempts have been made
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - The operation's value, or the fallback parser's
    /// * `Err(ScraperError)` - With `ErrorCode::Category` for a
    ///   non-retryable failure, `ErrorCode::MaxRetriesExceeded` when every
    ///   attempt failed
    pub async fn retry_with_backoff<T, F, Fut>(
        &self,
        mut operation: F,
        ctx: &RetryContext<T>,
    ) -> Result<T, ScraperError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        let max_retries = self.config.max_retries.max(1);
        let mut last: Option<(Failure, RecoveryDecision<T>)> = None;

        for attempt in 0..max_retries {
            let failure = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(
                            "{} recovered after {} failed attempts",
                            ctx.label,
                            attempt
                        );
                        self.lock_log().record_outcome(Outcome::Recovered);
                    } else {
                        self.lock_log().record_outcome(Outcome::Succeeded);
                    }
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            let mut decision = self.handle_error(&failure, attempt, ctx).await;

            if let Some(value) = decision.fallback.take() {
                self.lock_log().record_outcome(Outcome::Recovered);
                return Ok(value);
            }

            if !decision.retry {
                self.lock_log().record_outcome(Outcome::Failed {
                    fatal: decision.fatal,
                });
                if decision.fatal {
                    tracing::warn!(
                        "Fatal {} error in {}: {}",
                        decision.category,
                        ctx.label,
                        failure
                    );
                } else {
                    tracing::info!(
                        "Not retrying {} after {} error: {}",
                        ctx.label,
                        decision.category,
                        failure
                    );
                }
                return Err(surface(
                    ErrorCode::Category(decision.category),
                    failure,
                    decision,
                    attempt + 1,
                ));
            }

            if attempt + 1 < max_retries {
                self.lock_log().record_retry();
                tracing::info!(
                    "Retrying {} in {:?} after {} error (attempt {}/{}): {}",
                    ctx.label,
                    decision.delay,
                    decision.category,
                    attempt + 1,
                    max_retries,
                    failure
                );
                tokio::time::sleep(decision.delay).await;
            }

            last = Some((failure, decision));
        }

        self.lock_log()
            .record_outcome(Outcome::Failed { fatal: false });

        let (failure, decision) = match last {
            Some(last) => last,
            None => {
                let failure = Failure::new("operation was never attempted");
                let decision = RecoveryDecision::new(ErrorCategory::Unknown, &failure);
                (failure, decision)
            }
        };
        tracing::warn!(
            "{} failed after {} attempts: {}",
            ctx.label,
            max_retries,
            failure
        );

        let mut error = surface(ErrorCode::MaxRetriesExceeded, failure, decision, max_retries);
        error.message = format!(
            "Max retries ({}) exceeded: {}",
            max_retries, error.details.original
        );
        Err(error)
    }

    pub fn stats(&self) -> ErrorStats {
        self.lock_log().stats()
    }

    /// The newest `limit` log entries, oldest first
    pub fn recent_errors(&self, limit: usize) -> Vec<ErrorEntry> {
        self.lock_log().recent(limit)
    }

    pub fn reset(&self) {
        self.lock_log().clear();
    }
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

fn surface<T>(
    code: ErrorCode,
    failure: Failure,
    decision: RecoveryDecision<T>,
    attempts: u32,
) -> ScraperError {
    ScraperError {
        message: failure.message.clone(),
        code,
        details: ErrorDetails {
            category: decision.category,
            attempts,
            skip: decision.skip,
            fatal: decision.fatal,
            invalid_fields: decision.invalid_fields,
            partial: decision.partial,
            original: failure,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn create_test_config() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            retry_delay_ms: 1000,
            exponential_backoff: true,
            max_backoff_delay_ms: 30_000,
        }
    }

    fn handler() -> ErrorHandler {
        ErrorHandler::new(create_test_config())
    }

    fn ctx<T>() -> RetryContext<T> {
        RetryContext::new("test-op")
    }

    /// Operation failing with `failures` in order, then returning `value`
    fn scripted<T: Clone>(
        failures: Vec<Failure>,
        value: T,
    ) -> (
        Arc<AtomicU32>,
        impl FnMut() -> std::future::Ready<Result<T, Failure>>,
    ) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let operation = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) as usize;
            std::future::ready(match failures.get(n) {
                Some(failure) => Err(failure.clone()),
                None => Ok(value.clone()),
            })
        };
        (calls, operation)
    }

    #[test]
    fn test_compute_backoff_grows_within_jitter() {
        let handler = handler();
        let base = Duration::from_millis(1000);

        let mut previous = Duration::ZERO;
        for attempt in 0..4 {
            let delay = handler.compute_backoff(attempt, base);
            let expected = base * 2u32.pow(attempt);
            assert!(delay >= expected, "attempt {}: {:?}", attempt, delay);
            assert!(delay <= expected.mul_f64(1.1), "attempt {}: {:?}", attempt, delay);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_compute_backoff_capped() {
        let handler = handler();
        assert_eq!(
            handler.compute_backoff(10, Duration::from_millis(1000)),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_compute_backoff_constant() {
        let handler = ErrorHandler::new(RetryConfig {
            exponential_backoff: false,
            ..create_test_config()
        });
        assert_eq!(
            handler.compute_backoff(3, Duration::from_millis(1000)),
            Duration::from_millis(1000)
        );
    }

    #[tokio::test]
    async fn test_network_decision() {
        let handler = handler();
        let failure = Failure::new("connect failed").with_code("ECONNREFUSED");
        let decision = handler.handle_error(&failure, 1, &ctx::<()>()).await;

        assert_eq!(decision.category, ErrorCategory::Network);
        assert!(decision.retry);
        assert!(decision.delay >= Duration::from_millis(2000));
        assert!(!decision.fatal);
    }

    #[tokio::test]
    async fn test_rate_limit_uses_hint() {
        let handler = handler();
        let failure = Failure::new("slow down").with_status(429).with_retry_after("7");
        let decision = handler.handle_error(&failure, 0, &ctx::<()>()).await;

        assert!(decision.retry);
        assert_eq!(decision.delay, Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_rate_limit_floor_without_hint() {
        let handler = handler();
        let failure = Failure::new("Too Many Requests");
        let decision = handler.handle_error(&failure, 0, &ctx::<()>()).await;

        assert_eq!(decision.category, ErrorCategory::RateLimit);
        assert!(decision.delay >= RATE_LIMIT_FLOOR);
        assert!(decision.delay <= RATE_LIMIT_FLOOR.mul_f64(1.1));
    }

    #[tokio::test]
    async fn test_server_error_floor() {
        let handler = handler();
        let failure = Failure::new("HTTP 502").with_status(502);
        let decision = handler.handle_error(&failure, 0, &ctx::<()>()).await;

        assert!(decision.retry);
        assert!(decision.delay >= SERVER_ERROR_FLOOR);

        let decision = handler.handle_error(&failure, 3, &ctx::<()>()).await;
        assert!(!decision.retry);
    }

    #[tokio::test]
    async fn test_auth_without_refresh_is_fatal() {
        let handler = handler();
        let failure = Failure::new("HTTP 401").with_status(401);
        let decision = handler.handle_error(&failure, 0, &ctx::<()>()).await;

        assert!(!decision.retry);
        assert!(decision.fatal);
    }

    #[tokio::test]
    async fn test_auth_refresh_retries_once() {
        let handler = handler();
        let failure = Failure::new("HTTP 401").with_status(401);
        let ctx = RetryContext::<()>::new("login").with_auth_refresh(|| async { true });

        let first = handler.handle_error(&failure, 0, &ctx).await;
        assert!(first.retry);
        assert_eq!(first.delay, Duration::ZERO);

        let second = handler.handle_error(&failure, 1, &ctx).await;
        assert!(!second.retry);
        assert!(second.fatal);
    }

    #[tokio::test]
    async fn test_auth_refresh_failure_is_fatal() {
        let handler = handler();
        let failure = Failure::new("forbidden").with_status(403);
        let ctx = RetryContext::<()>::new("login").with_auth_refresh(|| async { false });

        let decision = handler.handle_error(&failure, 0, &ctx).await;
        assert!(decision.fatal);
    }

    #[tokio::test]
    async fn test_not_found_is_skippable() {
        let handler = handler();
        let failure = Failure::new("HTTP 404").with_status(404);
        let decision = handler.handle_error(&failure, 0, &ctx::<()>()).await;

        assert!(!decision.retry);
        assert!(decision.skip);
        assert!(!decision.fatal);
    }

    #[tokio::test]
    async fn test_validation_reports_fields() {
        let handler = handler();
        let failure = Failure::new("validation failed").with_invalid_fields(["email"]);
        let decision = handler.handle_error(&failure, 0, &ctx::<()>()).await;

        assert!(!decision.retry);
        assert_eq!(decision.invalid_fields, vec!["email"]);
    }

    #[tokio::test]
    async fn test_unknown_retries_for_half_the_budget() {
        let handler = ErrorHandler::new(RetryConfig {
            max_retries: 4,
            ..create_test_config()
        });
        let failure = Failure::new("weird");

        assert!(handler.handle_error(&failure, 0, &ctx::<()>()).await.retry);
        assert!(handler.handle_error(&failure, 1, &ctx::<()>()).await.retry);
        assert!(!handler.handle_error(&failure, 2, &ctx::<()>()).await.retry);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_after_network_failures() {
        let handler = handler();
        let network = Failure::new("connect failed").with_code("ECONNREFUSED");
        let (calls, operation) = scripted(vec![network.clone(), network], "page");

        let start = Instant::now();
        let value = handler.retry_with_backoff(operation, &ctx()).await.unwrap();

        assert_eq!(value, "page");
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // 1s then 2s of backoff, each with up to 10% jitter
        let waited = Instant::now().duration_since(start);
        assert!(waited >= Duration::from_millis(3000));
        assert!(waited <= Duration::from_millis(3300));

        let stats = handler.stats();
        assert_eq!(stats.recovered, 1);
        assert_eq!(stats.retried, 2);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.operations, 1);
        assert_eq!(stats.error_rate(), 0.0);
        assert_eq!(stats.recovery_rate(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_are_non_decreasing() {
        let handler = ErrorHandler::new(RetryConfig {
            max_retries: 5,
            ..create_test_config()
        });
        let times = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&times);
        let result = handler
            .retry_with_backoff(
                move || {
                    recorded.lock().unwrap().push(Instant::now());
                    std::future::ready(Err::<(), _>(Failure::new("timed out")))
                },
                &ctx(),
            )
            .await;
        assert!(result.is_err());

        let times = times.lock().unwrap().clone();
        let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(gaps.len(), 4);
        assert!(gaps.windows(2).all(|w| w[1] >= w[0]), "{:?}", gaps);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_yields_max_retries_exceeded() {
        let handler = handler();
        let failure = Failure::new("HTTP 503").with_status(503);
        let (calls, operation) = scripted(vec![failure.clone(); 5], ());

        let error = handler.retry_with_backoff(operation, &ctx()).await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(error.code, ErrorCode::MaxRetriesExceeded);
        assert_eq!(error.details.attempts, 3);
        assert_eq!(error.details.original.status, Some(503));
        assert_eq!(error.category(), ErrorCategory::ServerError);

        let stats = handler.stats();
        assert_eq!(stats.failed_operations, 1);
        assert_eq!(stats.fatal, 0);
        assert_eq!(stats.error_rate(), 1.0);
    }

    #[tokio::test]
    async fn test_auth_failure_surfaces_without_retry() {
        let handler = handler();
        let (calls, operation) = scripted(vec![Failure::new("HTTP 401").with_status(401)], ());

        let error = handler.retry_with_backoff(operation, &ctx()).await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(error.code, ErrorCode::Category(ErrorCategory::Auth));
        assert!(error.details.fatal);
        assert_eq!(handler.stats().fatal, 1);
        assert_eq!(handler.stats().retried, 0);
    }

    #[tokio::test]
    async fn test_auth_refresh_then_success() {
        let handler = handler();
        let refreshes = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&refreshes);
        let ctx = RetryContext::new("api").with_auth_refresh(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { true }
        });
        let (calls, operation) = scripted(vec![Failure::new("HTTP 401").with_status(401)], 42);

        let value = handler.retry_with_backoff(operation, &ctx).await.unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(handler.stats().recovered, 1);
    }

    #[tokio::test]
    async fn test_not_found_surfaces_skippable() {
        let handler = handler();
        let (_, operation) = scripted(vec![Failure::new("HTTP 404").with_status(404)], ());

        let error = handler.retry_with_backoff(operation, &ctx()).await.unwrap_err();

        assert!(error.is_skippable());
        assert_eq!(error.code, ErrorCode::Category(ErrorCategory::NotFound));
        assert_eq!(handler.stats().fatal, 0);
    }

    #[tokio::test]
    async fn test_fallback_parser_resolves_parse_failure() {
        let handler = handler();
        let failure = Failure::new("Unexpected token in JSON").with_partial(json!({"name": "Acme"}));
        let (calls, operation) = scripted(vec![failure], json!(null));
        let ctx = RetryContext::new("parse").with_fallback(|failure: &Failure| failure.partial.clone());

        let value = handler.retry_with_backoff(operation, &ctx).await.unwrap();

        assert_eq!(value, json!({"name": "Acme"}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(handler.stats().recovered, 1);
    }

    #[tokio::test]
    async fn test_parse_failure_without_fallback_returns_partial() {
        let handler = handler();
        let failure = Failure::new("malformed document").with_partial(json!({"title": "Acme"}));
        let (_, operation) = scripted(vec![failure], ());

        let error = handler.retry_with_backoff(operation, &ctx()).await.unwrap_err();

        assert_eq!(error.code, ErrorCode::Category(ErrorCategory::Parsing));
        assert_eq!(error.details.partial, Some(json!({"title": "Acme"})));
    }

    #[tokio::test]
    async fn test_recent_errors_and_reset() {
        let handler = handler();
        let (_, operation) = scripted(vec![Failure::new("HTTP 404").with_status(404)], ());
        let _ = handler
            .retry_with_backoff(operation, &RetryContext::new("lookup"))
            .await;

        let recent = handler.recent_errors(10);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].context, "lookup");
        assert_eq!(recent[0].category, ErrorCategory::NotFound);

        handler.reset();
        assert!(handler.recent_errors(10).is_empty());
        assert_eq!(handler.stats(), ErrorStats::default());
    }
}
