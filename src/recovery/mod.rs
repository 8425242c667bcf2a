//! Error recovery
//!
//! Operations report problems as `Failure` values. `ErrorHandler` classifies
//! them, decides whether and when to retry, and surfaces a typed
//! `ScraperError` once recovery is exhausted. `CircuitBreaker` guards a
//! flaky dependency by failing fast after repeated failures.

mod backoff;
mod category;
mod circuit;
mod failure;
mod handler;
mod history;

pub use backoff::{exponential_delay, with_jitter, JITTER_RATIO};
pub use category::{classify, ErrorCategory};
pub use circuit::{
    BreakerError, BreakerStats, CircuitBreaker, CircuitBreakers, CircuitState, HALF_OPEN_SUCCESSES,
};
pub use failure::{ErrorCode, ErrorDetails, Failure, ScraperError};
pub use handler::{
    AuthRefresh, ErrorHandler, FallbackParser, RecoveryDecision, RetryContext, RATE_LIMIT_FLOOR,
    SERVER_ERROR_FLOOR,
};
pub use history::{ErrorEntry, ErrorLog, ErrorStats, Outcome, LOG_CAPACITY, LOG_RETAINED};
