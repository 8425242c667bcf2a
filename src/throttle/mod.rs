//! Request throttling
//!
//! `RateLimiter` admits callers per (limit type, identifier) lane under a
//! sliding-window ceiling and a one-second burst ceiling. `SmartThrottler`
//! wraps it and adapts ceilings to the outcomes of the operations it runs.

mod adaptive;
mod limiter;
mod limits;
mod retry_after;
pub(crate) mod schedule;
pub(crate) mod window;

pub use adaptive::{IdentifierMetrics, SmartThrottler};
pub use limiter::{LaneSnapshot, RateLimiter};
pub use limits::{CeilingTable, LimitType, RateCeiling};
pub use retry_after::parse_retry_after;
