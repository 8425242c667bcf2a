use rand::Rng;
use std::time::Duration;

/// Largest share of a delay added as random jitter
pub const JITTER_RATIO: f64 = 0.1;

/// `base * 2^attempt`, capped at `cap`
pub fn exponential_delay(base: Duration, attempt: u32, cap: Duration) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(Duration::MAX).min(cap)
}

/// Adds up to `JITTER_RATIO` of `delay` as random jitter, keeping the result
/// at or below `cap`
pub fn with_jitter<R: Rng>(delay: Duration, cap: Duration, rng: &mut R) -> Duration {
    let delay = delay.min(cap);
    let jitter = delay.mul_f64(rng.gen_range(0.0..=JITTER_RATIO));
    delay.saturating_add(jitter).min(cap)
}
