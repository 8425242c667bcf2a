use crate::throttle::RateCeiling;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Sub-window used for burst control
pub const BURST_WINDOW: Duration = Duration::from_secs(1);

/// Delay before re-checking a lane whose burst budget is spent
pub const BURST_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Sliding-window admission history for one lane
///
/// Timestamps are appended in order and purged lazily whenever the lane is
/// asked whether it may admit.
#[derive(Debug, Clone, Default)]
pub struct RateWindow {
    admitted: VecDeque<Instant>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops timestamps that have aged out of the window
    pub fn purge(&mut self, window: Duration, now: Instant) {
        while let Some(oldest) = self.admitted.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }

    /// Returns how long to wait before the next admission, or `None` if a
    /// request can be admitted now
    ///
    /// This method enforces:
    /// - the window ceiling (`requests` per `per_seconds`)
    /// - the burst ceiling (`burst` per second)
    pub fn delay_before_admit(&mut self, ceiling: &RateCeiling, now: Instant) -> Option<Duration> {
        let window = ceiling.window();
        self.purge(window, now);

        if self.admitted.len() >= ceiling.requests as usize {
            // Purge guarantees the oldest entry is younger than the window
            let oldest = self.admitted.front().copied().unwrap_or(now);
            let age = now.saturating_duration_since(oldest);
            return Some(window.saturating_sub(age).max(Duration::from_millis(1)));
        }

        if self.burst_count(now) >= ceiling.burst as usize {
            return Some(BURST_RETRY_DELAY);
        }

        None
    }

    /// Records an admission
    pub fn record(&mut self, now: Instant) {
        self.admitted.push_back(now);
    }

    /// Admissions within the trailing burst window
    pub fn burst_count(&self, now: Instant) -> usize {
        self.admitted
            .iter()
            .rev()
            .take_while(|t| now.saturating_duration_since(**t) < BURST_WINDOW)
            .count()
    }

    /// Admissions within the trailing `window`, without purging
    pub fn count_within(&self, window: Duration, now: Instant) -> usize {
        self.admitted
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < window)
            .count()
    }

    /// Most recent admission
    pub fn newest(&self) -> Option<Instant> {
        self.admitted.back().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.admitted.is_empty()
    }

    /// Retained admission timestamps, oldest first
    pub fn timestamps(&self) -> Vec<Instant> {
        self.admitted.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.admitted.clear();
    }
}
