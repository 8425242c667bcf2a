//! Per-identifier rate limiter with FIFO admission
//!
//! Each (limit type, identifier) pair owns a lane: a queue of parked callers
//! and a sliding-window history. Deferred work lives in a `TickQueue` drained
//! by one driver task per limiter, so a lane is only ever mutated while the
//! limiter's state lock is held and never across an `.await`. Lanes are
//! dropped once they go idle and their window empties; live ceilings
//! survive in the `CeilingTable`.

use crate::config::{Config, ThrottleConfig};
use crate::throttle::schedule::{LaneKey, TickQueue, TickTask};
use crate::throttle::window::RateWindow;
use crate::throttle::{CeilingTable, LimitType, RateCeiling};
use crate::SiftError;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;

type Waiter = oneshot::Sender<Result<(), SiftError>>;

/// Upper bound for block deadlines so `Instant` arithmetic cannot overflow
const MAX_BLOCK: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Admission lane for one (limit type, identifier) pair
#[derive(Debug)]
struct Lane {
    ceiling: RateCeiling,
    window: RateWindow,
    waiters: VecDeque<Waiter>,
    /// Due time of the live admission tick, if one is scheduled
    next_tick: Option<Instant>,
    /// Generation of the live admission tick; older ticks are stale
    generation: u64,
    /// Last admission made from the queue, which paces the next one
    paced_from: Option<Instant>,
    evict_pending: bool,
}

impl Lane {
    fn new(ceiling: RateCeiling) -> Self {
        Self {
            ceiling,
            window: RateWindow::new(),
            waiters: VecDeque::new(),
            next_tick: None,
            generation: 0,
            paced_from: None,
            evict_pending: false,
        }
    }

    fn is_idle(&self) -> bool {
        self.waiters.is_empty() && self.next_tick.is_none()
    }
}

/// Schedules the lane's next admission tick, superseding any pending one
fn schedule_admit(
    ticks: &mut TickQueue,
    generations: &mut u64,
    lane: &mut Lane,
    key: LaneKey,
    due: Instant,
) {
    *generations = generations.wrapping_add(1);
    lane.generation = *generations;
    lane.next_tick = Some(due);
    ticks.schedule(
        due,
        TickTask::Admit {
            lane: key,
            generation: lane.generation,
        },
    );
}

/// Schedules an eviction check for when the lane's window will be empty
///
/// Returns `true` if a new tick was scheduled.
fn schedule_evict(ticks: &mut TickQueue, lane: &mut Lane, key: LaneKey, now: Instant) -> bool {
    if lane.evict_pending {
        return false;
    }
    let due = lane
        .window
        .newest()
        .map_or(now, |newest| (newest + lane.ceiling.window()).max(now));
    lane.evict_pending = true;
    ticks.schedule(due, TickTask::Evict(key));
    true
}

#[derive(Debug, Clone, Copy)]
struct Block {
    until: Instant,
    until_utc: DateTime<Utc>,
}

/// Point-in-time view of a lane
#[derive(Debug, Clone, PartialEq)]
pub struct LaneSnapshot {
    /// Ceiling currently applied to the lane
    pub ceiling: RateCeiling,
    /// Admissions inside the trailing window
    pub in_window: usize,
    /// Callers parked in the lane's queue
    pub queued: usize,
    /// When the identifier's block lifts, if blocked
    pub blocked_until: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct LimiterState {
    ceilings: CeilingTable,
    lanes: HashMap<LaneKey, Lane>,
    blocks: HashMap<String, Block>,
    ticks: TickQueue,
    generations: u64,
    driver_running: bool,
    closed: bool,
}

impl LimiterState {
    /// Returns the block deadline if `identifier` is blocked at `now`,
    /// lifting expired blocks on the way
    fn active_block(&mut self, identifier: &str, now: Instant) -> Option<DateTime<Utc>> {
        let block = *self.blocks.get(identifier)?;
        if now < block.until {
            return Some(block.until_utc);
        }
        self.blocks.remove(identifier);
        tracing::info!("Unblocked {} (block expired)", identifier);
        None
    }

    fn run_due_ticks(&mut self, now: Instant) {
        while let Some(task) = self.ticks.pop_due(now) {
            match task {
                TickTask::Admit { lane, generation } => self.process_lane(lane, generation, now),
                TickTask::Unblock(identifier) => {
                    self.active_block(&identifier, now);
                }
                TickTask::Evict(lane) => self.evict_if_idle(lane, now),
            }
        }
    }

    /// One admission tick for a lane
    fn process_lane(&mut self, key: LaneKey, generation: u64, now: Instant) {
        let blocked = self.active_block(&key.identifier, now);

        let LimiterState {
            lanes,
            ticks,
            generations,
            ..
        } = self;
        let Some(lane) = lanes.get_mut(&key) else {
            return;
        };
        if lane.generation != generation {
            return;
        }
        lane.next_tick = None;

        if let Some(until) = blocked {
            reject_waiters(lane, &key.identifier, until);
        }

        // Callers that gave up stay in the queue until they reach the head
        while lane.waiters.front().is_some_and(|w| w.is_closed()) {
            lane.waiters.pop_front();
        }
        if lane.waiters.is_empty() {
            schedule_evict(ticks, lane, key, now);
            return;
        }

        if let Some(delay) = lane.window.delay_before_admit(&lane.ceiling, now) {
            tracing::debug!(
                "{} lane {} at capacity, next check in {:?} ({} queued)",
                key.kind,
                key.identifier,
                delay,
                lane.waiters.len()
            );
            schedule_admit(ticks, generations, lane, key, now + delay);
            return;
        }

        while let Some(waiter) = lane.waiters.pop_front() {
            if waiter.send(Ok(())).is_ok() {
                lane.window.record(now);
                lane.paced_from = Some(now);
                tracing::debug!("Admitted {} request for {}", key.kind, key.identifier);
                break;
            }
        }

        if lane.waiters.is_empty() {
            schedule_evict(ticks, lane, key, now);
        } else {
            let due = now + lane.ceiling.spacing();
            schedule_admit(ticks, generations, lane, key, due);
        }
    }

    /// Drops a lane with no callers and no admissions left in its window
    fn evict_if_idle(&mut self, key: LaneKey, now: Instant) {
        let LimiterState { lanes, ticks, .. } = self;
        let Some(lane) = lanes.get_mut(&key) else {
            return;
        };
        lane.evict_pending = false;

        // A busy lane schedules a fresh check when its queue drains
        if !lane.is_idle() {
            return;
        }

        lane.window.purge(lane.ceiling.window(), now);
        if lane.window.is_empty() {
            lanes.remove(&key);
            tracing::trace!("Evicted idle {} lane for {}", key.kind, key.identifier);
        } else {
            schedule_evict(ticks, lane, key, now);
        }
    }

    /// Drops every lane and live ceiling, waking parked callers with
    /// `LimiterClosed`
    fn clear(&mut self) {
        self.lanes.clear();
        self.blocks.clear();
        self.ticks.clear();
        self.ceilings.clear_overrides();
    }
}

fn reject_waiters(lane: &mut Lane, identifier: &str, until: DateTime<Utc>) {
    let rejected = lane.waiters.len();
    for waiter in lane.waiters.drain(..) {
        let _ = waiter.send(Err(SiftError::Blocked {
            identifier: identifier.to_string(),
            until,
        }));
    }
    if rejected > 0 {
        tracing::debug!("Rejected {} queued requests for blocked {}", rejected, identifier);
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<LimiterState>,
    wake: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs due ticks and sleeps until the next one, until the limiter is dropped
async fn drive(shared: Arc<Shared>) {
    loop {
        let next_due = {
            let mut state = shared.lock();
            if state.closed {
                state.clear();
                state.driver_running = false;
                return;
            }
            state.run_due_ticks(Instant::now());
            state.ticks.next_due()
        };

        match next_due {
            Some(due) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(due) => {}
                    _ = shared.wake.notified() => {}
                }
            }
            None => shared.wake.notified().await,
        }
    }
}

/// Rate limiter enforcing per-identifier sliding-window and burst ceilings
///
/// Callers of `acquire` for the same lane are admitted strictly in arrival
/// order. Different lanes are independent.
///
/// # Example
///
/// ```no_run
/// use sumi_sift::throttle::{LimitType, RateLimiter};
///
/// # async fn run() -> sumi_sift::Result<()> {
/// let limiter = RateLimiter::default();
/// limiter.acquire("example.org", LimitType::Domain).await?;
/// // ... perform the request ...
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    shared: Arc<Shared>,
}

impl RateLimiter {
    /// Creates a limiter from the throttle section of the configuration
    pub fn new(config: &ThrottleConfig) -> Self {
        Self::with_table(CeilingTable::from_config(config))
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.throttle)
    }

    pub fn with_table(ceilings: CeilingTable) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(LimiterState {
                    ceilings,
                    lanes: HashMap::new(),
                    blocks: HashMap::new(),
                    ticks: TickQueue::new(),
                    generations: 0,
                    driver_running: false,
                    closed: false,
                }),
                wake: Notify::new(),
            }),
        }
    }

    /// Waits until a request for `identifier` may proceed
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The caller is admitted
    /// * `Err(SiftError::Blocked)` - The identifier is blocked; nothing is queued
    /// * `Err(SiftError::LimiterClosed)` - The limiter was reset or dropped first
    pub async fn acquire(&self, identifier: &str, kind: LimitType) -> Result<(), SiftError> {
        let receiver = {
            let mut guard = self.shared.lock();
            let now = Instant::now();

            if let Some(until) = guard.active_block(identifier, now) {
                return Err(SiftError::Blocked {
                    identifier: identifier.to_string(),
                    until,
                });
            }

            let key = LaneKey::new(kind, identifier);
            let state = &mut *guard;
            let ceiling = state.ceilings.lookup(identifier, kind);
            let lane = state
                .lanes
                .entry(key.clone())
                .or_insert_with(|| Lane::new(ceiling));

            // Nobody ahead of us and budget available: admit without parking
            if lane.waiters.is_empty() && lane.window.delay_before_admit(&lane.ceiling, now).is_none()
            {
                lane.window.record(now);
                tracing::debug!("Admitted {} request for {}", kind, identifier);
                let scheduled = lane.next_tick.is_none()
                    && schedule_evict(&mut state.ticks, lane, key, now);
                if scheduled {
                    self.ensure_driver(state);
                    drop(guard);
                    self.shared.wake.notify_one();
                }
                return Ok(());
            }

            let (sender, receiver) = oneshot::channel();
            lane.waiters.push_back(sender);
            if lane.next_tick.is_none() {
                schedule_admit(&mut state.ticks, &mut state.generations, lane, key, now);
            }
            self.ensure_driver(state);
            receiver
        };

        self.shared.wake.notify_one();

        match receiver.await {
            Ok(result) => result,
            Err(_) => Err(SiftError::LimiterClosed {
                identifier: identifier.to_string(),
            }),
        }
    }

    /// Blocks `identifier` for `duration` across all limit types
    ///
    /// Queued callers are rejected immediately and new calls fail until the
    /// block lifts. An existing longer block is kept.
    ///
    /// # Returns
    ///
    /// The wall-clock time at which the block lifts
    pub fn block(&self, identifier: &str, duration: Duration) -> DateTime<Utc> {
        let duration = duration.min(MAX_BLOCK);
        let now = Instant::now();
        let block = Block {
            until: now + duration,
            until_utc: chrono::Duration::from_std(duration)
                .ok()
                .and_then(|d| Utc::now().checked_add_signed(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let mut guard = self.shared.lock();
        let state = &mut *guard;

        let effective = match state.blocks.get(identifier) {
            Some(existing) if existing.until >= block.until => *existing,
            _ => {
                state.blocks.insert(identifier.to_string(), block);
                state
                    .ticks
                    .schedule(block.until, TickTask::Unblock(identifier.to_string()));
                block
            }
        };

        // Their pending admission ticks find an empty queue and go idle
        for (key, lane) in state.lanes.iter_mut() {
            if key.identifier == identifier {
                reject_waiters(lane, identifier, effective.until_utc);
            }
        }

        tracing::info!(
            "Blocked {} for {:?} (until {})",
            identifier,
            duration,
            effective.until_utc
        );

        self.ensure_driver(state);
        drop(guard);
        self.shared.wake.notify_one();

        effective.until_utc
    }

    /// Lifts a block early
    ///
    /// Returns `true` if the identifier was blocked.
    pub fn unblock(&self, identifier: &str) -> bool {
        let removed = self.shared.lock().blocks.remove(identifier).is_some();
        if removed {
            tracing::info!("Unblocked {}", identifier);
        }
        removed
    }

    /// Whether `identifier` is currently blocked
    pub fn is_blocked(&self, identifier: &str) -> bool {
        self.blocked_until(identifier).is_some()
    }

    /// When the block on `identifier` lifts, if it is blocked
    pub fn blocked_until(&self, identifier: &str) -> Option<DateTime<Utc>> {
        self.shared.lock().active_block(identifier, Instant::now())
    }

    /// Replaces the ceiling of a lane; takes effect on its next admission check
    ///
    /// Zero fields are raised to 1. A parked queue is re-checked at once,
    /// or one spacing after its last admission if that is later; it never
    /// gets a second tick.
    pub fn update_limit(&self, identifier: &str, kind: LimitType, ceiling: RateCeiling) {
        let ceiling = ceiling.clamped();
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let now = Instant::now();

        let previous = state.ceilings.lookup(identifier, kind);
        state.ceilings.set_override(identifier, kind, ceiling);

        let key = LaneKey::new(kind, identifier);
        let mut recheck = false;
        if let Some(lane) = state.lanes.get_mut(&key) {
            lane.ceiling = ceiling;
            if !lane.waiters.is_empty() {
                let due = lane
                    .paced_from
                    .map_or(now, |at| (at + ceiling.spacing()).max(now));
                if lane.next_tick.map_or(true, |pending| due < pending) {
                    schedule_admit(&mut state.ticks, &mut state.generations, lane, key, due);
                    recheck = true;
                }
            }
        }

        if recheck {
            self.ensure_driver(state);
        }
        drop(guard);

        if recheck {
            self.shared.wake.notify_one();
        }

        if previous != ceiling {
            tracing::info!(
                "Updated {} limit for {}: {}/{}s (burst {})",
                kind,
                identifier,
                ceiling.requests,
                ceiling.per_seconds,
                ceiling.burst
            );
        }
    }

    /// Current ceiling of a lane
    pub fn ceiling(&self, identifier: &str, kind: LimitType) -> RateCeiling {
        self.shared.lock().ceilings.lookup(identifier, kind)
    }

    /// Point-in-time view of a lane
    pub fn snapshot(&self, identifier: &str, kind: LimitType) -> LaneSnapshot {
        let mut state = self.shared.lock();
        let now = Instant::now();
        let blocked_until = state.active_block(identifier, now);

        match state.lanes.get(&LaneKey::new(kind, identifier)) {
            Some(lane) => LaneSnapshot {
                ceiling: lane.ceiling,
                in_window: lane.window.count_within(lane.ceiling.window(), now),
                queued: lane.waiters.len(),
                blocked_until,
            },
            None => LaneSnapshot {
                ceiling: state.ceilings.lookup(identifier, kind),
                in_window: 0,
                queued: 0,
                blocked_until,
            },
        }
    }

    /// Admission timestamps a lane still retains, oldest first
    pub fn recent_admissions(&self, identifier: &str, kind: LimitType) -> Vec<Instant> {
        self.shared
            .lock()
            .lanes
            .get(&LaneKey::new(kind, identifier))
            .map(|lane| lane.window.timestamps())
            .unwrap_or_default()
    }

    /// Clears all lanes, blocks, live ceilings and pending ticks
    ///
    /// Callers still parked in `acquire` receive `LimiterClosed`.
    pub fn reset(&self) {
        self.shared.lock().clear();
        tracing::info!("Rate limiter reset");
    }

    fn ensure_driver(&self, state: &mut LimiterState) {
        if state.driver_running {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                state.driver_running = true;
                handle.spawn(drive(Arc::clone(&self.shared)));
            }
            Err(_) => {
                tracing::warn!("No tokio runtime; deferred admissions will not run");
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::with_table(CeilingTable::default())
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.closed = true;
        if !state.driver_running {
            state.clear();
        }
        drop(state);
        self.shared.wake.notify_one();
    }
}
