//! Delayed-task queue that drives the rate limiter
//!
//! Every piece of deferred limiter work (re-checking a lane, lifting a block)
//! is a `TickTask` with a due time. The limiter's driver pops due tasks in
//! deadline order and sleeps until the next one.

use crate::throttle::LimitType;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tokio::time::Instant;

/// Identifies one admission lane: a limit type plus an identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaneKey {
    pub kind: LimitType,
    pub identifier: String,
}

impl LaneKey {
    pub fn new(kind: LimitType, identifier: &str) -> Self {
        Self {
            kind,
            identifier: identifier.to_string(),
        }
    }
}

/// Deferred limiter work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickTask {
    /// Try to admit the head of a lane's queue; ignored unless `generation`
    /// is still the lane's live one
    Admit { lane: LaneKey, generation: u64 },
    /// Lift a block if it has expired
    Unblock(String),
    /// Drop a lane that has gone idle and whose window has emptied
    Evict(LaneKey),
}

/// A task together with the instant it becomes due
#[derive(Debug, Clone)]
struct ScheduledTick {
    due: Instant,
    seq: u64,
    task: TickTask,
}

// Earlier deadlines pop first from the max-heap; equal deadlines keep
// insertion order
impl Ord for ScheduledTick {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScheduledTick {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledTick {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for ScheduledTick {}

/// Min-heap of scheduled ticks
#[derive(Debug, Default)]
pub struct TickQueue {
    heap: BinaryHeap<ScheduledTick>,
    next_seq: u64,
}

impl TickQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `task` to run at `due`
    pub fn schedule(&mut self, due: Instant, task: TickTask) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.heap.push(ScheduledTick { due, seq, task });
    }

    /// Pops the earliest task if it is due at `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<TickTask> {
        if self.heap.peek()?.due <= now {
            self.heap.pop().map(|tick| tick.task)
        } else {
            None
        }
    }

    /// Deadline of the earliest pending task
    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|tick| tick.due)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
