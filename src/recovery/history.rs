//! Bounded error log and aggregate counters

use crate::recovery::{ErrorCategory, Failure};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// Entries kept before the log is trimmed
pub const LOG_CAPACITY: usize = 1000;

/// Entries kept after a trim
pub const LOG_RETAINED: usize = 500;

/// One recorded failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub code: Option<String>,
    pub status: Option<u16>,
    pub category: ErrorCategory,
    /// Label of the operation that failed
    pub context: String,
    /// Zero-based attempt index
    pub attempt: u32,
    /// The failure and its causes, one per line
    pub stack: String,
}

impl ErrorEntry {
    pub fn new(failure: &Failure, category: ErrorCategory, context: &str, attempt: u32) -> Self {
        Self {
            timestamp: Utc::now(),
            message: failure.message.clone(),
            code: failure.code.clone(),
            status: failure.status,
            category,
            context: context.to_string(),
            attempt,
            stack: failure.chain(),
        }
    }
}

/// Aggregate error counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorStats {
    /// Failures seen, including ones later retried
    pub total: u64,
    /// Failures followed by another attempt
    pub retried: u64,
    /// Operations that succeeded after at least one failure
    pub recovered: u64,
    /// Operations that ended on a fatal failure
    pub fatal: u64,
    /// Operations run through the retry loop
    pub operations: u64,
    /// Operations that ultimately failed
    pub failed_operations: u64,
    pub by_category: BTreeMap<ErrorCategory, u64>,
}

impl ErrorStats {
    /// Share of operations that ultimately failed
    pub fn error_rate(&self) -> f64 {
        ratio(self.failed_operations, self.operations)
    }

    /// Share of operations that saw a failure and still succeeded
    pub fn recovery_rate(&self) -> f64 {
        ratio(self.recovered, self.recovered + self.failed_operations)
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// How an operation run through the retry loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Succeeded first time
    Succeeded,
    /// Succeeded after at least one failure
    Recovered,
    Failed { fatal: bool },
}

/// Error history with aggregate counters
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: VecDeque<ErrorEntry>,
    stats: ErrorStats,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, trimming to the newest `LOG_RETAINED` once the log
    /// exceeds `LOG_CAPACITY`
    pub fn record(&mut self, entry: ErrorEntry) {
        self.stats.total += 1;
        *self.stats.by_category.entry(entry.category).or_insert(0) += 1;

        self.entries.push_back(entry);
        if self.entries.len() > LOG_CAPACITY {
            let excess = self.entries.len() - LOG_RETAINED;
            self.entries.drain(..excess);
        }
    }

    pub fn record_retry(&mut self) {
        self.stats.retried += 1;
    }

    pub fn record_outcome(&mut self, outcome: Outcome) {
        self.stats.operations += 1;
        match outcome {
            Outcome::Succeeded => {}
            Outcome::Recovered => self.stats.recovered += 1,
            Outcome::Failed { fatal } => {
                self.stats.failed_operations += 1;
                if fatal {
                    self.stats.fatal += 1;
                }
            }
        }
    }

    pub fn stats(&self) -> ErrorStats {
        self.stats.clone()
    }

    /// The newest `limit` entries, oldest first
    pub fn recent(&self, limit: usize) -> Vec<ErrorEntry> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats = ErrorStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> ErrorEntry {
        let failure = Failure::new(format!("failure {}", n));
        ErrorEntry::new(&failure, ErrorCategory::Unknown, "test", 0)
    }

    #[test]
    fn test_record_counts_by_category() {
        let mut log = ErrorLog::new();
        let failure = Failure::new("HTTP 503").with_status(503);
        log.record(ErrorEntry::new(&failure, ErrorCategory::ServerError, "fetch", 0));
        log.record(ErrorEntry::new(&failure, ErrorCategory::ServerError, "fetch", 1));
        log.record(entry(0));

        let stats = log.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_category.get(&ErrorCategory::ServerError), Some(&2));
        assert_eq!(stats.by_category.get(&ErrorCategory::Unknown), Some(&1));
    }

    #[test]
    fn test_log_trims_on_overflow() {
        let mut log = ErrorLog::new();
        for n in 0..LOG_CAPACITY {
            log.record(entry(n));
        }
        assert_eq!(log.len(), LOG_CAPACITY);

        log.record(entry(LOG_CAPACITY));
        assert_eq!(log.len(), LOG_RETAINED);

        let recent = log.recent(LOG_RETAINED);
        assert_eq!(recent.first().unwrap().message, "failure 501");
        assert_eq!(recent.last().unwrap().message, "failure 1000");
        assert_eq!(log.stats().total, (LOG_CAPACITY + 1) as u64);
    }

    #[test]
    fn test_recent_returns_newest() {
        let mut log = ErrorLog::new();
        for n in 0..5 {
            log.record(entry(n));
        }

        let recent: Vec<String> = log.recent(2).into_iter().map(|e| e.message).collect();
        assert_eq!(recent, vec!["failure 3", "failure 4"]);
        assert_eq!(log.recent(50).len(), 5);
    }

    #[test]
    fn test_rates() {
        let mut log = ErrorLog::new();
        log.record_outcome(Outcome::Succeeded);
        log.record_outcome(Outcome::Recovered);
        log.record_outcome(Outcome::Recovered);
        log.record_outcome(Outcome::Failed { fatal: true });

        let stats = log.stats();
        assert_eq!(stats.operations, 4);
        assert_eq!(stats.fatal, 1);
        assert!((stats.error_rate() - 0.25).abs() < f64::EPSILON);
        assert!((stats.recovery_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rates_without_traffic() {
        let stats = ErrorStats::default();
        assert_eq!(stats.error_rate(), 0.0);
        assert_eq!(stats.recovery_rate(), 0.0);
    }

    #[test]
    fn test_clear() {
        let mut log = ErrorLog::new();
        log.record(entry(0));
        log.record_outcome(Outcome::Failed { fatal: false });
        log.clear();

        assert!(log.is_empty());
        assert_eq!(log.stats(), ErrorStats::default());
    }
}
