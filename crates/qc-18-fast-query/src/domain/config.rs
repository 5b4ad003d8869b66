//! # Fast-Query Configuration
//!
//! Feature flags and limits for the watcher, the asynchronous commit
//! pipeline and the derived LRU indices.

use std::time::Duration;

use super::errors::WatcherError;

/// Default number of sealed epochs that may wait for persistence.
pub const DEFAULT_COMMIT_GAP_HEIGHT: usize = 100;

/// Default capacity of the state-slot and code LRU indices.
pub const DEFAULT_LRU_SIZE: usize = 1000;

/// What `commit` does when the persistence queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackpressurePolicy {
    /// Block the producer until the worker frees a slot.
    #[default]
    Block,
    /// Fail the commit with `WatcherError::Backpressure`.
    Reject,
}

/// Configuration for the fast-query subsystem.
#[derive(Debug, Clone)]
pub struct FastQueryConfig {
    /// Master switch. When false every producer call is a no-op and every
    /// query returns `Disabled`.
    pub enabled: bool,
    /// Route commits through the asynchronous commit processor.
    pub async_commit: bool,
    /// Maximum epochs queued for persistence before backpressure applies.
    pub commit_gap_height: usize,
    /// Capacity of each derived LRU index.
    pub lru_size: usize,
    /// Log a digest of persisted keys after every applied batch.
    pub check_watch_db: bool,
    /// Producer behavior on a full queue.
    pub backpressure: BackpressurePolicy,
    /// Retries for a failed store write before the write is dropped.
    pub persist_max_retries: u32,
    /// First retry delay; doubles on each attempt.
    pub persist_retry_backoff: Duration,
}

impl Default for FastQueryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            async_commit: false,
            commit_gap_height: DEFAULT_COMMIT_GAP_HEIGHT,
            lru_size: DEFAULT_LRU_SIZE,
            check_watch_db: false,
            backpressure: BackpressurePolicy::Block,
            persist_max_retries: 3,
            persist_retry_backoff: Duration::from_millis(50),
        }
    }
}

impl FastQueryConfig {
    /// Enabled watcher with default limits.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    pub fn with_async_commit(mut self, async_commit: bool) -> Self {
        self.async_commit = async_commit;
        self
    }

    pub fn with_commit_gap_height(mut self, gap: usize) -> Self {
        self.commit_gap_height = gap;
        self
    }

    pub fn with_lru_size(mut self, size: usize) -> Self {
        self.lru_size = size;
        self
    }

    pub fn with_check_watch_db(mut self, check: bool) -> Self {
        self.check_watch_db = check;
        self
    }

    pub fn with_backpressure(mut self, policy: BackpressurePolicy) -> Self {
        self.backpressure = policy;
        self
    }

    pub fn with_persist_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.persist_max_retries = max_retries;
        self.persist_retry_backoff = backoff;
        self
    }

    /// Reject limits that would make the pipeline unusable.
    pub fn validate(&self) -> Result<(), WatcherError> {
        if self.commit_gap_height == 0 {
            return Err(WatcherError::InvalidConfig(
                "commit_gap_height must be at least 1".to_string(),
            ));
        }
        if self.lru_size == 0 {
            return Err(WatcherError::InvalidConfig(
                "lru_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
