//! # Batch Pool
//!
//! Recycles the per-epoch message buffers.
//!
//! Ownership is explicit: the producer `acquire`s a buffer when an epoch
//! opens and hands it to the persistence worker at commit; the worker
//! `release`s it once the epoch is applied. A released buffer is always
//! cleared before it can be acquired again, so no message crosses epochs.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::message::WatchMessage;

/// Buffers kept for reuse; extras are dropped.
const MAX_POOLED: usize = 16;

#[derive(Debug, Default)]
pub struct BatchPool {
    free: Mutex<Vec<Vec<WatchMessage>>>,
}

impl BatchPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn acquire(&self) -> Vec<WatchMessage> {
        self.free.lock().pop().unwrap_or_default()
    }

    pub fn release(&self, mut buf: Vec<WatchMessage>) {
        buf.clear();
        let mut free = self.free.lock();
        if free.len() < MAX_POOLED {
            free.push(buf);
        }
    }

    pub fn available(&self) -> usize {
        self.free.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_released_buffer_is_reused_empty() {
        let pool = BatchPool::new();
        let mut buf = pool.acquire();
        buf.push(WatchMessage::latest_height(1));
        let cap = buf.capacity();
        pool.release(buf);
        assert_eq!(pool.available(), 1);

        let reused = pool.acquire();
        assert!(reused.is_empty());
        assert_eq!(reused.capacity(), cap);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_pool_is_bounded() {
        let pool = BatchPool::new();
        for _ in 0..MAX_POOLED + 4 {
            pool.release(Vec::new());
        }
        assert_eq!(pool.available(), MAX_POOLED);
    }
}
