//! Timestamps for local writes.
//!
//! Last-write-wins comparisons need every local write to carry a distinct,
//! increasing `updated_at`. [`SystemClock`] reads wall time but never hands
//! out the same or a smaller value twice.

use crate::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of write timestamps (milliseconds since epoch).
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock, strictly monotonic per instance.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicU64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn wall_millis() -> Timestamp {
        chrono::Utc::now().timestamp_millis().max(0) as Timestamp
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let wall = Self::wall_millis();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Hand-driven clock. Each call to `now` advances by `step`.
#[derive(Debug)]
pub struct ManualClock {
    current: AtomicU64,
    step: u64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self::with_step(start, 1)
    }

    pub fn with_step(start: Timestamp, step: u64) -> Self {
        Self {
            current: AtomicU64::new(start),
            step,
        }
    }

    /// Move the clock forward without reading it.
    pub fn advance(&self, millis: u64) {
        self.current.fetch_add(millis, Ordering::AcqRel);
    }

    /// Current value without advancing.
    pub fn peek(&self) -> Timestamp {
        self.current.load(Ordering::Acquire)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.current.fetch_add(self.step, Ordering::AcqRel)
    }
}
