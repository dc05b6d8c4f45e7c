//! ## gemini-core::time
//! **Wall clocks for interval bookkeeping**
//!
//! All monitor timestamps are milliseconds since the Unix epoch. Production
//! code uses [`SystemClock`]; tests and the simulator drive a [`ManualClock`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};

/// Source of wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// The operating system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    offset: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock reading `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            offset: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Advances the clock by `ms` milliseconds.
    #[inline]
    pub fn advance(&self, ms: u64) {
        self.offset.fetch_add(ms, Ordering::Release);
    }

    /// Jumps the clock to an absolute time.
    pub fn set(&self, ms: u64) {
        self.offset.store(ms, Ordering::Release);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        self.offset.load(Ordering::Acquire)
    }
}

/// Renders an epoch-millisecond timestamp for display.
pub fn to_datetime(ms: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .unwrap_or_default()
}
