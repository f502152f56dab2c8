//! Wall-clock sources producing epoch milliseconds.
//!
//! The limiter never reads the time itself; it is handed a [`Clock`] so that
//! window arithmetic can be driven deterministically in tests via
//! [`ManualClock`].

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{LimiterError, Result};

/// A source of wall-clock time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// Returns the current time, or [`LimiterError::Clock`] if it cannot be read.
    fn now_ms(&self) -> Result<i64>;
}

/// Reads [`SystemTime::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Result<i64> {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| LimiterError::Clock(e.to_string()))?;
        i64::try_from(elapsed.as_millis())
            .map_err(|_| LimiterError::Clock("epoch milliseconds overflow i64".into()))
    }
}

/// A manually advanced clock for tests and simulations.
///
/// Clones share the same underlying instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    /// Creates a clock frozen at `start_ms`.
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    /// Moves the clock to an absolute instant.
    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    /// Moves the clock forward by `delta_ms`.
    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Result<i64> {
        Ok(self.now.load(Ordering::SeqCst))
    }
}
