//! Time sources for limiters that read the clock themselves.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

/// A source of the current time, in seconds.
///
/// Implementations used with a single limiter must be non-decreasing.
pub trait TimeSource: Send + Sync {
    /// Current time in seconds.
    fn now(&self) -> f64;
}

/// Wall-clock time in seconds since the UNIX epoch.
///
/// The wall clock can step backwards; prefer [`MonotonicClock`] unless the
/// timestamps must be comparable across processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> f64 {
        chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }
}

/// Seconds elapsed since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock starting at zero.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// A manually driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    current: Arc<Mutex<f64>>,
}

impl ManualClock {
    /// Create a clock reading `start`.
    pub fn new(start: f64) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Set the current time.
    pub fn set(&self, now: f64) {
        *self.current.lock() = now;
    }

    /// Move the clock forward by `secs`.
    pub fn advance(&self, secs: f64) {
        *self.current.lock() += secs;
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> f64 {
        *self.current.lock()
    }
}
