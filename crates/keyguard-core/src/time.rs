//! Injectable time sources
//!
//! Enforcement needs two clocks with different trust properties:
//!
//! - a monotonic, boot-relative clock for relative times (rate limits, token
//!   age, lock time), which must never skip or run backwards;
//! - a wall clock for activation and expiration dates, which may be
//!   unavailable or untrusted on some security levels.
//!
//! Both are expressed through [`TimeSource`] so tests can substitute a
//! [`SimulatedClock`] and step through time deterministically.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Source of millisecond timestamps.
pub trait TimeSource: Send + Sync {
    /// Current time in milliseconds from this source's origin
    fn now_ms(&self) -> u64;

    /// Check if this is a simulated time source
    fn is_simulated(&self) -> bool {
        false
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }

    fn is_simulated(&self) -> bool {
        (**self).is_simulated()
    }
}

/// Boot-relative monotonic clock (production use)
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Start a clock at zero now
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
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Wall clock, milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now_ms(&self) -> u64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            Err(err) => {
                tracing::warn!(error = %err, "system time is before the Unix epoch");
                0
            }
        }
    }
}

/// Simulated time source (for testing and time-travel debugging)
///
/// Clones share the same underlying time, so a test can hold one handle
/// while the engine reads another.
#[derive(Debug, Clone, Default)]
pub struct SimulatedClock {
    current_ms: Arc<Mutex<u64>>,
}

impl SimulatedClock {
    /// Create a clock reading `initial_ms`
    pub fn new(initial_ms: u64) -> Self {
        Self {
            current_ms: Arc::new(Mutex::new(initial_ms)),
        }
    }

    /// Create starting at a recent wall-clock time (2025-01-01 00:00:00 UTC)
    pub fn from_recent() -> Self {
        Self::new(1_735_689_600_000)
    }

    /// Advance by `ms` milliseconds
    pub fn advance_ms(&self, ms: u64) {
        let mut now = self.current_ms.lock();
        *now = now.saturating_add(ms);
    }

    /// Advance by whole seconds
    pub fn advance_secs(&self, secs: u64) {
        self.advance_ms(secs.saturating_mul(1000));
    }

    /// Jump to an absolute time
    pub fn set_ms(&self, ms: u64) {
        *self.current_ms.lock() = ms;
    }
}

impl TimeSource for SimulatedClock {
    fn now_ms(&self) -> u64 {
        *self.current_ms.lock()
    }

    fn is_simulated(&self) -> bool {
        true
    }
}
