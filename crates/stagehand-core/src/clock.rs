#![forbid(unsafe_code)]

//! Monotonic clocks.
//!
//! The engine itself never reads a clock: it is advanced by the host with an
//! explicit `now`. These clocks are what hosts use to produce that value,
//! either from wall time ([`MonotonicClock`]) or from a manually advanced
//! counter ([`DeterministicClock`]) for tests and headless replays.

use std::time::{Duration, Instant};

/// A source of monotonic time, measured from an arbitrary origin.
pub trait Clock {
    /// Time elapsed since the clock's origin.
    fn now_mono(&self) -> Duration;
}

/// Host-driven clock that only moves when told to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeterministicClock {
    now: Duration,
}

impl DeterministicClock {
    /// Create a clock at time zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Duration::ZERO,
        }
    }

    /// Advance the clock by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        self.now = self.now.saturating_add(dt);
    }

    /// Set the clock to an absolute time. Never moves backwards.
    pub fn set(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }
}

impl Clock for DeterministicClock {
    fn now_mono(&self) -> Duration {
        self.now
    }
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    /// Create a clock whose origin is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now_mono(&self) -> Duration {
        self.origin.elapsed()
    }
}
