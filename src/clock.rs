//! Time sources. Two disjoint domains, never mixed: wall-clock (display only)
//! and monotonic (all timing, decay, and rate-limit math).
//!
//! Using wall-clock time for any timing-derived decision is a contract
//! violation (see `SPEC_FULL.md` §3). This module exists so that every
//! timing call site takes a [`Clock`] rather than reaching for
//! `SystemTime::now()` directly, and so tests can swap in a fake that
//! advances deterministically.

use std::time::{SystemTime, UNIX_EPOCH};

/// Time source for the engine. Implementors provide both domains; callers
/// are responsible for never handing a wall-clock reading to a timing
/// computation.
pub trait Clock: Send + Sync {
    /// Current wall-clock time in milliseconds since the Unix epoch.
    /// Display/serialization only; may jump backwards (NTP slew, user clock
    /// changes). Never use this for timing math.
    fn wall_clock_now_ms(&self) -> i64;

    /// Current monotonic time in milliseconds. Never decreases for the
    /// lifetime of the clock. The sole time source for decay, cooldowns,
    /// rate limits, and windowing.
    fn monotonic_now_ms(&self) -> i64;
}

/// Production clock backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn wall_clock_now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }

    fn monotonic_now_ms(&self) -> i64 {
        // `Instant` has no fixed epoch, so we anchor to the process start
        // and report elapsed milliseconds; this is monotonic by construction.
        use std::sync::OnceLock;
        use std::time::Instant;
        static START: OnceLock<Instant> = OnceLock::new();
        let start = *START.get_or_init(Instant::now);
        i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX)
    }
}

/// Deterministic fake clock for tests. Both domains are controlled
/// independently by the test so that backward-time and skew scenarios can be
/// constructed directly.
#[derive(Clone, Debug, Default)]
pub struct FakeClock {
    wall_ms: std::cell::Cell<i64>,
    mono_ms: std::cell::Cell<i64>,
}

impl FakeClock {
    /// Builds a fake clock starting both domains at `start_ms`.
    #[must_use]
    pub fn new(start_ms: i64) -> Self {
        Self {
            wall_ms: std::cell::Cell::new(start_ms),
            mono_ms: std::cell::Cell::new(start_ms),
        }
    }

    /// Advances both domains forward by `delta_ms` (must be >= 0).
    pub fn advance(&self, delta_ms: i64) {
        self.wall_ms.set(self.wall_ms.get() + delta_ms);
        self.mono_ms.set(self.mono_ms.get() + delta_ms);
    }

    /// Sets the monotonic reading directly, including backwards, to exercise
    /// the engine's backward-time handling in tests.
    pub fn set_monotonic(&self, mono_ms: i64) {
        self.mono_ms.set(mono_ms);
    }

    /// Sets the wall-clock reading directly, independent of monotonic time.
    pub fn set_wall_clock(&self, wall_ms: i64) {
        self.wall_ms.set(wall_ms);
    }
}

impl Clock for FakeClock {
    fn wall_clock_now_ms(&self) -> i64 {
        self.wall_ms.get()
    }

    fn monotonic_now_ms(&self) -> i64 {
        self.mono_ms.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_both_domains() {
        let clock = FakeClock::new(1_000);
        clock.advance(500);
        assert_eq!(clock.monotonic_now_ms(), 1_500);
        assert_eq!(clock.wall_clock_now_ms(), 1_500);
    }

    #[test]
    fn fake_clock_domains_are_independent() {
        let clock = FakeClock::new(1_000);
        clock.set_wall_clock(50);
        assert_eq!(clock.wall_clock_now_ms(), 50);
        assert_eq!(clock.monotonic_now_ms(), 1_000);
    }
}
