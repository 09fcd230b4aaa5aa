//! Clock abstraction and input pacing primitives.
//!
//! Every timing decision in the engine (fetch rate limiting, input
//! throttling, pool sweeps, frame pacing) goes through [`Clock`] so the
//! behavior is reproducible in native tests with [`ManualClock`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic-enough millisecond clock.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Test clock advanced by hand.
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            bits: AtomicU64::new(start_ms.to_bits()),
        }
    }

    pub fn set(&self, ms: f64) {
        self.bits.store(ms.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, delta_ms: f64) {
        let next = f64::from_bits(self.bits.load(Ordering::Relaxed)) + delta_ms;
        self.bits.store(next.to_bits(), Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Leading-edge gate keyed on the timestamp of the last processed event.
///
/// The first event always passes; later events pass only once the
/// configured interval has elapsed since the last one that passed.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval_ms: f64,
    last_ms: f64,
}

impl Throttle {
    pub fn new(interval_ms: f64) -> Self {
        Self {
            interval_ms,
            last_ms: f64::NEG_INFINITY,
        }
    }

    pub fn ready(&mut self, now_ms: f64) -> bool {
        if now_ms - self.last_ms >= self.interval_ms {
            self.last_ms = now_ms;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.last_ms = f64::NEG_INFINITY;
    }
}

/// Debounce gate that also short-circuits when the input changed.
///
/// `should_run(now, changed)` fires immediately on a change and
/// otherwise at most once per window.
#[derive(Debug, Clone)]
pub struct Debounce {
    window_ms: f64,
    last_run_ms: f64,
}

impl Debounce {
    pub fn new(window_ms: f64) -> Self {
        Self {
            window_ms,
            last_run_ms: f64::NEG_INFINITY,
        }
    }

    pub fn should_run(&mut self, now_ms: f64, input_changed: bool) -> bool {
        if input_changed || now_ms - self.last_run_ms >= self.window_ms {
            self.last_run_ms = now_ms;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_passes_first_event_then_gates() {
        let mut gate = Throttle::new(16.0);
        assert!(gate.ready(1_000.0));
        assert!(!gate.ready(1_010.0));
        assert!(gate.ready(1_016.0));
        assert!(!gate.ready(1_020.0));
    }

    #[test]
    fn debounce_fires_on_change_or_window() {
        let mut gate = Debounce::new(1_000.0);
        assert!(gate.should_run(0.0, false));
        assert!(!gate.should_run(500.0, false));
        assert!(gate.should_run(600.0, true));
        assert!(gate.should_run(1_700.0, false));
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(100.0);
        clock.advance(50.0);
        assert_eq!(clock.now_ms(), 150.0);
    }
}
