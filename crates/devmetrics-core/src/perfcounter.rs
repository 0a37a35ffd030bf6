//! Performance counter used to time-stamp report builds.
//!
//! The counter mirrors a free-running 32-bit hardware timer whose overflow
//! interrupt bumps a separate counter; `value()` joins the two into one
//! 64-bit tick count.

use std::time::{Duration, Instant};

/// Tick rate of [`InstantCounter`] unless configured otherwise.
pub const DEFAULT_FREQUENCY_HZ: u32 = 10_000_000;

const REGISTER_WIDTH: u32 = u32::BITS;

/// Monotonic tick source.
pub trait PerfCounter: Send {
    /// Starts counting from zero.
    fn open(&mut self);

    /// Stops the counter. `value()` returns 0 until the next `open`.
    fn close(&mut self);

    /// Ticks elapsed since `open`.
    fn value(&self) -> u64;

    fn frequency_hz(&self) -> u32;
}

/// Joins an overflow count and a 32-bit register into one tick value.
pub fn compose_ticks(overflows: u32, register: u32) -> u64 {
    (u64::from(overflows) << REGISTER_WIDTH) | u64::from(register)
}

/// Converts a tick delta to wall time at the given rate.
pub fn ticks_to_duration(ticks: u64, frequency_hz: u32) -> Duration {
    if frequency_hz == 0 {
        return Duration::ZERO;
    }
    let nanos = u128::from(ticks) * 1_000_000_000 / u128::from(frequency_hz);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Software counter backed by [`Instant`].
#[derive(Debug)]
pub struct InstantCounter {
    frequency_hz: u32,
    started: Option<Instant>,
}

impl InstantCounter {
    pub fn new() -> Self {
        Self::with_frequency(DEFAULT_FREQUENCY_HZ)
    }

    pub fn with_frequency(frequency_hz: u32) -> Self {
        Self {
            frequency_hz: frequency_hz.max(1),
            started: None,
        }
    }

    fn elapsed_ticks(&self, started: Instant) -> u64 {
        let nanos = started.elapsed().as_nanos();
        let ticks = nanos * u128::from(self.frequency_hz) / 1_000_000_000;
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }
}

impl Default for InstantCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl PerfCounter for InstantCounter {
    fn open(&mut self) {
        self.started = Some(Instant::now());
    }

    fn close(&mut self) {
        self.started = None;
    }

    fn value(&self) -> u64 {
        let Some(started) = self.started else {
            return 0;
        };
        let ticks = self.elapsed_ticks(started);
        let overflows = (ticks >> REGISTER_WIDTH) as u32;
        compose_ticks(overflows, ticks as u32)
    }

    fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_ticks() {
        assert_eq!(compose_ticks(0, 7), 7);
        assert_eq!(compose_ticks(1, 0), 1 << 32);
        assert_eq!(compose_ticks(2, u32::MAX), (3 << 32) - 1);
    }

    #[test]
    fn test_ticks_to_duration() {
        assert_eq!(
            ticks_to_duration(10_000_000, DEFAULT_FREQUENCY_HZ),
            Duration::from_secs(1)
        );
        assert_eq!(ticks_to_duration(5, 10), Duration::from_millis(500));
        assert_eq!(ticks_to_duration(5, 0), Duration::ZERO);
    }

    #[test]
    fn test_closed_counter_reads_zero() {
        let mut counter = InstantCounter::new();
        assert_eq!(counter.value(), 0);

        counter.open();
        std::thread::sleep(Duration::from_millis(2));
        assert!(counter.value() > 0);

        counter.close();
        assert_eq!(counter.value(), 0);
    }

    #[test]
    fn test_counter_is_monotonic() {
        let mut counter = InstantCounter::with_frequency(1_000_000_000);
        counter.open();
        let first = counter.value();
        let second = counter.value();
        assert!(second >= first);
        assert_eq!(counter.frequency_hz(), 1_000_000_000);
    }
}
