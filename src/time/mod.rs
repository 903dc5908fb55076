//! System tick counter and tick/millisecond conversion.

use crate::config::TICK_FREQUENCY_HZ;
use portable_atomic::{AtomicU32, Ordering};

/// Global tick counter.
///
/// Incremented once per tick interrupt, inside the critical section. The
/// counter wraps at `u32::MAX`; elapsed time is measured with wrapping
/// subtraction from a start tick.
pub struct TickCounter {
    /// Number of ticks since launch
    ticks: AtomicU32,
    /// Tick frequency in Hz
    frequency: u32,
}

impl TickCounter {
    /// Create a new tick counter with the given frequency.
    ///
    /// # Arguments
    ///
    /// * `frequency` - Timer frequency in Hz
    pub const fn new(frequency: u32) -> Self {
        Self {
            ticks: AtomicU32::new(0),
            frequency,
        }
    }

    /// Advance time by one tick and return the new tick count.
    pub fn advance(&self) -> u32 {
        self.ticks.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    /// Get the current tick count.
    pub fn ticks(&self) -> u32 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Get the tick frequency in Hz.
    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// Convert milliseconds to ticks, rounding up.
    pub fn millis_to_ticks(&self, millis: u32) -> u32 {
        let ticks = (millis as u64 * self.frequency as u64).div_ceil(1000);
        ticks.min(u32::MAX as u64) as u32
    }

    #[cfg(test)]
    pub(crate) fn set(&self, ticks: u32) {
        self.ticks.store(ticks, Ordering::Release);
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new(TICK_FREQUENCY_HZ)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counter() {
        let counter = TickCounter::new(1000);
        assert_eq!(counter.ticks(), 0);
        assert_eq!(counter.frequency(), 1000);

        assert_eq!(counter.advance(), 1);
        assert_eq!(counter.ticks(), 1);
    }

    #[test]
    fn test_counter_wraps() {
        let counter = TickCounter::new(1000);
        counter.set(u32::MAX);
        assert_eq!(counter.advance(), 0);
    }

    #[test]
    fn test_millis_to_ticks() {
        let khz = TickCounter::new(1000);
        assert_eq!(khz.millis_to_ticks(0), 0);
        assert_eq!(khz.millis_to_ticks(100), 100);

        let slow = TickCounter::new(100);
        assert_eq!(slow.millis_to_ticks(1), 1);
        assert_eq!(slow.millis_to_ticks(25), 3);
    }
}
