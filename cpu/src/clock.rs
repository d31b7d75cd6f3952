//! Simulation of elapsed time in the simulated system.
//!
//! Time only moves when the machine does something: each instruction
//! and each DMA cycle advances the clock by an estimate of how long
//! the real hardware would have taken.  Device events are scheduled
//! against this clock.
use std::time::Duration;

/// Clock is a simulated system clock.
pub trait Clock {
    /// Retrieves the current (simulated) time.
    fn now(&self) -> Duration;

    /// Simulate the passing of `interval`.
    fn consume(&mut self, interval: &Duration);
}

/// BasicClock provides a simulated clock which starts at zero.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use cpu::{BasicClock, Clock};
/// let mut clk = BasicClock::new();
/// clk.consume(&Duration::from_nanos(560));
/// assert_eq!(clk.now(), Duration::from_nanos(560));
/// ```
#[derive(Debug, Default)]
pub struct BasicClock {
    elapsed: Duration,
}

impl BasicClock {
    pub fn new() -> BasicClock {
        BasicClock::default()
    }
}

impl Clock for BasicClock {
    fn now(&self) -> Duration {
        self.elapsed
    }

    fn consume(&mut self, interval: &Duration) {
        self.elapsed = self.elapsed.saturating_add(*interval);
    }
}
