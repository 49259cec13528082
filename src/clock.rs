use std::thread;
use std::time::{Duration, Instant};

/// Monotonic time source for the send poll loop.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;

    /// Give up the processor for at least `duration`. Zero means a bare yield.
    fn pause(&self, duration: Duration);
}

/// Wall-clock time backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn pause(&self, duration: Duration) {
        if duration.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(duration);
        }
    }
}
