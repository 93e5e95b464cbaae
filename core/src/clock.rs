//! A time source injected into the handler rather than read from a global, so that
//! override-cache decay (`user_override::Cache`) is deterministic under test.

use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock {
    /// Seconds since an arbitrary but monotonic-for-this-process epoch.
    fn now_secs(&self) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }
}

#[cfg(test)]
pub struct FakeClock {
    pub secs: std::cell::Cell<f64>,
}

#[cfg(test)]
impl FakeClock {
    pub fn new(start: f64) -> Self {
        Self { secs: std::cell::Cell::new(start) }
    }

    pub fn advance(&self, delta: f64) {
        self.secs.set(self.secs.get() + delta);
    }
}

#[cfg(test)]
impl Clock for FakeClock {
    fn now_secs(&self) -> f64 {
        self.secs.get()
    }
}
