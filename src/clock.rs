//! Time source for record timestamps.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Port for getting the current time.
pub trait Clock: Send + Sync {
    /// Get the current Unix timestamp in milliseconds.
    fn now_millis(&self) -> i64;
}

/// System clock using the OS time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Hands out strictly increasing millisecond stamps.
///
/// Two mutations inside the same millisecond still get distinct
/// `update_at` values, so change tags derived from them always move.
#[derive(Clone)]
pub struct Stamper {
    clock: Arc<dyn Clock>,
    last: Arc<AtomicI64>,
}

impl Stamper {
    /// Create a new [`Stamper`] over `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Wall time, without the monotonic guarantee.
    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Next stamp, never lower than the wall time and always above the
    /// previous stamp.
    pub fn next(&self) -> i64 {
        let now = self.clock.now_millis();
        let mut last = self.last.load(Ordering::Acquire);

        loop {
            let candidate = now.max(last + 1);
            match self.last.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return candidate,
                Err(current) => last = current,
            }
        }
    }

    /// Make sure future stamps land above `stamp`.
    pub fn observe(&self, stamp: i64) {
        self.last.fetch_max(stamp, Ordering::AcqRel);
    }
}

impl Default for Stamper {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[cfg(test)]
pub struct FixedClock {
    timestamp: i64,
}

#[cfg(test)]
impl FixedClock {
    pub fn new(timestamp: i64) -> Self {
        Self { timestamp }
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamps_increase_on_frozen_clock() {
        let stamper = Stamper::new(Arc::new(FixedClock::new(1_000)));

        assert_eq!(stamper.next(), 1_000);
        assert_eq!(stamper.next(), 1_001);
        assert_eq!(stamper.next(), 1_002);
        assert_eq!(stamper.now(), 1_000);
    }

    #[test]
    fn test_observe_pushes_watermark() {
        let stamper = Stamper::new(Arc::new(FixedClock::new(10)));
        stamper.observe(500);

        assert_eq!(stamper.next(), 501);
    }
}
