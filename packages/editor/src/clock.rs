//! Time source for operation timestamps and suppression windows.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync + Debug {
    /// Monotonic instant, used for tag expiry
    fn now(&self) -> Instant;

    /// Wall-clock milliseconds since the Unix epoch, used for operation timestamps
    fn timestamp_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn timestamp_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    base_millis: i64,
    elapsed_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(base_millis: i64) -> Self {
        Self {
            origin: Instant::now(),
            base_millis,
            elapsed_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared across clones
    pub fn advance(&self, by: Duration) {
        self.elapsed_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    fn elapsed(&self) -> u64 {
        self.elapsed_ms.load(Ordering::SeqCst)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(1_700_000_000_000)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_millis(self.elapsed())
    }

    fn timestamp_millis(&self) -> i64 {
        self.base_millis + self.elapsed() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances_all_clones() {
        let clock = ManualClock::new(1_000);
        let handle = clock.clone();
        let start = clock.now();

        handle.advance(Duration::from_millis(250));

        assert_eq!(clock.now() - start, Duration::from_millis(250));
        assert_eq!(clock.timestamp_millis(), 1_250);
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.timestamp_millis() > 1_577_836_800_000);
    }
}
