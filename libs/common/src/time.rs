//! Time provider abstraction
//!
//! Separates clock reads from the code that acts on them so timing
//! behavior (pulse deadlines, idle timeouts, sample slots) can be tested
//! deterministically with [`ManualTimeProvider`].

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Time provider trait for generating timestamps
pub trait TimeProvider: Send + Sync + 'static {
    /// Current timestamp in milliseconds since Unix epoch
    fn now_millis(&self) -> i64;

    /// Current timestamp in whole seconds since Unix epoch
    fn now_secs(&self) -> i64 {
        self.now_millis().div_euclid(1000)
    }
}

/// System time provider using the local wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        // A clock set before 1970 reads as the epoch
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock for simulations and tests
///
/// Shared through an `Arc`; every clone of the `Arc` observes the same time.
#[derive(Debug, Default)]
pub struct ManualTimeProvider {
    timestamp_ms: AtomicI64,
}

impl ManualTimeProvider {
    pub fn new(timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms: AtomicI64::new(timestamp_ms),
        }
    }

    pub fn set_millis(&self, timestamp_ms: i64) {
        self.timestamp_ms.store(timestamp_ms, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, delta: i64) -> i64 {
        self.timestamp_ms.fetch_add(delta, Ordering::SeqCst) + delta
    }

    pub fn advance_secs(&self, delta: i64) -> i64 {
        self.advance_millis(delta * 1000)
    }
}

impl TimeProvider for ManualTimeProvider {
    fn now_millis(&self) -> i64 {
        self.timestamp_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_provider() {
        let provider = SystemTimeProvider;
        let time1 = provider.now_millis();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let time2 = provider.now_millis();

        assert!(time2 >= time1);
        assert!(time2 - time1 >= 10);
        assert_eq!(provider.now_secs(), provider.now_millis() / 1000);
    }

    #[test]
    fn test_manual_time_provider() {
        let provider = ManualTimeProvider::new(1_000);
        assert_eq!(provider.advance_millis(250), 1_250);
        assert_eq!(provider.advance_secs(2), 3_250);
        assert_eq!(provider.now_secs(), 3);

        provider.set_millis(10);
        assert_eq!(provider.now_millis(), 10);
    }
}
