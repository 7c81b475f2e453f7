//! Clock adapters: tokio wall time and a manual clock for tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::ports::Clock;

/// Wall-clock time with real `tokio` sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that never waits. Sleeping advances the stored time instead.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    /// Move time forward without waiting.
    pub fn advance(&self, by: Duration) {
        let delta = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        if let Ok(mut now) = self.now.lock() {
            *now += delta;
        }
    }
}

impl Default for ManualClock {
    /// Starts at 2024-01-01T12:00:00Z.
    fn default() -> Self {
        let start = Utc
            .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::new(start)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map_or_else(|poisoned| *poisoned.into_inner(), |now| *now)
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_sleep_advances_time() {
        let clock = ManualClock::default();
        let start = clock.now();
        clock.sleep(Duration::from_secs(90)).await;
        assert_eq!(clock.now() - start, chrono::Duration::seconds(90));
    }

    #[tokio::test]
    async fn test_system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now();
        clock.sleep(Duration::from_millis(1)).await;
        assert!(clock.now() >= a);
    }
}
