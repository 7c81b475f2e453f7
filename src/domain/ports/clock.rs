use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Wall time and pacing.
///
/// Step pacing and simulated planning latency go through this trait so tests
/// can run with zero delay and a fixed notion of "now".
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Wait for `duration`. Implementations may return immediately.
    async fn sleep(&self, duration: Duration);
}
