use async_trait::async_trait;
use std::time::Duration;
use time::OffsetDateTime;

/// Time source for the license policy and the monitor's wait.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;

    async fn sleep(&self, period: Duration);
}

/// Wall clock backed by tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    async fn sleep(&self, period: Duration) {
        tokio::time::sleep(period).await
    }
}
