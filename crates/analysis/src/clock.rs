#![forbid(unsafe_code)]

use async_trait::async_trait;
use std::time::Duration;

/// Time source for the analysis procedure. The execution-timeout wait goes
/// through here so tests never sleep for real.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
