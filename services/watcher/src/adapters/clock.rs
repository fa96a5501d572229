//! services/watcher/src/adapters/clock.rs
//!
//! The wall clock, backed by the system time and Tokio's timer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use owl_watcher_core::ports::Clock;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default)]
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
