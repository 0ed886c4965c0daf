//! Minimum spacing between invocations of the same step

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{execute_step, Context, Step, Transaction};

/// Per-identity slot book
///
/// Each caller reserves the next free slot under the lock and sleeps until
/// it outside the lock, so concurrent callers are spaced `interval` apart.
#[derive(Debug, Default)]
pub struct Throttle {
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl Throttle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the next slot of `key`
    pub async fn acquire(&self, key: &str, interval: Duration) {
        let slot = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = slots.get(key).copied().filter(|s| *s > now).unwrap_or(now);
            slots.insert(key.to_string(), slot + interval);
            slot
        };
        if slot > Instant::now() {
            tracing::trace!(key, wait_ms = (slot - Instant::now()).as_millis() as u64, "throttled");
            tokio::time::sleep_until(slot).await;
        }
    }

    pub async fn run(&self, step: &Step, interval: Duration, context: &Context) -> Transaction {
        self.acquire(&step.identity(), interval).await;
        execute_step(step, context).await
    }
}
