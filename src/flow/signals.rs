//! Named in-process events
//!
//! Payloads queue per name until someone waits for them, so an `activate`
//! that happens before the matching `wait` is not lost.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::interpreter::types::Val;

#[derive(Default)]
struct Channel {
    pending: VecDeque<Val>,
    notify: Arc<Notify>,
}

#[derive(Default)]
pub struct Signals {
    channels: Mutex<HashMap<String, Channel>>,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `payload` under `name` and wake one waiter
    pub fn activate(&self, name: &str, payload: Val) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        let channel = channels.entry(name.to_string()).or_default();
        channel.pending.push_back(payload);
        channel.notify.notify_one();
        tracing::debug!(signal = name, queued = channel.pending.len(), "signal activated");
    }

    /// Take the next payload for `name` without waiting
    pub fn try_take(&self, name: &str) -> Option<Val> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.get_mut(name)?.pending.pop_front()
    }

    /// Suspend until a payload for `name` is available
    pub async fn wait(&self, name: &str) -> Val {
        loop {
            let notify = {
                let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
                let channel = channels.entry(name.to_string()).or_default();
                if let Some(payload) = channel.pending.pop_front() {
                    return payload;
                }
                channel.notify.clone()
            };
            notify.notified().await;
        }
    }
}

impl std::fmt::Debug for Signals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signals").finish_non_exhaustive()
    }
}
