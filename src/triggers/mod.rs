//! # Reactive triggers
//!
//! A root-level pair whose key is a call (`on_message(): handle(event)`) is an
//! event trigger; one whose key is a five-field tuple (`(0, 9, *, *, 1):
//! report()`) is a cron trigger. The interpreter records them instead of
//! evaluating them, and the `TriggerScheduler` runs one background loop per
//! trigger until it is shut down.

pub mod cron;

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::flow::{Context, EVENT_KEY};
use crate::interpreter::types::{Env, Node, Span, TypeRegistry, Val};
use crate::interpreter::Interpreter;

pub use cron::{Clock, CronPattern};

#[derive(Debug, Clone)]
pub enum TriggerCondition {
    /// Call polled for events; truthy data is an event
    Event(Node),
    Cron(CronPattern),
}

#[derive(Debug, Clone)]
pub struct Trigger {
    pub condition: TriggerCondition,
    pub action: Node,
    /// Scope the trigger was declared in
    pub env: Env,
    pub span: Span,
}

impl Trigger {
    /// Recognize a trigger among the root dictionary's pairs
    pub fn detect(key: &Node, value: &Node, env: &Env, span: Span) -> Option<Trigger> {
        let condition = match key {
            Node::Call { .. } => TriggerCondition::Event(key.clone()),
            Node::Tuple { items, .. } => TriggerCondition::Cron(CronPattern::from_nodes(items)?),
            _ => return None,
        };
        Some(Trigger {
            condition,
            action: value.clone(),
            env: env.clone(),
            span,
        })
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.condition {
            TriggerCondition::Event(Node::Call { name, .. }) => write!(f, "event {name}()"),
            TriggerCondition::Event(other) => write!(f, "event {}", other.tag()),
            TriggerCondition::Cron(pattern) => write!(f, "cron ({pattern})"),
        }?;
        write!(f, " at {}", self.span.start_label())
    }
}

/* ===================== Scheduler ===================== */

#[derive(Debug, Clone)]
pub struct TriggerSettings {
    /// Sleep after a poll that produced no event
    pub event_poll_interval: Duration,
    /// Sleep after a poll that failed
    pub event_error_backoff: Duration,
    /// Time cron patterns are matched against
    pub clock: Clock,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            event_poll_interval: Duration::from_millis(1000),
            event_error_backoff: Duration::from_millis(5000),
            clock: Clock::system(),
        }
    }
}

/// Owns the background loops of a set of triggers
pub struct TriggerScheduler {
    types: Arc<TypeRegistry>,
    context: Context,
    settings: TriggerSettings,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl TriggerScheduler {
    pub fn new(types: Arc<TypeRegistry>, context: Context, settings: TriggerSettings) -> Self {
        Self {
            types,
            context,
            settings,
            cancel: CancellationToken::new(),
            tasks: JoinSet::new(),
        }
    }

    pub fn spawn(&mut self, trigger: Trigger) {
        let runner = TriggerRunner {
            trigger,
            types: self.types.clone(),
            context: self.context.clone(),
            settings: self.settings.clone(),
            cancel: self.cancel.child_token(),
        };
        tracing::info!(trigger = %runner.trigger, "starting trigger");
        self.tasks.spawn(runner.run());
    }

    pub fn spawn_all(&mut self, triggers: impl IntoIterator<Item = Trigger>) {
        for trigger in triggers {
            self.spawn(trigger);
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Token cancelled by `shutdown`
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel every loop and wait for all of them to stop
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(err) = joined {
                tracing::warn!(error = %err, "trigger task ended abnormally");
            }
        }
        tracing::info!("trigger scheduler stopped");
    }
}

struct TriggerRunner {
    trigger: Trigger,
    types: Arc<TypeRegistry>,
    context: Context,
    settings: TriggerSettings,
    cancel: CancellationToken,
}

impl TriggerRunner {
    async fn run(self) {
        match self.trigger.condition.clone() {
            TriggerCondition::Event(condition) => self.event_loop(&condition).await,
            TriggerCondition::Cron(pattern) => self.cron_loop(pattern).await,
        }
        tracing::debug!(trigger = %self.trigger, "trigger loop exited");
    }

    /// Sleep unless cancelled first; false once cancelled
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    async fn event_loop(&self, condition: &Node) {
        let probe = self.context.clone().with_value("system", Val::Bool(true));
        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            let mut interpreter =
                Interpreter::nested(self.trigger.env.clone(), self.types.clone(), probe.clone());
            let polled = tokio::select! {
                _ = self.cancel.cancelled() => return,
                polled = interpreter.visit(condition, self.trigger.env.clone()) => polled,
            };

            let wait = match polled {
                Ok((event, _)) if event.is_truthy() => {
                    tracing::debug!(trigger = %self.trigger, "event received");
                    self.fire(Some(event)).await;
                    tokio::task::yield_now().await;
                    continue;
                }
                Ok(_) => self.settings.event_poll_interval,
                Err(err) => {
                    tracing::warn!(trigger = %self.trigger, error = %err, "event poll failed");
                    self.settings.event_error_backoff
                }
            };
            if !self.pause(wait).await {
                return;
            }
        }
    }

    async fn cron_loop(&self, pattern: CronPattern) {
        let mut last_fired = None;
        loop {
            let now = self.settings.clock.now();
            let minute = now.timestamp().div_euclid(60);
            if pattern.matches(&now) && last_fired != Some(minute) {
                last_fired = Some(minute);
                tracing::debug!(trigger = %self.trigger, at = %now, "cron tick");
                self.fire(None).await;
            }
            if !self.pause(cron::until_next_minute(&self.settings.clock.now())).await {
                return;
            }
        }
    }

    /// Evaluate the action; with an event, `event` is bound in scope and context
    async fn fire(&self, event: Option<Val>) {
        let (env, context) = match event {
            Some(event) => (
                self.trigger.env.bind(EVENT_KEY, event.clone()),
                self.context.clone().with_value(EVENT_KEY, event),
            ),
            None => (self.trigger.env.clone(), self.context.clone()),
        };
        let mut interpreter = Interpreter::nested(env.clone(), self.types.clone(), context);
        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => return,
            outcome = interpreter.visit(&self.trigger.action, env) => outcome,
        };
        match outcome {
            Ok((value, _)) => tracing::debug!(trigger = %self.trigger, result = %value, "trigger action done"),
            Err(err) => tracing::warn!(trigger = %self.trigger, error = %err, "trigger action failed"),
        }
    }
}
