//! Combinators that recover from failures

use std::time::Duration;
use tokio::task::JoinSet;

use crate::flow::transaction::error_object;
use crate::flow::{execute_step, Context, Step, Transaction};
use crate::interpreter::types::Val;

/// Error fragments that mark a failure as transient
pub const DEFAULT_RETRYABLE_ERRORS: [&str; 5] =
    ["timeout", "connection", "network", "busy", "unavailable"];

/// Re-run `step` until it succeeds, at most `attempts` times
///
/// Sleeps `delay` between attempts, not after the last one. Returns the
/// first success or the last failure.
pub async fn retry(step: &Step, attempts: u32, delay: Duration, context: &Context) -> Transaction {
    retry_while(step, attempts, delay, context, |_| true).await
}

/// Like `retry`, but only failures whose error text contains one of
/// `retryable` (case-insensitive) are retried; others return at once
pub async fn retry_on(
    step: &Step,
    attempts: u32,
    delay: Duration,
    retryable: &[String],
    context: &Context,
) -> Transaction {
    retry_while(step, attempts, delay, context, |outcome| {
        is_retryable(outcome, retryable)
    })
    .await
}

pub fn is_retryable(outcome: &Transaction, retryable: &[String]) -> bool {
    let text = outcome
        .errors
        .iter()
        .map(|error| error.to_string().to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    retryable
        .iter()
        .any(|pattern| text.contains(&pattern.to_lowercase()))
}

async fn retry_while(
    step: &Step,
    attempts: u32,
    delay: Duration,
    context: &Context,
    should_retry: impl Fn(&Transaction) -> bool,
) -> Transaction {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        let outcome = execute_step(step, context).await;
        if outcome.success {
            return outcome;
        }
        tracing::warn!(
            step = %step,
            attempt,
            attempts,
            error = %outcome.error_message(),
            "step attempt failed"
        );
        if attempt >= attempts || !should_retry(&outcome) {
            return outcome;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        attempt += 1;
    }
}

/// Run `step` as a task and give up on it after `limit`
///
/// An over-time task is aborted and drained before the timeout envelope is
/// returned, so nothing it does afterwards is observed.
pub async fn timeout(step: &Step, limit: Duration, context: &Context) -> Transaction {
    let mut tasks = JoinSet::new();
    let (task_step, task_context) = (step.clone(), context.clone());
    tasks.spawn(async move { execute_step(&task_step, &task_context).await });

    match tokio::time::timeout(limit, tasks.join_next()).await {
        Ok(Some(Ok(outcome))) => outcome,
        Ok(Some(Err(join_error))) => {
            Transaction::failure(error_object("TaskError", join_error.to_string()))
        }
        Ok(None) => Transaction::failure(error_object("TaskError", "task vanished")),
        Err(_) => {
            tasks.shutdown().await;
            tracing::warn!(step = %step, limit_ms = limit.as_millis() as u64, "step timed out");
            Transaction::failure(error_object(
                "TimeoutError",
                format!(
                    "Timeout exceeded: step did not complete within {} seconds",
                    limit.as_secs_f64()
                ),
            ))
        }
    }
}

/// Run `try_step`; if it fails, run `catch_step` with the failure's errors
/// under the context key `error`
pub async fn catch(try_step: &Step, catch_step: &Step, context: &Context) -> Transaction {
    let attempt = execute_step(try_step, context).await;
    if attempt.success {
        return attempt;
    }
    let recovery = context.clone().with_value("error", Val::List(attempt.errors));
    execute_step(catch_step, &recovery).await
}

/// Run `secondary` when `primary` fails
pub async fn fallback(primary: &Step, secondary: &Step, context: &Context) -> Transaction {
    let outcome = execute_step(primary, context).await;
    if outcome.success {
        outcome
    } else {
        execute_step(secondary, context).await
    }
}
