//! Fan-out combinators
//!
//! Branches run as tasks on a `JoinSet`, each with its own copy of the
//! context. `execute_step` turns a panicking branch into a failure.

use tokio::task::JoinSet;

use crate::flow::transaction::error_object;
use crate::flow::{execute_step, Context, Step, Transaction};
use crate::interpreter::types::Val;

/// Run every step concurrently and wait for all of them
///
/// Succeeds only if every step succeeds. `data` holds the data of the
/// succeeding steps and `errors` every error collected, both in declaration
/// order.
pub async fn batch(steps: &[Step], context: &Context) -> Transaction {
    if steps.is_empty() {
        return Transaction::success(Val::List(vec![]));
    }

    let mut tasks = JoinSet::new();
    for (index, step) in steps.iter().enumerate() {
        let (step, context) = (step.clone(), context.clone());
        tasks.spawn(async move { (index, execute_step(&step, &context).await) });
    }

    let mut outcomes: Vec<Option<Transaction>> = vec![None; steps.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => outcomes[index] = Some(outcome),
            Err(join_error) => {
                tracing::warn!(error = %join_error, "batch task did not complete");
            }
        }
    }

    let mut success = true;
    let mut data = Vec::new();
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Some(outcome) if outcome.success => data.push(outcome.data),
            Some(outcome) => {
                success = false;
                errors.extend(outcome.errors);
            }
            None => {
                success = false;
                errors.push(error_object("TaskError", "batch task did not complete"));
            }
        }
    }

    tracing::debug!(steps = steps.len(), success, "batch finished");
    if success {
        Transaction::success(Val::List(data))
    } else {
        Transaction::failure_with(Val::List(data), errors)
    }
}

/// Run every step concurrently and keep the first to finish
///
/// The remaining tasks are aborted and drained before returning, so a loser
/// never contributes to the result. A failed winner is returned as its
/// failure envelope.
pub async fn race(steps: &[Step], context: &Context) -> Transaction {
    if steps.is_empty() {
        return Transaction::success(Val::Null);
    }

    let mut tasks = JoinSet::new();
    for step in steps {
        let (step, context) = (step.clone(), context.clone());
        tasks.spawn(async move { execute_step(&step, &context).await });
    }

    let winner = tasks.join_next().await;
    tasks.shutdown().await;

    match winner {
        Some(Ok(outcome)) => outcome,
        Some(Err(join_error)) => Transaction::failure(error_object(
            "RaceWinnerError",
            format!("winning step failed: {join_error}"),
        )),
        None => Transaction::success(Val::Null),
    }
}
