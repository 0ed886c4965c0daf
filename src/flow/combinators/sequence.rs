//! Ordered combinators: stages and iterations run one after another

use super::guard::guard;
use crate::flow::{execute_step, Context, Step, Transaction};
use crate::interpreter::types::Val;

/// Run stages in order, appending each result to `context.outputs`
///
/// Every stage runs regardless of earlier failures; later stages can read
/// earlier results through `@outputs.N`. Returns the last stage's result.
pub async fn pipe(steps: &[Step], context: &mut Context) -> Transaction {
    let mut last = Transaction::success(Val::Null);
    for (index, step) in steps.iter().enumerate() {
        last = execute_step(step, context).await;
        tracing::trace!(stage = index, step = %step, success = last.success, "pipe stage done");
        context.outputs.push(last.clone());
    }
    last
}

/// Dispatch on the success flag of the most recent output
///
/// With no outputs yet, the failure branch runs.
pub async fn branch(on_success: &Step, on_failure: &Step, context: &Context) -> Transaction {
    let succeeded = context.outputs.last().is_some_and(|last| last.success);
    let chosen = if succeeded { on_success } else { on_failure };
    execute_step(chosen, context).await
}

/// Run `step` once per element, each with its own copy of the context
///
/// Elements are a list's or tuple's items or a dict's values; the item is
/// prepended to the step's arguments. Returns the per-iteration data in
/// order (`Null` for iterations that failed).
pub async fn foreach(items: &Val, step: &Step, context: &Context) -> Transaction {
    let elements: Vec<Val> = match items {
        Val::List(items) | Val::Tuple(items) => items.clone(),
        Val::Dict(map) => map.values().cloned().collect(),
        other => {
            return Transaction::failure(format!(
                "foreach expects a list, tuple or dict, got {}",
                other.type_name()
            ))
        }
    };

    let mut data = Vec::with_capacity(elements.len());
    for element in elements {
        let iteration = context.clone();
        let outcome = execute_step(&step.prepend(element), &iteration).await;
        data.push(outcome.data);
    }
    Transaction::success(Val::List(data))
}

/// Run the step of the first case whose condition passes `guard`
///
/// Returns `None` when no case matches.
pub async fn switch(cases: &[(Val, Step)], context: &Context) -> Option<Transaction> {
    for (condition, step) in cases {
        if guard(condition, context).await.success {
            return Some(execute_step(step, context).await);
        }
    }
    None
}
