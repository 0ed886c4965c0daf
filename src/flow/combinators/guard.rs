//! Boolean conditions over the context

use std::sync::Arc;

use crate::flow::{Context, Transaction};
use crate::interpreter::types::{Dict, TypeRegistry, Val};
use crate::interpreter::Interpreter;
use crate::parser;

/// Evaluate `condition` against a snapshot of `context`
///
/// A string condition is a DSL expression over the snapshot's fields
/// (`identifier`, `outputs`, and each context value) bound as names. Any
/// other value is judged by its truthiness. A false condition fails with a
/// `{condition, evaluated_result}` error.
pub async fn guard(condition: &Val, context: &Context) -> Transaction {
    let evaluated = match condition {
        Val::Str(query) => match evaluate_query(query, context).await {
            Ok(value) => value,
            Err(message) => {
                return Transaction::failure(format!(
                    "Guard condition '{query}' could not be evaluated: {message}"
                ))
            }
        },
        other => other.clone(),
    };

    if evaluated.is_truthy() {
        Transaction::success(evaluated)
    } else {
        let mut error = Dict::new();
        error.insert("condition", condition.sanitized());
        error.insert("evaluated_result", evaluated);
        Transaction::failure(Val::Dict(error))
    }
}

async fn evaluate_query(query: &str, context: &Context) -> Result<Val, String> {
    let expression = parser::parse_expression(query).map_err(|err| err.to_string())?;
    let bindings = match context.snapshot() {
        Val::Dict(fields) => fields.into_iter().collect::<Vec<_>>(),
        _ => vec![],
    };
    let mut interpreter = Interpreter::with_env(
        context.env.extend(bindings),
        Arc::new(TypeRegistry::new()),
    )
    .with_context(context.clone());
    interpreter
        .evaluate(&expression)
        .await
        .map(|evaluation| evaluation.value)
        .map_err(|err| err.to_string())
}
