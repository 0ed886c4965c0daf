//! Test helpers for interpreter tests

use crate::config::Config;
use crate::interpreter::{Evaluation, Interpreter, Val};
use crate::stdlib::Registry;

pub fn registry() -> Registry {
    Registry::standard(&Config::default())
}

/// Evaluate a program with the standard registry
pub async fn run(source: &str) -> Evaluation {
    let mut interpreter = Interpreter::new(&registry());
    interpreter
        .eval_source(source)
        .await
        .unwrap_or_else(|err| panic!("Evaluation failed: {err}"))
}

/// Evaluate a program and return one of its top-level fields
pub async fn field(source: &str, name: &str) -> Val {
    let evaluation = run(source).await;
    evaluation
        .value
        .as_dict()
        .and_then(|fields| fields.get(name))
        .cloned()
        .unwrap_or_else(|| panic!("No field '{name}' in {:?}", evaluation.value))
}

/// Evaluate a single expression
pub async fn eval(source: &str) -> Val {
    let mut interpreter = Interpreter::new(&registry());
    interpreter
        .eval_expression(source)
        .await
        .unwrap_or_else(|err| panic!("Evaluation of '{source}' failed: {err}"))
}

/// Evaluate a program that must fail and return the rendered error
pub async fn run_err(source: &str) -> String {
    let mut interpreter = Interpreter::new(&registry());
    match interpreter.eval_source(source).await {
        Ok(evaluation) => panic!("Expected an error, got {:?}", evaluation.value),
        Err(err) => err.to_string(),
    }
}

pub fn ints(values: &[i64]) -> Val {
    Val::List(values.iter().copied().map(Val::Int).collect())
}
