//! Tests for function values and host functions

use std::sync::Arc;

use super::helpers::{field, registry, run_err};
use crate::flow::{Func, Invocation};
use crate::interpreter::types::TypeRegistry;
use crate::interpreter::{Interpreter, Val};

const ADD: &str = "add2: (int:a, int:b), {total: a + b}, (int:total)\n";

#[tokio::test]
async fn test_positional_call() {
    let source = format!("{ADD}r: add2(1, 2)");
    assert_eq!(field(&source, "r").await, Val::Int(3));
}

#[tokio::test]
async fn test_keyword_call() {
    let source = format!("{ADD}r: add2(b: 10, a: 1)");
    assert_eq!(field(&source, "r").await, Val::Int(11));
}

#[tokio::test]
async fn test_multiple_returns_form_a_tuple() {
    let source = "split: (int:a, int:b), {s: a + b; d: a - b}, (int:s, int:d)\n(s, d): split(5, 3)";
    assert_eq!(field(source, "s").await, Val::Int(8));
    assert_eq!(field(source, "d").await, Val::Int(2));
}

#[tokio::test]
async fn test_no_returns_yield_body() {
    let source = "make: (str:name), {greeting: 'hi ' + name}, ()\nr: make('ada')";
    assert_eq!(
        field(source, "r").await.get_path("greeting"),
        Some(&Val::from("hi ada"))
    );
}

#[tokio::test]
async fn test_closure_captures_defining_scope() {
    let source = "k: 10\nshift: (int:x), {y: x + k}, (int:y)\nk: 100\nr: shift(1)";
    assert_eq!(field(source, "r").await, Val::Int(11));
}

#[tokio::test]
async fn test_function_value_declaration() {
    let source = "function:inc := (int:x), {y: x + 1}, (int:y)\nr: inc(41)";
    assert_eq!(field(source, "r").await, Val::Int(42));
}

#[tokio::test]
async fn test_argument_type_checked() {
    let err = run_err(&format!("{ADD}r: add2('x', 1)")).await;
    assert!(
        err.contains("Type error for 'a': expected int, got string"),
        "{err}"
    );
}

#[tokio::test]
async fn test_return_type_checked() {
    let err = run_err("f: (int:x), {y: 'text'}, (int:y)\nr: f(1)").await;
    assert!(
        err.contains("Type error for 'y': expected int, got string"),
        "{err}"
    );
}

#[tokio::test]
async fn test_missing_argument() {
    let err = run_err(&format!("{ADD}r: add2(1)")).await;
    assert!(err.contains("Missing argument 'b'"), "{err}");
}

#[tokio::test]
async fn test_too_many_arguments() {
    let err = run_err(&format!("{ADD}r: add2(1, 2, 3)")).await;
    assert!(err.contains("expected at most 2 arguments, got 3"), "{err}");
}

#[tokio::test]
async fn test_missing_return_field() {
    let err = run_err("f: (int:x), {y: x}, (int:z)\nr: f(1)").await;
    assert!(err.contains("Function result is missing 'z'"), "{err}");
}

#[tokio::test]
async fn test_host_function_registration() {
    let mut registry = registry();
    registry.register_fn("shout", |inv: Invocation| {
        let text = inv.required("shout", 0, "text")?;
        Ok(Val::Str(text.to_string().to_uppercase()))
    });

    let mut interpreter = Interpreter::new(&registry);
    let value = interpreter.eval_expression("shout('hey')").await.unwrap();
    assert_eq!(value, Val::from("HEY"));
}

#[tokio::test]
async fn test_async_host_function() {
    let mut registry = registry();
    registry.register(
        "later",
        Func::native("later", |inv: Invocation| async move {
            tokio::task::yield_now().await;
            Ok(inv.args.into_iter().next().unwrap_or(Val::Null))
        }),
    );

    let mut interpreter = Interpreter::new(&registry);
    assert_eq!(
        interpreter.eval_expression("later(7)").await.unwrap(),
        Val::Int(7)
    );
}

#[tokio::test]
async fn test_interpreter_over_custom_env() {
    let env = registry().env().bind("answer", Val::Int(42));
    let mut interpreter = Interpreter::with_env(env, Arc::new(TypeRegistry::new()));
    assert_eq!(
        interpreter.eval_expression("answer + 1").await.unwrap(),
        Val::Int(43)
    );
}
