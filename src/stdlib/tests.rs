use std::fs;
use std::sync::Arc;

use super::*;
use crate::flow::Context;
use crate::interpreter::Interpreter;

fn registry() -> Registry {
    Registry::standard(&Config::default())
}

async fn eval_with(registry: &Registry, source: &str) -> Val {
    let mut interpreter = Interpreter::new(registry);
    interpreter
        .eval_expression(source)
        .await
        .unwrap_or_else(|err| panic!("Evaluation of '{source}' failed: {err}"))
}

async fn eval(source: &str) -> Val {
    eval_with(&registry(), source).await
}

async fn eval_err(source: &str) -> String {
    let mut interpreter = Interpreter::new(&registry());
    match interpreter.eval_expression(source).await {
        Ok(value) => panic!("Expected '{source}' to fail, got {value:?}"),
        Err(err) => err.to_string(),
    }
}

fn list(values: Vec<Val>) -> Val {
    Val::List(values)
}

/* ===================== Registry ===================== */

#[test]
fn test_standard_registry_contents() {
    let registry = registry();
    for name in ["add", "len", "convert", "print", "resource", "pipe", "retry", "work", "emit"] {
        assert!(registry.get(name).is_some(), "missing {name}");
    }
    assert!(Registry::new().is_empty());
}

#[tokio::test]
async fn test_register_replaces_builtin() {
    let mut registry = registry();
    let before = registry.len();
    registry.register_fn("len", |_inv: Invocation| Ok(Val::Int(-1)));
    assert_eq!(registry.len(), before);
    assert_eq!(eval_with(&registry, "len('abc')").await, Val::Int(-1));
}

/* ===================== Math ===================== */

#[tokio::test]
async fn test_math_functions() {
    assert_eq!(eval("add(1, 2, 3)").await, Val::Int(6));
    assert_eq!(eval("add(1, 0.5)").await, Val::Real(1.5));
    assert_eq!(eval("mul(2, 3, 4)").await, Val::Int(24));
    assert_eq!(eval("sub(5, 2)").await, Val::Int(3));
    assert_eq!(eval("div(1, 2)").await, Val::Real(0.5));
    assert_eq!(eval("mod(-1, 3)").await, Val::Int(2));
    assert_eq!(eval("pow(2, 10)").await, Val::Int(1024));
    assert_eq!(eval("neg(3)").await, Val::Int(-3));
    assert_eq!(eval("abs(-2.5)").await, Val::Real(2.5));
    assert_eq!(eval("min(3, 1, 2)").await, Val::Int(1));
    assert_eq!(eval("max([1, 5, 2])").await, Val::Int(5));
}

#[tokio::test]
async fn test_math_errors() {
    assert!(eval_err("add()").await.contains("expected at least one argument"));
    assert!(eval_err("div(1, 0)").await.contains("Division by zero"));
    assert!(eval_err("abs('x')").await.contains("expected a number, got string"));
}

/* ===================== Collections ===================== */

#[tokio::test]
async fn test_collection_functions() {
    assert_eq!(eval("len('héllo')").await, Val::Int(5));
    assert_eq!(eval("len({a: 1; b: 2})").await, Val::Int(2));
    assert_eq!(
        eval("keys({a: 1; b: 2})").await,
        list(vec![Val::from("a"), Val::from("b")])
    );
    assert_eq!(eval("values({a: 1; b: 2})").await, list(vec![Val::Int(1), Val::Int(2)]));
    assert_eq!(eval("get({a: {b: 2}}, 'a.b')").await, Val::Int(2));
    assert_eq!(eval("get([1, 2], 1)").await, Val::Int(2));
    assert_eq!(eval("get({a: 1}, 'z', 0)").await, Val::Int(0));
    assert_eq!(
        eval("merge({a: 1; b: 1}, {b: 2})").await.get_path("b"),
        Some(&Val::Int(2))
    );
    assert_eq!(eval("range(3)").await, list(vec![Val::Int(0), Val::Int(1), Val::Int(2)]));
    assert_eq!(eval("range(1, 7, 2)").await, list(vec![Val::Int(1), Val::Int(3), Val::Int(5)]));
    assert_eq!(eval("range(3, 0, -1)").await, list(vec![Val::Int(3), Val::Int(2), Val::Int(1)]));
}

#[tokio::test]
async fn test_collection_errors() {
    assert!(eval_err("range(1, 2, 0)").await.contains("step must not be zero"));
    assert!(eval_err("range(10000000000000)").await.contains("range too large"));
    assert!(eval_err("len(3)").await.contains("integer has no length"));
    assert!(eval_err("keys([1])").await.contains("expected a dict, got list"));
}

/* ===================== Convert ===================== */

#[tokio::test]
async fn test_convert_encodes() {
    assert_eq!(eval("convert({a: 1}, 'json')").await, Val::from(r#"{"a":1}"#));
    assert_eq!(eval("convert(12, 'text')").await, Val::from("12"));
    assert_eq!(
        eval("convert('abc', to: 'hash')").await,
        Val::from("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
    );
    let toml = eval("convert({name: 'x'}, 'toml')").await;
    assert_eq!(toml.as_str().map(str::trim), Some(r#"name = "x""#));
}

#[tokio::test]
async fn test_convert_decodes() {
    let decoded = eval(r#"convert('{"a": [1, 2]}', from: 'json')"#).await;
    assert_eq!(decoded.get_path("a.1"), Some(&Val::Int(2)));

    let decoded = eval("convert('x = 1', from: 'toml')").await;
    assert_eq!(decoded.get_path("x"), Some(&Val::Int(1)));

    let round = eval(r#"convert('{"b": true}', to: 'json', from: 'json')"#).await;
    assert_eq!(round, Val::from(r#"{"b":true}"#));
}

#[tokio::test]
async fn test_convert_errors() {
    assert!(eval_err("convert(1, 'yaml')").await.contains("unknown target format 'yaml'"));
    assert!(eval_err("convert(1, from: 'json')").await.contains("can only decode strings"));
    assert!(eval_err("convert('{', from: 'json')").await.contains("convert from json"));
}

/* ===================== IO ===================== */

#[tokio::test]
async fn test_print_and_pass_return_first_argument() {
    assert_eq!(eval("print('hi', 2)").await, Val::from("hi"));
    assert_eq!(eval("pass(3)").await, Val::Int(3));
    assert_eq!(eval("pass()").await, Val::Null);
}

#[tokio::test]
async fn test_resource_reads_below_root() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("settings.json"), r#"{"retries": 4}"#).unwrap();

    let mut config = Config::default();
    config.resources.root = dir.path().to_path_buf();
    let registry = Registry::standard(&config);

    let loaded = eval_with(&registry, "resource('settings.json')").await;
    assert_eq!(loaded.get_path("retries"), Some(&Val::Int(4)));

    let mut interpreter = Interpreter::new(&registry);
    let err = interpreter
        .eval_expression("resource('../outside.json')")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("outside.json"), "{err}");
}

/* ===================== Flow Bindings ===================== */

#[tokio::test]
async fn test_step_builds_a_step_tuple() {
    let value = eval("step(add, 1, b: 2)").await;
    let parts = value.as_seq().unwrap();
    assert_eq!(parts.len(), 3);
    assert!(matches!(parts[0], Val::Func(_)));
    assert_eq!(parts[2].get_path("b"), Some(&Val::Int(2)));

    assert!(eval_err("step(5)").await.contains("Invalid step"));
}

#[tokio::test]
async fn test_combinator_bindings() {
    assert_eq!(eval("retry(step(pass, 1), 2, 0)").await, Val::Int(1));
    assert_eq!(eval("timeout(step(pass, 1), 5)").await, Val::Int(1));
    assert_eq!(eval("throttle(step(pass, 1), 10)").await, Val::Int(1));
    assert_eq!(
        eval("batch(step(add, 1, 1), step(mul, 2, 3))").await,
        list(vec![Val::Int(2), Val::Int(6)])
    );
    assert_eq!(eval("race(step(pass, 'only'))").await, Val::from("only"));
    assert_eq!(
        eval("foreach([1, 2, 3], step(mul, 10))").await,
        list(vec![Val::Int(10), Val::Int(20), Val::Int(30)])
    );
    assert_eq!(
        eval("catch(step(div, 1, 0), step(pass, 'recovered'))").await,
        Val::from("recovered")
    );
    assert_eq!(
        eval("fallback(step(div, 1, 0), step(pass, 'backup'))").await,
        Val::from("backup")
    );
}

#[tokio::test]
async fn test_failed_combinator_raises() {
    let err = eval_err("retry(step(div, 1, 0), 2, 0)").await;
    assert!(err.contains("Division by zero"), "{err}");

    let err = eval_err("batch(step(pass, 1), step(div, 1, 0))").await;
    assert!(err.contains("Division by zero"), "{err}");
}

#[tokio::test]
async fn test_unrepresentable_durations_are_argument_errors() {
    let err = eval_err("timeout(pass, 1e300)").await;
    assert!(err.contains("'seconds' is out of range"), "{err}");

    let err = eval_err("retry(step(pass, 'a'), 2, 1e300)").await;
    assert!(err.contains("out of range"), "{err}");

    let err = eval_err("throttle(pass, 1e300)").await;
    assert!(err.contains("'rate_limit_ms' is out of range"), "{err}");
}

#[tokio::test]
async fn test_switch_and_guard_bindings() {
    assert_eq!(
        eval("switch([(false, step(pass, 1)), (true, step(pass, 2))])").await,
        Val::Int(2)
    );
    assert_eq!(eval("switch([(false, step(pass, 1))])").await, Val::Null);
    assert_eq!(eval("guard(1 < 2)").await, Val::Bool(true));

    let mut interpreter = Interpreter::new(&registry());
    let evaluation = interpreter
        .eval_source("limit: 5\nok: guard('limit > 1')")
        .await
        .unwrap();
    assert_eq!(evaluation.value.get_path("ok"), Some(&Val::Bool(true)));

    assert!(eval_err("guard(false)").await.contains("evaluated_result"));
}

#[tokio::test]
async fn test_emit_then_wait_event() {
    let registry = registry();
    let mut interpreter = Interpreter::new(&registry);
    let evaluation = interpreter
        .eval_source("sent: emit('ready', 42)\nflag: emit('go')\ngot: wait_event('ready')")
        .await
        .unwrap();
    assert_eq!(evaluation.value.get_path("sent"), Some(&Val::Int(42)));
    assert_eq!(evaluation.value.get_path("flag"), Some(&Val::Bool(true)));
    assert_eq!(evaluation.value.get_path("got"), Some(&Val::Int(42)));
}

#[tokio::test]
async fn test_wait_event_resumes_on_emit() {
    let registry = registry();
    let waiter = {
        let registry = registry.clone();
        tokio::spawn(async move { eval_with(&registry, "wait_event('done')").await })
    };
    tokio::task::yield_now().await;
    eval_with(&registry, "emit('done', 'payload')").await;

    let value = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(value, Val::from("payload"));
}

#[tokio::test]
async fn test_work_binding_uses_policy() {
    assert!(eval_err("work(step(pass, 1))")
        .await
        .contains("Access denied"));

    let mut interpreter = Interpreter::new(&registry()).with_context(Context::system());
    assert_eq!(
        interpreter.eval_expression("work(step(pass, 1))").await.unwrap(),
        Val::Int(1)
    );

    let mut config = Config::default();
    config.policy.enabled = true;
    config.policy.allow = vec!["pass".to_string()];
    let registry = Registry::standard(&config);
    assert_eq!(eval_with(&registry, "work(step(pass, 1))").await, Val::Int(1));
    let mut interpreter = Interpreter::new(&registry);
    assert!(interpreter
        .eval_expression("work(step(print, 1))")
        .await
        .is_err());
}

#[tokio::test]
async fn test_services_are_shared_by_clones() {
    let services = Services::from_config(&Config::default());
    let signals = services.signals.clone();
    let registry = Registry::with_services(services);
    eval_with(&registry, "emit('probe', 1)").await;
    assert_eq!(signals.try_take("probe"), Some(Val::Int(1)));
    assert!(Arc::strong_count(&signals) > 1);
}
