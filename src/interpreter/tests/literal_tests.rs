//! Tests for literal evaluation

use super::helpers::{eval, field, ints};
use crate::interpreter::Val;

#[tokio::test]
async fn test_numbers() {
    assert_eq!(eval("42").await, Val::Int(42));
    assert_eq!(eval("-3").await, Val::Int(-3));
    assert_eq!(eval("2.5").await, Val::Real(2.5));
}

#[tokio::test]
async fn test_strings_and_booleans() {
    assert_eq!(eval("'hello'").await, Val::from("hello"));
    assert_eq!(eval(r#""tab\there""#).await, Val::from("tab\there"));
    assert_eq!(eval("true").await, Val::Bool(true));
    assert_eq!(eval("False").await, Val::Bool(false));
}

#[tokio::test]
async fn test_wildcard_is_null() {
    assert_eq!(eval("*").await, Val::Null);
}

#[tokio::test]
async fn test_collections() {
    assert_eq!(eval("[1, 2, 3]").await, ints(&[1, 2, 3]));
    assert_eq!(
        eval("(1, 'a')").await,
        Val::Tuple(vec![Val::Int(1), Val::from("a")])
    );
    assert_eq!(eval("1, 2").await, Val::Tuple(vec![Val::Int(1), Val::Int(2)]));
    assert_eq!(eval("[]").await, Val::List(vec![]));
}

#[tokio::test]
async fn test_unresolved_name_evaluates_to_its_text() {
    assert_eq!(eval("nowhere").await, Val::from("nowhere"));
    assert_eq!(eval("some.dotted.path").await, Val::from("some.dotted.path"));
}

#[tokio::test]
async fn test_dotted_name_reads_into_bound_values() {
    let source = "cfg: {db: {port: 5432}; hosts: ['a', 'b']}\nport: cfg.db.port\nsecond: cfg.hosts.1";
    assert_eq!(field(source, "port").await, Val::Int(5432));
    assert_eq!(field(source, "second").await, Val::from("b"));
}
