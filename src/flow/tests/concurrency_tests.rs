//! Tests for `batch`, `race`, and named signals

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::helpers::{echo, failing, slow, step, step_with};
use crate::flow::combinators::{batch, race};
use crate::flow::{Context, Func, Invocation, Signals};
use crate::interpreter::types::Val;

#[tokio::test]
async fn test_batch_all_succeed_in_order() {
    let flag = Arc::new(AtomicBool::new(false));
    let steps = vec![
        step(slow(Duration::from_millis(30), Val::from("s1"), flag.clone())),
        step_with(echo(), vec![Val::from("s2")]),
    ];
    let outcome = batch(&steps, &Context::new()).await;
    assert!(outcome.success);
    assert_eq!(
        outcome.data,
        Val::List(vec![Val::from("s1"), Val::from("s2")])
    );
}

#[tokio::test]
async fn test_batch_aggregates_failures() {
    let steps = vec![
        step_with(echo(), vec![Val::from("s1")]),
        step(failing("s2 failed")),
        step_with(echo(), vec![Val::from("s3")]),
    ];
    let outcome = batch(&steps, &Context::new()).await;
    assert!(!outcome.success);
    assert_eq!(
        outcome.data,
        Val::List(vec![Val::from("s1"), Val::from("s3")])
    );
    assert_eq!(outcome.errors, vec![Val::from("s2 failed")]);
}

#[tokio::test]
async fn test_batch_captures_panics() {
    let exploding = Func::sync("exploding", |_inv: Invocation| -> crate::flow::CallResult {
        panic!("kaboom")
    });
    let steps = vec![step(exploding), step_with(echo(), vec![Val::Int(1)])];
    let outcome = batch(&steps, &Context::new()).await;
    assert!(!outcome.success);
    assert_eq!(outcome.errors[0].get_path("type"), Some(&Val::from("PanicError")));
    assert_eq!(outcome.data, Val::List(vec![Val::Int(1)]));
}

#[tokio::test]
async fn test_batch_of_nothing() {
    let outcome = batch(&[], &Context::new()).await;
    assert!(outcome.success);
    assert_eq!(outcome.data, Val::List(vec![]));
}

#[tokio::test(start_paused = true)]
async fn test_race_first_finisher_wins() {
    let fast_done = Arc::new(AtomicBool::new(false));
    let slow_done = Arc::new(AtomicBool::new(false));
    let steps = vec![
        step(slow(Duration::from_secs(5), Val::from("slow"), slow_done.clone())),
        step(slow(Duration::from_millis(10), Val::from("fast"), fast_done.clone())),
    ];

    let outcome = race(&steps, &Context::new()).await;
    assert_eq!(outcome.data, Val::from("fast"));
    assert!(fast_done.load(Ordering::SeqCst));

    // The loser was aborted and never completes
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!slow_done.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_race_returns_failed_winner() {
    let flag = Arc::new(AtomicBool::new(false));
    let steps = vec![
        step(failing("lost early")),
        step(slow(Duration::from_secs(1), Val::Int(1), flag)),
    ];
    let outcome = race(&steps, &Context::new()).await;
    assert!(!outcome.success);
    assert_eq!(outcome.error_message(), "lost early");
}

#[tokio::test]
async fn test_race_of_nothing() {
    assert_eq!(race(&[], &Context::new()).await.data, Val::Null);
}

#[tokio::test]
async fn test_signal_queued_before_wait() {
    let signals = Signals::new();
    signals.activate("ready", Val::Int(1));
    signals.activate("ready", Val::Int(2));
    assert_eq!(signals.wait("ready").await, Val::Int(1));
    assert_eq!(signals.try_take("ready"), Some(Val::Int(2)));
    assert_eq!(signals.try_take("ready"), None);
}

#[test]
fn test_wait_is_pending_until_activated() {
    let signals = Signals::new();
    let mut wait = tokio_test::task::spawn(signals.wait("tick"));
    tokio_test::assert_pending!(wait.poll());

    signals.activate("tick", Val::Int(1));
    assert!(wait.is_woken());
    tokio_test::assert_ready_eq!(wait.poll(), Val::Int(1));
}

#[tokio::test]
async fn test_signal_wakes_waiter() {
    let signals = Arc::new(Signals::new());
    let waiter = {
        let signals = signals.clone();
        tokio::spawn(async move { signals.wait("done").await })
    };
    tokio::task::yield_now().await;
    signals.activate("done", Val::from("payload"));

    let payload = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payload, Val::from("payload"));
}
