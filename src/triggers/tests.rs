use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::cron::until_next_minute;
use super::*;
use crate::config::Config;
use crate::flow::{FlowError, Invocation};
use crate::stdlib::Registry;

fn settings() -> TriggerSettings {
    TriggerSettings {
        event_poll_interval: Duration::from_millis(10),
        event_error_backoff: Duration::from_millis(1000),
        ..TriggerSettings::default()
    }
}

/// Registry with `record(value)`, which appends to the returned log
fn recording_registry() -> (Registry, Arc<Mutex<Vec<Val>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut registry = Registry::standard(&Config::default());
    let sink = seen.clone();
    registry.register_fn("record", move |inv: Invocation| {
        let value = inv.required("record", 0, "value")?.clone();
        sink.lock().unwrap().push(value.clone());
        Ok(value)
    });
    (registry, seen)
}

async fn collect(registry: &Registry, source: &str) -> (Vec<Trigger>, Arc<TypeRegistry>, Val) {
    let mut interpreter = Interpreter::new(registry);
    let evaluation = interpreter.eval_source(source).await.unwrap();
    (evaluation.triggers, interpreter.types().clone(), evaluation.value)
}

/* ===================== Detection ===================== */

#[tokio::test]
async fn test_root_triggers_are_collected_not_evaluated() {
    let registry = Registry::standard(&Config::default());
    let source = "name: 'jobs'\nnext_job(): print(event)\n(0, 9, *, *, 1): print('report')";
    let (triggers, _, value) = collect(&registry, source).await;

    assert_eq!(triggers.len(), 2);
    assert!(matches!(triggers[0].condition, TriggerCondition::Event(_)));
    assert_eq!(triggers[0].to_string(), "event next_job() at 2:1");
    match &triggers[1].condition {
        TriggerCondition::Cron(pattern) => {
            assert_eq!(pattern.minute, Some(0));
            assert_eq!(pattern.hour, Some(9));
            assert_eq!(pattern.day, None);
            assert_eq!(pattern.weekday, Some(1));
            assert_eq!(pattern.to_string(), "0 9 * * 1");
        }
        other => panic!("expected a cron trigger, got {other:?}"),
    }
    assert_eq!(value.as_dict().map(|fields| fields.len()), Some(1));
}

#[tokio::test]
async fn test_other_tuple_keys_are_plain_pairs() {
    let registry = Registry::standard(&Config::default());
    let (triggers, _, value) = collect(&registry, "(1, 2, 3, 4): 'x'\ninner: {len([1]): 'y'}").await;
    assert!(triggers.is_empty());
    assert_eq!(value.as_dict().map(|fields| fields.len()), Some(2));
}

#[test]
fn test_cron_matching() {
    // 2024-01-07 was a Sunday
    let sunday_nine = Utc.with_ymd_and_hms(2024, 1, 7, 9, 0, 30).unwrap();
    let every_sunday_at_nine = CronPattern {
        minute: Some(0),
        hour: Some(9),
        weekday: Some(0),
        ..CronPattern::default()
    };
    assert!(every_sunday_at_nine.matches(&sunday_nine));
    assert!(CronPattern::default().matches(&sunday_nine));

    let monday_nine = Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap();
    assert!(!every_sunday_at_nine.matches(&monday_nine));
    let sunday_later = Utc.with_ymd_and_hms(2024, 1, 7, 9, 1, 0).unwrap();
    assert!(!every_sunday_at_nine.matches(&sunday_later));

    let new_year = CronPattern {
        day: Some(1),
        month: Some(1),
        ..CronPattern::default()
    };
    assert!(new_year.matches(&Utc.with_ymd_and_hms(2025, 1, 1, 13, 37, 0).unwrap()));
    assert!(!new_year.matches(&Utc.with_ymd_and_hms(2025, 2, 1, 13, 37, 0).unwrap()));
}

#[test]
fn test_until_next_minute() {
    let at = Utc.with_ymd_and_hms(2024, 1, 7, 9, 0, 45).unwrap();
    assert_eq!(until_next_minute(&at), Duration::from_secs(15));
    let at = Utc.with_ymd_and_hms(2024, 1, 7, 9, 0, 0).unwrap();
    assert_eq!(until_next_minute(&at), Duration::from_secs(60));
}

/* ===================== Scheduler ===================== */

#[tokio::test(start_paused = true)]
async fn test_event_trigger_fires_per_event() {
    let queue = Arc::new(Mutex::new(VecDeque::from(vec![Val::Int(1), Val::Int(2)])));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let mut registry = Registry::standard(&Config::default());
    let pending = queue.clone();
    registry.register_fn("next_job", move |_inv: Invocation| {
        Ok(pending.lock().unwrap().pop_front().unwrap_or(Val::Bool(false)))
    });
    let sink = seen.clone();
    registry.register_fn("record", move |inv: Invocation| {
        let event = inv.required("record", 0, "event")?.clone();
        sink.lock().unwrap().push(event.clone());
        Ok(event)
    });

    let (triggers, types, _) = collect(&registry, "next_job(): record(event)").await;
    let mut scheduler = TriggerScheduler::new(types, Context::new(), settings());
    scheduler.spawn_all(triggers);
    assert_eq!(scheduler.len(), 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    queue.lock().unwrap().push_back(Val::from("late"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    scheduler.shutdown().await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![Val::Int(1), Val::Int(2), Val::from("late")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failing_poll_backs_off() {
    let polls = Arc::new(AtomicUsize::new(0));
    let mut registry = Registry::standard(&Config::default());
    let counter = polls.clone();
    registry.register_fn("next_job", move |_inv: Invocation| {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(FlowError::Failed("queue offline".to_string()))
    });

    let (triggers, types, _) = collect(&registry, "next_job(): print(event)").await;
    let mut scheduler = TriggerScheduler::new(types, Context::new(), settings());
    scheduler.spawn_all(triggers);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    let before = polls.load(Ordering::SeqCst);
    assert!((2..=3).contains(&before), "polled {before} times");

    scheduler.shutdown().await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(polls.load(Ordering::SeqCst), before);
}

#[tokio::test(start_paused = true)]
async fn test_poll_runs_as_system() {
    let saw_system = Arc::new(Mutex::new(None));
    let mut registry = Registry::standard(&Config::default());
    let probe = saw_system.clone();
    registry.register_fn("next_job", move |inv: Invocation| {
        probe.lock().unwrap().get_or_insert(inv.context.is_system());
        Ok(Val::Bool(false))
    });

    let (triggers, types, _) = collect(&registry, "next_job(): print(event)").await;
    let mut scheduler = TriggerScheduler::new(types, Context::new(), settings());
    scheduler.spawn_all(triggers);
    tokio::time::sleep(Duration::from_millis(50)).await;
    scheduler.shutdown().await;

    assert_eq!(*saw_system.lock().unwrap(), Some(true));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_cron_loops() {
    let registry = Registry::standard(&Config::default());
    let (triggers, types, _) = collect(&registry, "(*, *, *, *, *): print('tick')").await;

    let mut scheduler = TriggerScheduler::new(types, Context::new(), settings());
    let token = scheduler.cancellation_token();
    scheduler.spawn_all(triggers);
    assert!(!scheduler.is_empty());

    tokio::time::timeout(Duration::from_secs(1), scheduler.shutdown())
        .await
        .unwrap();
    assert!(token.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_cron_fires_once_per_matching_minute() {
    let (registry, seen) = recording_registry();
    let (triggers, types, _) = collect(&registry, "(0, *, *, *, *): record('top of hour')").await;

    let now = Arc::new(Mutex::new(Utc.with_ymd_and_hms(2024, 1, 7, 9, 0, 10).unwrap()));
    let current = now.clone();
    let settings = TriggerSettings {
        clock: Clock::new(move || *current.lock().unwrap()),
        ..settings()
    };
    let set = |at: DateTime<Utc>| *now.lock().unwrap() = at;

    let mut scheduler = TriggerScheduler::new(types, Context::new(), settings);
    scheduler.spawn_all(triggers);

    // 09:00:10 matches; the loop sleeps 50s to the next minute
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(seen.lock().unwrap().len(), 1);

    // Wakes at t=50 still inside 09:00 and must not fire again
    set(Utc.with_ymd_and_hms(2024, 1, 7, 9, 0, 40).unwrap());
    tokio::time::sleep(Duration::from_secs(54)).await;
    assert_eq!(seen.lock().unwrap().len(), 1);

    // Wakes at t=70 on 09:01, which the literal minute rejects
    set(Utc.with_ymd_and_hms(2024, 1, 7, 9, 1, 0).unwrap());
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(seen.lock().unwrap().len(), 1);

    // Wakes at t=130 on the next hour
    set(Utc.with_ymd_and_hms(2024, 1, 7, 10, 0, 0).unwrap());
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(*seen.lock().unwrap(), vec![Val::from("top of hour"); 2]);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_wildcard_cron_fires_every_minute() {
    let (registry, seen) = recording_registry();
    let (triggers, types, _) = collect(&registry, "(*, *, *, *, *): record('tick')").await;

    // Wall clock that advances with the paused tokio clock
    let start = Utc.with_ymd_and_hms(2024, 1, 7, 8, 58, 30).unwrap();
    let origin = tokio::time::Instant::now();
    let settings = TriggerSettings {
        clock: Clock::new(move || start + chrono::Duration::from_std(origin.elapsed()).unwrap()),
        ..settings()
    };

    let mut scheduler = TriggerScheduler::new(types, Context::new(), settings);
    scheduler.spawn_all(triggers);

    // 08:58:30, 08:59, 09:00 and 09:01
    tokio::time::sleep(Duration::from_secs(165)).await;
    assert_eq!(seen.lock().unwrap().len(), 4);

    scheduler.shutdown().await;
}
