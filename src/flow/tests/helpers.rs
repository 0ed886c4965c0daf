//! Host functions with observable behavior for engine tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::flow::{FlowError, Func, Invocation, Step};
use crate::interpreter::types::Val;

/// Returns its first argument, or `Null`
pub fn echo() -> Func {
    Func::sync("echo", |inv: Invocation| {
        Ok(inv.args.first().cloned().unwrap_or(Val::Null))
    })
}

pub fn failing(message: &'static str) -> Func {
    Func::sync("failing", move |_inv: Invocation| {
        Err(FlowError::Failed(message.to_string()))
    })
}

/// Fails with `message` for the first `failures` calls, then returns the
/// number of the succeeding call
pub fn flaky(failures: usize, message: &'static str, calls: Arc<AtomicUsize>) -> Func {
    Func::sync("flaky", move |_inv: Invocation| {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= failures {
            Err(FlowError::Failed(message.to_string()))
        } else {
            Ok(Val::Int(call as i64))
        }
    })
}

/// Sleeps `delay`, sets `finished`, then returns `value`
pub fn slow(delay: Duration, value: Val, finished: Arc<AtomicBool>) -> Func {
    Func::native("slow", move |_inv: Invocation| {
        let (value, finished) = (value.clone(), finished.clone());
        async move {
            tokio::time::sleep(delay).await;
            finished.store(true, Ordering::SeqCst);
            Ok(value)
        }
    })
}

pub fn step(func: Func) -> Step {
    Step::call(func)
}

pub fn step_with(func: Func, args: Vec<Val>) -> Step {
    Step::call(func).with_args(args)
}
