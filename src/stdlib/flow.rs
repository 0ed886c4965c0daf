//! Combinator bindings
//!
//! Steps are passed as callables, callable names, or `step(...)` tuples.
//! Durations are seconds, except `throttle`'s interval which is milliseconds.
//! Omitted limits fall back to the `[engine]` configuration.

use std::sync::Arc;

use super::{duration_arg, int_arg, number_arg, seconds_arg, step_arg, step_args, str_arg, Registry, Services};
use crate::flow::combinators;
use crate::flow::{FlowError, Invocation, Step};
use crate::interpreter::types::Val;

pub(super) fn install(registry: &mut Registry, services: &Services) {
    let services = Arc::new(services.clone());

    registry.register_fn("step", make_step);

    registry.register_async("pipe", |inv: Invocation| async move {
        let steps = step_args(&inv, 0)?;
        let mut context = inv.context;
        Ok(combinators::pipe(&steps, &mut context).await.into_val())
    });

    registry.register_async("branch", |inv: Invocation| async move {
        let on_success = step_arg(&inv, "branch", 0, "on_success")?;
        let on_failure = step_arg(&inv, "branch", 1, "on_failure")?;
        Ok(combinators::branch(&on_success, &on_failure, &inv.context)
            .await
            .into_val())
    });

    let svc = services.clone();
    registry.register_async("retry", move |inv: Invocation| {
        let svc = svc.clone();
        async move {
            let step = step_arg(&inv, "retry", 0, "step")?;
            let attempts = attempts_arg(&inv, "retry", &svc)?;
            let delay = seconds_arg(&inv, "retry", 2, "delay")?.unwrap_or(svc.engine.retry_delay());
            Ok(combinators::retry(&step, attempts, delay, &inv.context)
                .await
                .into_val())
        }
    });

    let svc = services.clone();
    registry.register_async("retry_on", move |inv: Invocation| {
        let svc = svc.clone();
        async move {
            let step = step_arg(&inv, "retry_on", 0, "step")?;
            let attempts = attempts_arg(&inv, "retry_on", &svc)?;
            let delay =
                seconds_arg(&inv, "retry_on", 2, "delay")?.unwrap_or(svc.engine.retry_delay());
            let retryable = match inv.arg(3, "errors") {
                None | Some(Val::Null) => svc.engine.retryable_errors.clone(),
                Some(value) => value
                    .as_seq()
                    .ok_or_else(|| FlowError::argument("retry_on", "'errors' must be a list"))?
                    .iter()
                    .map(Val::to_key)
                    .collect(),
            };
            Ok(
                combinators::retry_on(&step, attempts, delay, &retryable, &inv.context)
                    .await
                    .into_val(),
            )
        }
    });

    let svc = services.clone();
    registry.register_async("timeout", move |inv: Invocation| {
        let svc = svc.clone();
        async move {
            let step = step_arg(&inv, "timeout", 0, "step")?;
            let limit = seconds_arg(&inv, "timeout", 1, "seconds")?.unwrap_or(svc.engine.timeout());
            Ok(combinators::timeout(&step, limit, &inv.context)
                .await
                .into_val())
        }
    });

    let svc = services.clone();
    registry.register_async("throttle", move |inv: Invocation| {
        let svc = svc.clone();
        async move {
            let step = step_arg(&inv, "throttle", 0, "step")?;
            let interval = number_arg(&inv, "throttle", 1, "rate_limit_ms")?
                .map(|ms| duration_arg("throttle", "rate_limit_ms", ms / 1000.0))
                .transpose()?
                .unwrap_or(svc.engine.throttle_interval());
            Ok(svc.throttle.run(&step, interval, &inv.context).await.into_val())
        }
    });

    registry.register_async("batch", |inv: Invocation| async move {
        let steps = step_args(&inv, 0)?;
        Ok(combinators::batch(&steps, &inv.context).await.into_val())
    });

    registry.register_async("race", |inv: Invocation| async move {
        let steps = step_args(&inv, 0)?;
        Ok(combinators::race(&steps, &inv.context).await.into_val())
    });

    registry.register_async("switch", |inv: Invocation| async move {
        let cases = switch_cases(inv.required("switch", 0, "cases")?)?;
        Ok(match combinators::switch(&cases, &inv.context).await {
            Some(outcome) => outcome.into_val(),
            None => Val::Null,
        })
    });

    registry.register_async("guard", |inv: Invocation| async move {
        let condition = inv.required("guard", 0, "condition")?;
        Ok(combinators::guard(condition, &inv.context).await.into_val())
    });

    registry.register_async("foreach", |inv: Invocation| async move {
        let items = inv.required("foreach", 0, "items")?;
        let step = step_arg(&inv, "foreach", 1, "step")?;
        Ok(combinators::foreach(items, &step, &inv.context)
            .await
            .into_val())
    });

    registry.register_async("catch", |inv: Invocation| async move {
        let try_step = step_arg(&inv, "catch", 0, "try_step")?;
        let catch_step = step_arg(&inv, "catch", 1, "catch_step")?;
        Ok(combinators::catch(&try_step, &catch_step, &inv.context)
            .await
            .into_val())
    });

    registry.register_async("fallback", |inv: Invocation| async move {
        let primary = step_arg(&inv, "fallback", 0, "primary")?;
        let secondary = step_arg(&inv, "fallback", 1, "secondary")?;
        Ok(combinators::fallback(&primary, &secondary, &inv.context)
            .await
            .into_val())
    });

    let svc = services.clone();
    registry.register_async("work", move |inv: Invocation| {
        let svc = svc.clone();
        async move {
            let workflow = step_arg(&inv, "work", 0, "workflow")?;
            let outcome = combinators::work(&workflow, &inv.context, svc.policy.as_deref()).await?;
            Ok(outcome.into_val())
        }
    });

    let svc = services.clone();
    registry.register_async("wait_event", move |inv: Invocation| {
        let svc = svc.clone();
        async move {
            let name = str_arg(&inv, "wait_event", 0, "name")?;
            Ok(svc.signals.wait(name).await)
        }
    });

    let svc = services;
    registry.register_fn("emit", move |inv: Invocation| {
        let name = str_arg(&inv, "emit", 0, "name")?;
        let payload = inv.arg(1, "payload").cloned().unwrap_or(Val::Bool(true));
        svc.signals.activate(name, payload.clone());
        Ok(payload)
    });
}

/// `step(callable, args..., name: value...)` as a tuple `Step::from_val` reads
///
/// Arguments are resolved when `step` itself is called, so an `@` reference
/// to later outputs needs a plain tuple literal instead.
fn make_step(inv: Invocation) -> Result<Val, FlowError> {
    let callee = inv.required("step", 0, "callable")?;
    let mut parts = vec![callee.clone()];
    parts.extend(inv.args.iter().skip(1).cloned());
    if !inv.kwargs.is_empty() {
        parts.push(Val::Dict(inv.kwargs.clone()));
    }
    // Validate now rather than when the step runs
    Step::from_val(&Val::Tuple(parts.clone()))?;
    Ok(Val::Tuple(parts))
}

fn attempts_arg(inv: &Invocation, function: &str, services: &Services) -> Result<u32, FlowError> {
    match int_arg(inv, function, 1, "attempts")? {
        None => Ok(services.engine.retry_attempts),
        Some(n) => u32::try_from(n)
            .map_err(|_| FlowError::argument(function, "'attempts' must be non-negative")),
    }
}

/// A dict of `condition: step`, or a list of `(condition, step)` pairs
fn switch_cases(cases: &Val) -> Result<Vec<(Val, Step)>, FlowError> {
    match cases {
        Val::Dict(map) => map
            .iter()
            .map(|(condition, step)| Ok((Val::Str(condition.clone()), Step::from_val(step)?)))
            .collect(),
        Val::List(items) | Val::Tuple(items) => items
            .iter()
            .map(|case| match case.as_seq() {
                Some([condition, step]) => Ok((condition.clone(), Step::from_val(step)?)),
                _ => Err(FlowError::argument(
                    "switch",
                    "each case must be a (condition, step) pair",
                )),
            })
            .collect(),
        other => Err(FlowError::argument(
            "switch",
            format!("expected cases as a dict or list, got {}", other.type_name()),
        )),
    }
}

