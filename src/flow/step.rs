//! Reified invocations and the single primitive that runs them

use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;

use super::callable::{Func, Invocation};
use super::context::Context;
use super::errors::FlowError;
use super::transaction::{error_object, Transaction};
use crate::interpreter::types::{Dict, Val};

/// What a step calls
#[derive(Debug, Clone)]
pub enum Callee {
    /// Resolved callable value
    Value(Val),
    /// Looked up in the context when the step runs
    Named(String),
}

/// A not-yet-run invocation
#[derive(Debug, Clone)]
pub struct Step {
    pub callee: Callee,
    pub args: Vec<Val>,
    pub kwargs: Dict,
}

impl Step {
    pub fn new(callee: Callee, args: Vec<Val>, kwargs: Dict) -> Self {
        Self {
            callee,
            args,
            kwargs,
        }
    }

    pub fn call(func: Func) -> Self {
        Self::new(Callee::Value(Val::Func(func)), vec![], Dict::new())
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(Callee::Named(name.into()), vec![], Dict::new())
    }

    pub fn with_args(mut self, args: Vec<Val>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwarg(mut self, name: impl Into<String>, value: Val) -> Self {
        self.kwargs.insert(name, value);
        self
    }

    /// Copy of this step with `value` as the first positional argument
    pub fn prepend(&self, value: Val) -> Step {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(value);
        args.extend(self.args.iter().cloned());
        Step::new(self.callee.clone(), args, self.kwargs.clone())
    }

    /// Reify a DSL value as a step
    ///
    /// Accepts a callable, a callable name, or a tuple/list whose head is
    /// either; the remaining elements become positional arguments and a
    /// trailing dict becomes the keyword arguments.
    pub fn from_val(value: &Val) -> Result<Step, FlowError> {
        match value {
            Val::Func(_) => Ok(Step::new(Callee::Value(value.clone()), vec![], Dict::new())),
            Val::Str(name) => Ok(Step::named(name.clone())),
            Val::Tuple(items) | Val::List(items) => {
                let (head, rest) = items
                    .split_first()
                    .ok_or_else(|| FlowError::InvalidStep("empty step".to_string()))?;
                let mut step = Step::from_val(head)?;
                let mut args = rest.to_vec();
                if let Some(Val::Dict(kwargs)) = args.last() {
                    step.kwargs = kwargs.clone();
                    args.pop();
                }
                step.args = args;
                Ok(step)
            }
            other => Err(FlowError::InvalidStep(format!(
                "expected a callable, got {}",
                other.type_name()
            ))),
        }
    }

    /// Name identifying the step, used for throttling and logs
    pub fn identity(&self) -> String {
        match &self.callee {
            Callee::Value(Val::Func(func)) => func.name().to_string(),
            Callee::Value(other) => other.type_name().to_string(),
            Callee::Named(name) => name.clone(),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({} args)", self.identity(), self.args.len())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "step panicked".to_string())
}

/// Run one step and normalize its outcome
///
/// Resolves a named callee and `@` argument references against the context,
/// awaits the callable, and wraps the result. Errors from the callee come
/// back as failure envelopes, never as `Err`; a panic becomes a
/// `PanicError` failure.
pub async fn execute_step(step: &Step, context: &Context) -> Transaction {
    let func = match &step.callee {
        Callee::Value(Val::Func(func)) => func.clone(),
        Callee::Value(other) => {
            return Transaction::failure(format!(
                "Step target is not callable: {}",
                other.type_name()
            ))
        }
        Callee::Named(name) => match context.resolve_callable(name) {
            Some(Val::Func(func)) => func,
            _ => return Transaction::failure(FlowError::UnresolvedCallable(name.clone()).to_string()),
        },
    };

    let args = step
        .args
        .iter()
        .map(|arg| context.resolve_argument(arg))
        .collect();
    let kwargs = step
        .kwargs
        .iter()
        .map(|(k, v)| (k.clone(), context.resolve_argument(v)))
        .collect();

    tracing::trace!(step = %func.name(), "executing step");
    let invocation = Invocation::new(args, kwargs, context.clone());
    // Synchronous host functions run inside `call`, so it goes in the block too
    let outcome = AssertUnwindSafe(async { func.call(invocation).await })
        .catch_unwind()
        .await;
    match outcome {
        Ok(Ok(value)) => Transaction::from_val(value),
        Ok(Err(err)) => {
            tracing::debug!(step = %func.name(), error = %err, "step failed");
            Transaction::failure(err.to_string())
        }
        Err(payload) => {
            let message = panic_message(payload);
            tracing::warn!(step = %func.name(), panic = %message, "step panicked");
            Transaction::failure(error_object("PanicError", message))
        }
    }
}
