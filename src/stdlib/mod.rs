//! # Capability registry
//!
//! Host functions exposed to DSL programs. A `Registry` is an ordered
//! name → callable map; `Interpreter::new` turns it into the root scope.
//! `Registry::standard` installs the built-in set, and hosts add their own
//! with `register`.

mod collections;
mod convert;
mod flow;
mod io;
mod math;

#[cfg(test)]
mod tests;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, EngineConfig};
use crate::flow::{
    AllowList, CallResult, FlowError, Func, Invocation, PolicyCheck, Signals, Step, Throttle,
};
use crate::interpreter::types::{Dict, Env, Val};
use crate::resource::{FileResourceLoader, ResourceLoader};

/// Shared collaborators the built-in functions close over
#[derive(Clone)]
pub struct Services {
    pub engine: EngineConfig,
    pub loader: Arc<dyn ResourceLoader>,
    /// `None` is the offline state for `work`
    pub policy: Option<Arc<dyn PolicyCheck>>,
    pub signals: Arc<Signals>,
    pub throttle: Arc<Throttle>,
}

impl Services {
    pub fn from_config(config: &Config) -> Self {
        let policy: Option<Arc<dyn PolicyCheck>> = if config.policy.enabled {
            Some(Arc::new(AllowList::new(config.policy.allow.clone())))
        } else {
            None
        };
        Self {
            engine: config.engine.clone(),
            loader: Arc::new(FileResourceLoader::new(config.resources.root.clone())),
            policy,
            signals: Arc::new(Signals::new()),
            throttle: Arc::new(Throttle::new()),
        }
    }
}

#[derive(Clone, Default)]
pub struct Registry {
    functions: Dict,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in function
    pub fn standard(config: &Config) -> Self {
        Self::with_services(Services::from_config(config))
    }

    pub fn with_services(services: Services) -> Self {
        let mut registry = Self::new();
        math::install(&mut registry);
        collections::install(&mut registry);
        convert::install(&mut registry);
        io::install(&mut registry, &services);
        flow::install(&mut registry, &services);
        registry
    }

    /// Add or replace a function under `name`
    pub fn register(&mut self, name: impl Into<String>, func: Func) {
        self.functions.insert(name, Val::Func(func));
    }

    pub fn register_fn<F>(&mut self, name: &str, body: F)
    where
        F: Fn(Invocation) -> CallResult + Send + Sync + 'static,
    {
        self.register(name, Func::sync(name, body));
    }

    pub fn register_async<F, Fut>(&mut self, name: &str, body: F)
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        self.register(name, Func::native(name, body));
    }

    pub fn get(&self, name: &str) -> Option<&Func> {
        match self.functions.get(name) {
            Some(Val::Func(func)) => Some(func),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Root scope holding every registered function
    pub fn env(&self) -> Env {
        Env::from_bindings(self.functions.clone())
    }
}

/* ===================== Argument Helpers ===================== */

fn step_arg(invocation: &Invocation, function: &str, index: usize, name: &str) -> Result<Step, FlowError> {
    Step::from_val(invocation.required(function, index, name)?)
}

/// Every positional argument from `start` on, as steps
fn step_args(invocation: &Invocation, start: usize) -> Result<Vec<Step>, FlowError> {
    invocation.args.iter().skip(start).map(Step::from_val).collect()
}

fn int_arg(invocation: &Invocation, function: &str, index: usize, name: &str) -> Result<Option<i64>, FlowError> {
    match invocation.arg(index, name) {
        None | Some(Val::Null) => Ok(None),
        Some(Val::Int(n)) => Ok(Some(*n)),
        Some(other) => Err(FlowError::argument(
            function,
            format!("'{name}' must be an integer, got {}", other.type_name()),
        )),
    }
}

fn number_arg(invocation: &Invocation, function: &str, index: usize, name: &str) -> Result<Option<f64>, FlowError> {
    match invocation.arg(index, name) {
        None | Some(Val::Null) => Ok(None),
        Some(value) => match value.as_f64() {
            Some(n) if n.is_finite() && n >= 0.0 => Ok(Some(n)),
            _ => Err(FlowError::argument(
                function,
                format!("'{name}' must be a non-negative number, got {value}"),
            )),
        },
    }
}

/// Seconds given as a number
fn seconds_arg(invocation: &Invocation, function: &str, index: usize, name: &str) -> Result<Option<Duration>, FlowError> {
    number_arg(invocation, function, index, name)?
        .map(|secs| duration_arg(function, name, secs))
        .transpose()
}

fn duration_arg(function: &str, name: &str, secs: f64) -> Result<Duration, FlowError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|err| FlowError::argument(function, format!("'{name}' is out of range: {err}")))
}

fn str_arg<'a>(invocation: &'a Invocation, function: &str, index: usize, name: &str) -> Result<&'a str, FlowError> {
    let value = invocation.required(function, index, name)?;
    value.as_str().ok_or_else(|| {
        FlowError::argument(
            function,
            format!("'{name}' must be a string, got {}", value.type_name()),
        )
    })
}
