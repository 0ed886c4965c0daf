//! Callables: anything a step can invoke
//!
//! Host functions and DSL closures share one trait so the engine never needs
//! to know which kind it is running.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::context::Context;
use super::errors::FlowError;
use crate::interpreter::types::{Dict, Val};

pub type CallResult = Result<Val, FlowError>;

/// Arguments and context handed to a callable
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub args: Vec<Val>,
    pub kwargs: Dict,
    pub context: Context,
}

impl Invocation {
    pub fn new(args: Vec<Val>, kwargs: Dict, context: Context) -> Self {
        Self {
            args,
            kwargs,
            context,
        }
    }

    /// Positional argument `index`, or keyword argument `name`
    pub fn arg(&self, index: usize, name: &str) -> Option<&Val> {
        self.args.get(index).or_else(|| self.kwargs.get(name))
    }

    pub fn required(&self, function: &str, index: usize, name: &str) -> Result<&Val, FlowError> {
        self.arg(index, name)
            .ok_or_else(|| FlowError::argument(function, format!("missing argument '{name}'")))
    }
}

pub trait Callable: Send + Sync {
    fn name(&self) -> &str;

    /// The returned future owns everything it needs so it can be spawned
    fn call(&self, invocation: Invocation) -> BoxFuture<'static, CallResult>;
}

type NativeBody = dyn Fn(Invocation) -> BoxFuture<'static, CallResult> + Send + Sync;

/// Host function backed by a closure
struct NativeFn {
    name: String,
    body: Arc<NativeBody>,
}

impl Callable for NativeFn {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, invocation: Invocation) -> BoxFuture<'static, CallResult> {
        (self.body)(invocation)
    }
}

/// Shared handle to a callable, stored in `Val::Func`
#[derive(Clone)]
pub struct Func(Arc<dyn Callable>);

impl Func {
    pub fn new(callable: impl Callable + 'static) -> Self {
        Func(Arc::new(callable))
    }

    /// Wrap an async host function
    pub fn native<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        Func::new(NativeFn {
            name: name.into(),
            body: Arc::new(move |invocation| body(invocation).boxed()),
        })
    }

    /// Wrap a synchronous host function
    pub fn sync<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(Invocation) -> CallResult + Send + Sync + 'static,
    {
        Func::new(NativeFn {
            name: name.into(),
            body: Arc::new(move |invocation| futures::future::ready(body(invocation)).boxed()),
        })
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn call(&self, invocation: Invocation) -> BoxFuture<'static, CallResult> {
        self.0.call(invocation)
    }

    /// Identity comparison
    pub fn same(&self, other: &Func) -> bool {
        Arc::as_ptr(&self.0) as *const u8 == Arc::as_ptr(&other.0) as *const u8
    }
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name())
    }
}
