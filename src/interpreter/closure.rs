//! DSL function values
//!
//! `(int:a, int:b), {sum: a + b}, (int:sum)` evaluates to a closure over the
//! scope it was written in. Calling it binds the parameters in a new frame,
//! evaluates the body dictionary, then projects and checks the named outputs.

use futures::future::BoxFuture;
use std::sync::Arc;

use super::errors::DslRuntimeError;
use super::types::{Env, Node, TypeRegistry, TypedName, Val};
use super::Interpreter;
use crate::flow::{CallResult, Callable, FlowError, Invocation};

#[derive(Clone)]
pub struct Closure {
    inner: Arc<ClosureDef>,
}

struct ClosureDef {
    name: String,
    params: Vec<TypedName>,
    body: Node,
    returns: Vec<TypedName>,
    env: Env,
    types: Arc<TypeRegistry>,
}

impl Closure {
    pub fn new(
        name: String,
        params: Vec<TypedName>,
        body: Node,
        returns: Vec<TypedName>,
        env: Env,
        types: Arc<TypeRegistry>,
    ) -> Self {
        Self {
            inner: Arc::new(ClosureDef {
                name,
                params,
                body,
                returns,
                env,
                types,
            }),
        }
    }
}

impl Callable for Closure {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn call(&self, invocation: Invocation) -> BoxFuture<'static, CallResult> {
        let def = self.inner.clone();
        Box::pin(async move { def.invoke(invocation).await })
    }
}

impl ClosureDef {
    async fn invoke(&self, invocation: Invocation) -> CallResult {
        if invocation.args.len() > self.params.len() {
            return Err(FlowError::argument(
                &self.name,
                format!(
                    "expected at most {} arguments, got {}",
                    self.params.len(),
                    invocation.args.len()
                ),
            ));
        }

        let mut bindings = Vec::with_capacity(self.params.len());
        for (index, param) in self.params.iter().enumerate() {
            let value = invocation.arg(index, &param.name).cloned().ok_or_else(|| {
                DslRuntimeError::at(format!("Missing argument '{}'", param.name), param.span)
            })?;
            self.types
                .check(&param.name, &param.type_name, &value)
                .map_err(|message| DslRuntimeError::at(message, param.span))?;
            bindings.push((param.name.clone(), value));
        }

        let env = self.env.extend(bindings);
        let mut interpreter =
            Interpreter::nested(env.clone(), self.types.clone(), invocation.context);
        let (result, _) = interpreter.visit(&self.body, env).await?;
        Ok(self.project(result)?)
    }

    /// One return yields the value itself, several a tuple, none the body
    fn project(&self, result: Val) -> Result<Val, DslRuntimeError> {
        if self.returns.is_empty() {
            return Ok(result);
        }
        let Val::Dict(fields) = &result else {
            return Err(DslRuntimeError::new(format!(
                "Function body must produce a dict, got {}",
                result.type_name()
            )));
        };

        let mut projected = Vec::with_capacity(self.returns.len());
        for output in &self.returns {
            let value = fields.get(&output.name).cloned().ok_or_else(|| {
                DslRuntimeError::at(
                    format!("Function result is missing '{}'", output.name),
                    output.span,
                )
            })?;
            self.types
                .check(&output.name, &output.type_name, &value)
                .map_err(|message| DslRuntimeError::at(message, output.span))?;
            projected.push(value);
        }

        if projected.len() == 1 {
            Ok(projected.remove(0))
        } else {
            Ok(Val::Tuple(projected))
        }
    }
}
