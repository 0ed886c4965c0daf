//! # Tree-walking interpreter
//!
//! `visit(node, env) -> (value, env)` dispatches on the closed `Node` enum.
//! The environment is passed by value and never mutated in place: a
//! dictionary literal threads its own overlay from item to item, so later
//! items see earlier ones while nothing leaks out of the literal.
//!
//! Every call, including pipe stages, goes through `flow::execute_step`.
//! A failed result is raised as a `DslRuntimeError` annotated with the
//! position of the innermost failing node and a breadcrumb trail of the
//! nodes being visited.

pub mod closure;
pub mod errors;
pub mod operators;
pub mod types;

#[cfg(test)]
mod tests;

use futures::future::BoxFuture;
use std::sync::Arc;

use crate::error::Error;
use crate::flow::{execute_step, Callee, Context, Func, Step};
use crate::parser;
use crate::stdlib::Registry;
use crate::triggers::Trigger;

pub use closure::Closure;
pub use errors::DslRuntimeError;
pub use types::{Dict, Env, Node, Span, TypeRegistry, Val};

use operators::apply_binop;
use types::{KwArg, Number, Primitive};

type Visit = Result<(Val, Env), DslRuntimeError>;

/// Result of evaluating a program
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub value: Val,
    /// Triggers declared in the root dictionary, not yet running
    pub triggers: Vec<Trigger>,
}

pub struct Interpreter {
    env: Env,
    types: Arc<TypeRegistry>,
    context: Context,
    stack: Vec<(&'static str, Span)>,
    triggers: Vec<Trigger>,
    dict_depth: usize,
}

impl Interpreter {
    /// Interpreter over the functions of `registry`, with a fresh type registry
    pub fn new(registry: &Registry) -> Self {
        Self::with_env(registry.env(), Arc::new(TypeRegistry::new()))
    }

    pub fn with_env(env: Env, types: Arc<TypeRegistry>) -> Self {
        Self {
            env,
            types,
            context: Context::new(),
            stack: Vec::new(),
            triggers: Vec::new(),
            dict_depth: 0,
        }
    }

    /// Interpreter for closure bodies and trigger actions; it never collects
    /// triggers of its own
    pub(crate) fn nested(env: Env, types: Arc<TypeRegistry>, context: Context) -> Self {
        let mut interpreter = Self::with_env(env, types).with_context(context);
        interpreter.dict_depth = 1;
        interpreter
    }

    /// Base context handed to every call
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /* ===================== Entry Points ===================== */

    pub async fn evaluate(&mut self, node: &Node) -> Result<Evaluation, DslRuntimeError> {
        self.stack.clear();
        self.triggers.clear();
        let env = self.env.clone();
        let (value, _) = self.visit(node, env).await?;
        Ok(Evaluation {
            value,
            triggers: std::mem::take(&mut self.triggers),
        })
    }

    /// Parse and evaluate a program
    pub async fn eval_source(&mut self, source: &str) -> Result<Evaluation, Error> {
        let program = parser::parse_program(source)?;
        Ok(self.evaluate(&program).await?)
    }

    /// Parse and evaluate a single expression
    pub async fn eval_expression(&mut self, source: &str) -> Result<Val, Error> {
        let expression = parser::parse_expression(source)?;
        Ok(self.evaluate(&expression).await?.value)
    }

    /* ===================== Dispatch ===================== */

    pub fn visit<'a>(&'a mut self, node: &'a Node, env: Env) -> BoxFuture<'a, Visit> {
        Box::pin(async move {
            self.stack.push((node.tag(), node.span()));
            let result = self.dispatch(node, env).await;
            let result = result.map_err(|err| self.annotate(err, node.span()));
            self.stack.pop();
            result
        })
    }

    async fn dispatch(&mut self, node: &Node, env: Env) -> Visit {
        match node {
            Node::Number { v, .. } => {
                let value = match v {
                    Number::Int(n) => Val::Int(*n),
                    Number::Real(r) => Val::Real(*r),
                };
                Ok((value, env))
            }
            Node::Str { v, .. } => Ok((Val::Str(v.clone()), env)),
            Node::Bool { v, .. } => Ok((Val::Bool(*v), env)),
            Node::Any { .. } => Ok((Val::Null, env)),
            Node::Var { name, .. } => {
                // Unresolved names evaluate to their own text
                let value = env
                    .resolve(name)
                    .cloned()
                    .unwrap_or_else(|| Val::Str(name.clone()));
                Ok((value, env))
            }
            Node::Tuple { items, .. } => {
                let (values, env) = self.visit_sequence(items, env).await?;
                Ok((Val::Tuple(values), env))
            }
            Node::List { items, .. } => {
                let (values, env) = self.visit_sequence(items, env).await?;
                Ok((Val::List(values), env))
            }
            Node::Dict { items, .. } => self.visit_dict(items, env).await,
            Node::Declaration {
                declared_type,
                name,
                value,
                ..
            } => {
                let value = self.visit_declaration(declared_type, name, value, &env).await?;
                Ok((Val::Tuple(vec![Val::Str(name.clone()), value]), env))
            }
            Node::Pair { key, value, .. } => {
                let key = self.visit_key(key, &env).await?;
                let (value, _) = self.visit(value, env.clone()).await?;
                Ok((Val::Tuple(vec![key, value]), env))
            }
            Node::Call {
                name,
                args,
                kwargs,
                span,
            } => {
                let value = self.invoke(name, None, args, kwargs, &env, *span).await?;
                Ok((value, env))
            }
            Node::Binop {
                op, left, right, ..
            } => {
                let (left, env) = self.visit(left, env).await?;
                let (right, env) = self.visit(right, env).await?;
                let value = apply_binop(*op, &left, &right)?;
                Ok((value, env))
            }
            Node::Not { value, .. } => {
                let (value, env) = self.visit(value, env).await?;
                Ok((Val::Bool(!value.is_truthy()), env))
            }
            Node::Pipe { steps, .. } => self.visit_pipe(steps, env).await,
            Node::FunctionDef {
                params,
                body,
                returns,
                span,
            } => {
                let closure = Closure::new(
                    format!("closure@{}", span.start_label()),
                    params.clone(),
                    (**body).clone(),
                    returns.clone(),
                    env.clone(),
                    self.types.clone(),
                );
                Ok((Val::Func(Func::new(closure)), env))
            }
        }
    }

    /* ===================== Node Handlers ===================== */

    async fn visit_sequence(
        &mut self,
        items: &[Node],
        env: Env,
    ) -> Result<(Vec<Val>, Env), DslRuntimeError> {
        let mut values = Vec::with_capacity(items.len());
        let mut env = env;
        for item in items {
            let (value, next) = self.visit(item, env).await?;
            values.push(value);
            env = next;
        }
        Ok((values, env))
    }

    async fn visit_dict(&mut self, items: &[Node], env: Env) -> Visit {
        let collects_triggers = self.dict_depth == 0;
        self.dict_depth += 1;
        let result = self.fill_dict(items, &env, collects_triggers).await;
        self.dict_depth -= 1;
        Ok((Val::Dict(result?), env))
    }

    /// Evaluate items in order, each against the outer scope overlaid with
    /// the items before it
    async fn fill_dict(
        &mut self,
        items: &[Node],
        env: &Env,
        collects_triggers: bool,
    ) -> Result<Dict, DslRuntimeError> {
        let mut result = Dict::new();
        let mut scope = env.clone();

        for item in items {
            if collects_triggers {
                if let Node::Pair { key, value, span } = item {
                    if let Some(trigger) = Trigger::detect(key, value, &scope, *span) {
                        tracing::debug!(trigger = %trigger, "collected trigger");
                        self.triggers.push(trigger);
                        continue;
                    }
                }
            }

            let (entry, _) = self.visit(item, scope.clone()).await?;
            for (name, value) in entry_bindings(item, entry)? {
                scope = scope.bind(name.clone(), value.clone());
                result.insert(name, value);
            }
        }

        Ok(result)
    }

    async fn visit_declaration(
        &mut self,
        declared_type: &str,
        name: &str,
        value: &Node,
        env: &Env,
    ) -> Result<Val, DslRuntimeError> {
        let (value, _) = self.visit(value, env.clone()).await?;
        self.types.check(name, declared_type, &value)?;
        if let (Some(Primitive::Type), Val::Dict(schema)) =
            (Primitive::from_name(declared_type), &value)
        {
            self.types.register(name, schema.clone());
        }
        Ok(value)
    }

    /// A bare name is its own key; a tuple of names is a destructuring key
    async fn visit_key(&mut self, key: &Node, env: &Env) -> Result<Val, DslRuntimeError> {
        match key {
            Node::Var { name, .. } => Ok(Val::Str(name.clone())),
            Node::Tuple { items, .. } if is_name_tuple(items) => Ok(Val::Tuple(
                items
                    .iter()
                    .filter_map(|item| match item {
                        Node::Var { name, .. } => Some(Val::Str(name.clone())),
                        _ => None,
                    })
                    .collect(),
            )),
            other => Ok(self.visit(other, env.clone()).await?.0),
        }
    }

    async fn visit_pipe(&mut self, steps: &[Node], env: Env) -> Visit {
        let Some((first, rest)) = steps.split_first() else {
            return Ok((Val::Null, env));
        };
        let (mut running, _) = self.visit(first, env.clone()).await?;

        for step in rest {
            self.stack.push((step.tag(), step.span()));
            let outcome = match step {
                Node::Call {
                    name,
                    args,
                    kwargs,
                    span,
                } => {
                    self.invoke(name, Some(running), args, kwargs, &env, *span)
                        .await
                }
                Node::Var { name, span } => {
                    self.invoke(name, Some(running), &[], &[], &env, *span)
                        .await
                }
                other => Err(DslRuntimeError::new(format!(
                    "Pipe stage must be a call or a function name, got {}",
                    other.tag()
                ))),
            };
            let outcome = outcome.map_err(|err| self.annotate(err, step.span()));
            self.stack.pop();
            running = outcome?;
        }

        Ok((running, env))
    }

    /// Resolve `name`, evaluate arguments, and run the call as a step
    async fn invoke(
        &mut self,
        name: &str,
        piped: Option<Val>,
        args: &[Node],
        kwargs: &[KwArg],
        env: &Env,
        span: Span,
    ) -> Result<Val, DslRuntimeError> {
        let func = match env.resolve(name) {
            Some(Val::Func(func)) => func.clone(),
            _ => {
                return Err(DslRuntimeError::at(
                    format!("Function '{name}' not found or not callable"),
                    span,
                ))
            }
        };

        let mut values: Vec<Val> = piped.into_iter().collect();
        let mut scope = env.clone();
        for arg in args {
            let (value, next) = self.visit(arg, scope).await?;
            values.push(value);
            scope = next;
        }
        let mut named = Dict::new();
        for kwarg in kwargs {
            let (value, _) = self.visit(&kwarg.value, env.clone()).await?;
            named.insert(kwarg.name.clone(), value);
        }

        let step = Step::new(Callee::Value(Val::Func(func)), values, named);
        let context = self.context.clone().with_env(env.clone());
        let outcome = execute_step(&step, &context).await;
        if outcome.success {
            Ok(outcome.data)
        } else {
            Err(DslRuntimeError::at(outcome.error_message(), span))
        }
    }

    /* ===================== Diagnostics ===================== */

    fn annotate(&self, mut err: DslRuntimeError, span: Span) -> DslRuntimeError {
        if err.span.is_none() {
            err.span = Some(span);
        }
        if err.trace.is_none() {
            err.trace = Some(self.breadcrumbs());
        }
        err
    }

    /// `tag(line:col) -> tag(line:col) -> ...`, outermost first
    fn breadcrumbs(&self) -> String {
        self.stack
            .iter()
            .map(|(tag, span)| format!("{tag}({})", span.start_label()))
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

fn is_name_tuple(items: &[Node]) -> bool {
    !items.is_empty() && items.iter().all(|item| matches!(item, Node::Var { .. }))
}

/// Names bound by one evaluated dictionary item
fn entry_bindings(item: &Node, entry: Val) -> Result<Vec<(String, Val)>, DslRuntimeError> {
    let Val::Tuple(mut parts) = entry else {
        return Err(DslRuntimeError::at(
            format!("Dictionary item must be a pair or declaration, got {}", item.tag()),
            item.span(),
        ));
    };
    if parts.len() != 2 {
        return Err(DslRuntimeError::at("Malformed dictionary item", item.span()));
    }
    let value = parts.pop().unwrap_or(Val::Null);
    let key = parts.pop().unwrap_or(Val::Null);

    let destructures = matches!(item, Node::Pair { key, .. } if matches!(&**key, Node::Tuple { items, .. } if is_name_tuple(items)));
    if !destructures {
        return Ok(vec![(key.to_key(), value)]);
    }

    let names: Vec<String> = key.as_seq().unwrap_or(&[]).iter().map(Val::to_key).collect();
    match value.as_seq() {
        Some(values) if values.len() == names.len() => {
            Ok(names.into_iter().zip(values.iter().cloned()).collect())
        }
        _ => Err(DslRuntimeError::at(
            format!(
                "Cannot destructure {} into {} names",
                value.type_name(),
                names.len()
            ),
            item.span(),
        )),
    }
}
