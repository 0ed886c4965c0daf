//! Execution context threaded through every step
//!
//! A context is plain data. Combinators that fan out clone it so each branch
//! works on its own copy.

use super::transaction::Transaction;
use crate::interpreter::types::{Dict, Env, Val};

/// Context key the trigger scheduler binds event payloads to
pub const EVENT_KEY: &str = "event";

/// Prefix marking an argument as a context reference
pub const CONTEXT_SIGIL: char = '@';

#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Correlation id of the enclosing transaction
    pub identifier: Option<String>,
    /// Results of prior pipe stages, oldest first
    pub outputs: Vec<Transaction>,
    /// Ambient values (`user`, `system`, `event`, ...)
    pub values: Dict,
    /// Scope used to resolve named callables
    pub env: Env,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context of a trusted system caller
    pub fn system() -> Self {
        Self::new().with_value("system", Val::Bool(true))
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: Val) -> Self {
        self.values.insert(key, value);
        self
    }

    pub fn with_env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }

    pub fn get(&self, key: &str) -> Option<&Val> {
        self.values.get(key)
    }

    /// `system == true` or `user == "system"`
    pub fn is_system(&self) -> bool {
        matches!(self.values.get("system"), Some(Val::Bool(true)))
            || matches!(self.values.get("user"), Some(Val::Str(user)) if user == "system")
    }

    /// The context as a value, callables left in place
    pub fn to_val(&self) -> Val {
        let mut map = Dict::new();
        map.insert(
            "identifier",
            self.identifier.clone().map(Val::Str).unwrap_or(Val::Null),
        );
        map.insert(
            "outputs",
            Val::List(self.outputs.iter().cloned().map(Transaction::into_val).collect()),
        );
        for (key, value) in self.values.iter() {
            map.insert(key.clone(), value.clone());
        }
        Val::Dict(map)
    }

    /// Serialization-safe copy for guard queries
    pub fn snapshot(&self) -> Val {
        self.to_val().sanitized()
    }

    /// Resolve a `@path` reference (`@.path` is accepted too)
    ///
    /// The first segment is looked up among the context fields, then in the
    /// scope. Unknown references resolve to `Null`.
    pub fn lookup(&self, reference: &str) -> Val {
        let path = reference.trim_start_matches(CONTEXT_SIGIL);
        let path = path.strip_prefix('.').unwrap_or(path);
        let root = self.to_val();
        if path.is_empty() {
            return root;
        }
        if let Some(found) = root.get_path(path) {
            return found.clone();
        }
        self.env.resolve(path).cloned().unwrap_or(Val::Null)
    }

    /// Replace a sigil-prefixed string argument by the value it references
    pub fn resolve_argument(&self, value: &Val) -> Val {
        match value {
            Val::Str(text) if text.starts_with(CONTEXT_SIGIL) => self.lookup(text),
            other => other.clone(),
        }
    }

    /// Find a callable by name, in the ambient values first, then the scope
    pub fn resolve_callable(&self, name: &str) -> Option<Val> {
        let path = name.trim_start_matches(CONTEXT_SIGIL);
        let path = path.strip_prefix('.').unwrap_or(path);
        if let Some(found) = self.values.get(path) {
            return Some(found.clone());
        }
        let nested = path
            .split_once('.')
            .and_then(|(root, rest)| self.values.get(root)?.get_path(rest));
        nested.or_else(|| self.env.resolve(path)).cloned()
    }
}
