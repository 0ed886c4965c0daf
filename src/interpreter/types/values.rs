//! Runtime value types

use crate::flow::callable::Func;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::fmt;

/// Runtime value type
#[derive(Clone)]
pub enum Val {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
    List(Vec<Val>),
    Tuple(Vec<Val>),
    Dict(Dict),
    /// Host function or DSL closure
    Func(Func),
}

impl Val {
    /// Check if value is truthy (for conditionals and guards)
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Null => false,
            Val::Bool(b) => *b,
            Val::Int(n) => *n != 0,
            Val::Real(n) => *n != 0.0,
            Val::Str(s) => !s.is_empty(),
            Val::List(items) | Val::Tuple(items) => !items.is_empty(),
            Val::Dict(map) => !map.is_empty(),
            Val::Func(_) => true,
        }
    }

    /// Name of the value's runtime type, as shown in type errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Null => "null",
            Val::Bool(_) => "boolean",
            Val::Int(_) => "integer",
            Val::Real(_) => "real",
            Val::Str(_) => "string",
            Val::List(_) => "list",
            Val::Tuple(_) => "tuple",
            Val::Dict(_) => "dict",
            Val::Func(_) => "function",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Val::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Val::Int(n) => Some(*n as f64),
            Val::Real(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Val::Dict(map) => Some(map),
            _ => None,
        }
    }

    /// Elements of a list or tuple
    pub fn as_seq(&self) -> Option<&[Val]> {
        match self {
            Val::List(items) | Val::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Follow a dotted path; numeric segments index lists and tuples
    pub fn get_path(&self, path: &str) -> Option<&Val> {
        if path.is_empty() {
            return Some(self);
        }
        path.split('.').try_fold(self, |current, segment| match current {
            Val::Dict(map) => map.get(segment),
            Val::List(items) | Val::Tuple(items) => {
                segment.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            _ => None,
        })
    }

    /// Render as a dictionary key
    pub fn to_key(&self) -> String {
        match self {
            Val::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Copy with every callable replaced by its name, safe to serialize
    pub fn sanitized(&self) -> Val {
        match self {
            Val::Func(f) => Val::Str(format!("<function {}>", f.name())),
            Val::List(items) => Val::List(items.iter().map(Val::sanitized).collect()),
            Val::Tuple(items) => Val::Tuple(items.iter().map(Val::sanitized).collect()),
            Val::Dict(map) => Val::Dict(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.sanitized()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Val::Null => JsonValue::Null,
            Val::Bool(b) => JsonValue::Bool(*b),
            Val::Int(n) => JsonValue::from(*n),
            Val::Real(n) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Val::Str(s) => JsonValue::String(s.clone()),
            Val::List(items) | Val::Tuple(items) => {
                JsonValue::Array(items.iter().map(Val::to_json).collect())
            }
            Val::Dict(map) => JsonValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Val::Func(f) => JsonValue::String(format!("<function {}>", f.name())),
        }
    }

    pub fn from_json(value: &JsonValue) -> Val {
        match value {
            JsonValue::Null => Val::Null,
            JsonValue::Bool(b) => Val::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Val::Int(i),
                None => Val::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Val::Str(s.clone()),
            JsonValue::Array(items) => Val::List(items.iter().map(Val::from_json).collect()),
            JsonValue::Object(map) => Val::Dict(
                map.iter()
                    .map(|(k, v)| (k.clone(), Val::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Structural equality; integers and reals compare numerically
impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Val::Null, Val::Null) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Int(a), Val::Int(b)) => a == b,
            (Val::Int(a), Val::Real(b)) | (Val::Real(b), Val::Int(a)) => (*a as f64) == *b,
            (Val::Real(a), Val::Real(b)) => a == b,
            (Val::Str(a), Val::Str(b)) => a == b,
            (Val::List(a), Val::List(b)) => a == b,
            (Val::Tuple(a), Val::Tuple(b)) => a == b,
            (Val::Dict(a), Val::Dict(b)) => a == b,
            (Val::Func(a), Val::Func(b)) => a.same(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Null => write!(f, "Null"),
            Val::Bool(b) => write!(f, "Bool({b})"),
            Val::Int(n) => write!(f, "Int({n})"),
            Val::Real(n) => write!(f, "Real({n})"),
            Val::Str(s) => write!(f, "Str({s:?})"),
            Val::List(items) => f.debug_tuple("List").field(items).finish(),
            Val::Tuple(items) => f.debug_tuple("Tuple").field(items).finish(),
            Val::Dict(map) => f.debug_tuple("Dict").field(map).finish(),
            Val::Func(func) => write!(f, "Func({})", func.name()),
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Str(s) => write!(f, "{s}"),
            Val::Func(func) => write!(f, "<function {}>", func.name()),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}

impl From<i64> for Val {
    fn from(n: i64) -> Self {
        Val::Int(n)
    }
}

impl From<f64> for Val {
    fn from(n: f64) -> Self {
        Val::Real(n)
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::Str(s.to_string())
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::Str(s)
    }
}

impl From<Dict> for Val {
    fn from(map: Dict) -> Self {
        Val::Dict(map)
    }
}

impl From<Vec<Val>> for Val {
    fn from(items: Vec<Val>) -> Self {
        Val::List(items)
    }
}

/* ===================== Dict ===================== */

/// Insertion-ordered string-keyed mapping
///
/// Re-inserting an existing key replaces the value in place. Equality
/// ignores order.
#[derive(Clone, Default)]
pub struct Dict {
    entries: IndexMap<String, Val>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Val> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Val> {
        self.entries.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Val) -> Option<Val> {
        self.entries.insert(key.into(), value)
    }

    /// Later keys keep their relative order
    pub fn remove(&mut self, key: &str) -> Option<Val> {
        self.entries.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Val)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Val> {
        self.entries.values()
    }
}

impl PartialEq for Dict {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl fmt::Debug for Dict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl FromIterator<(String, Val)> for Dict {
    fn from_iter<I: IntoIterator<Item = (String, Val)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Dict {
    type Item = (String, Val);
    type IntoIter = indexmap::map::IntoIter<String, Val>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
