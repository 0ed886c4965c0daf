//! Structural type registry
//!
//! Holds the fixed primitive table plus the custom types registered by
//! `type:Name := {...}` declarations. One registry belongs to one
//! interpreter session and is shared with the closures and trigger tasks it
//! spawns.

use super::values::{Dict, Val};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Integer,
    Real,
    Str,
    Bool,
    Dict,
    List,
    Tuple,
    Function,
    Any,
    /// Declaring a `type` registers a custom type; its value is a dict
    Type,
}

impl Primitive {
    /// Resolve a primitive name or alias
    pub fn from_name(name: &str) -> Option<Primitive> {
        let primitive = match name {
            "int" | "integer" | "natural" | "i8" | "i16" | "i32" | "i64" | "n8" | "n16"
            | "n32" | "n64" => Primitive::Integer,
            "real" | "float" | "rational" | "f32" | "f64" => Primitive::Real,
            "str" | "string" => Primitive::Str,
            "bool" | "boolean" => Primitive::Bool,
            "dict" => Primitive::Dict,
            "list" | "vector" | "matrix" => Primitive::List,
            "tuple" => Primitive::Tuple,
            "function" => Primitive::Function,
            "any" => Primitive::Any,
            "type" => Primitive::Type,
            _ => return None,
        };
        Some(primitive)
    }

    /// Exact representation match, no coercion
    pub fn accepts(&self, value: &Val) -> bool {
        matches!(
            (self, value),
            (Primitive::Any, _)
                | (Primitive::Integer, Val::Int(_))
                | (Primitive::Real, Val::Real(_))
                | (Primitive::Str, Val::Str(_))
                | (Primitive::Bool, Val::Bool(_))
                | (Primitive::Dict | Primitive::Type, Val::Dict(_))
                | (Primitive::List, Val::List(_))
                | (Primitive::Tuple, Val::Tuple(_))
                | (Primitive::Function, Val::Func(_))
        )
    }
}

#[derive(Debug, Default)]
pub struct TypeRegistry {
    custom: RwLock<HashMap<String, Dict>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, schema: Dict) {
        let name = name.into();
        tracing::debug!(type_name = %name, "registered custom type");
        self.custom
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name, schema);
    }

    pub fn is_custom(&self, name: &str) -> bool {
        self.custom
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(name)
    }

    /// Check `value` bound to `var` against `declared`
    ///
    /// Custom types accept any dict without looking at its fields. A name
    /// that is neither a primitive nor a registered type is not checked.
    pub fn check(&self, var: &str, declared: &str, value: &Val) -> Result<(), String> {
        let accepted = match Primitive::from_name(declared) {
            Some(primitive) => primitive.accepts(value),
            None if self.is_custom(declared) => matches!(value, Val::Dict(_)),
            None => {
                tracing::debug!(type_name = %declared, var = %var, "unchecked declaration");
                true
            }
        };
        if accepted {
            Ok(())
        } else {
            Err(format!(
                "Type error for '{var}': expected {declared}, got {}",
                value.type_name()
            ))
        }
    }
}
