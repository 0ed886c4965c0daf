//! The `{success, data, errors}` result envelope

use crate::interpreter::types::{Dict, Val};

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub success: bool,
    pub data: Val,
    pub errors: Vec<Val>,
}

impl Transaction {
    pub fn success(data: Val) -> Self {
        Self {
            success: true,
            data,
            errors: vec![],
        }
    }

    pub fn failure(error: impl Into<Val>) -> Self {
        Self {
            success: false,
            data: Val::Null,
            errors: vec![error.into()],
        }
    }

    pub fn failure_with(data: Val, errors: Vec<Val>) -> Self {
        Self {
            success: false,
            data,
            errors,
        }
    }

    /// Normalize a raw return value
    ///
    /// A dict with a boolean `success` and a `data` or `errors` entry is
    /// already an envelope; anything else is wrapped as a success.
    pub fn from_val(value: Val) -> Self {
        if let Val::Dict(map) = &value {
            if let Some(Val::Bool(success)) = map.get("success") {
                if map.contains_key("data") || map.contains_key("errors") {
                    let errors = match map.get("errors") {
                        Some(Val::List(items)) | Some(Val::Tuple(items)) => items.clone(),
                        Some(Val::Null) | None => vec![],
                        Some(other) => vec![other.clone()],
                    };
                    return Self {
                        success: *success,
                        data: map.get("data").cloned().unwrap_or(Val::Null),
                        errors,
                    };
                }
            }
        }
        Self::success(value)
    }

    pub fn into_val(self) -> Val {
        let mut map = Dict::new();
        map.insert("success", Val::Bool(self.success));
        map.insert("data", self.data);
        map.insert("errors", Val::List(self.errors));
        Val::Dict(map)
    }

    /// First error as text; error objects contribute their `message`
    pub fn error_message(&self) -> String {
        match self.errors.first() {
            Some(Val::Dict(map)) => match map.get("message") {
                Some(message) => message.to_string(),
                None => Val::Dict(map.clone()).to_string(),
            },
            Some(other) => other.to_string(),
            None if self.success => String::new(),
            None => "Step failed without an error message".to_string(),
        }
    }
}

/// Error entry of the form `{type, message}`
pub fn error_object(kind: &str, message: impl Into<String>) -> Val {
    let mut map = Dict::new();
    map.insert("type", Val::from(kind));
    map.insert("message", Val::Str(message.into()));
    Val::Dict(map)
}
