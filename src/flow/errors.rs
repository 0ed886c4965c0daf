//! Engine error type
//!
//! These never cross a combinator boundary as `Err`: `execute_step` folds
//! them into failure envelopes. They are returned as `Err` only by the
//! callables themselves and by `work` on permission denial.

use crate::interpreter::errors::DslRuntimeError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum FlowError {
    /// A DSL closure failed while evaluating its body
    #[error(transparent)]
    Runtime(#[from] DslRuntimeError),

    #[error("Callable '{0}' not found in context")]
    UnresolvedCallable(String),

    #[error("Invalid step: {0}")]
    InvalidStep(String),

    #[error("{function}: {message}")]
    Argument { function: String, message: String },

    #[error("Access denied: {0}")]
    PermissionDenied(String),

    /// Failure reported by a host function
    #[error("{0}")]
    Failed(String),
}

impl FlowError {
    pub fn argument(function: &str, message: impl Into<String>) -> Self {
        FlowError::Argument {
            function: function.to_string(),
            message: message.into(),
        }
    }
}
