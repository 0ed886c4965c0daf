//! Runtime errors raised while visiting the AST

use std::fmt;

use super::types::Span;

/// Runtime or type error with position and node trace
///
/// Renders as `message (line L:C - EL:EC) | Stack trace: tag(L:C) -> ...`.
/// The span and trace are filled in by the innermost node that sees the
/// error; outer nodes leave them alone.
#[derive(Debug, Clone, PartialEq)]
pub struct DslRuntimeError {
    pub message: String,
    pub span: Option<Span>,
    pub trace: Option<String>,
}

impl DslRuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
            trace: None,
        }
    }

    pub fn at(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span: Some(span),
            trace: None,
        }
    }
}

impl fmt::Display for DslRuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(span) = &self.span {
            write!(f, " ({span})")?;
        }
        if let Some(trace) = &self.trace {
            write!(f, " | Stack trace: {trace}")?;
        }
        Ok(())
    }
}

impl std::error::Error for DslRuntimeError {}

impl From<String> for DslRuntimeError {
    fn from(message: String) -> Self {
        DslRuntimeError::new(message)
    }
}
