//! Crate-level error for parse-and-evaluate entry points

use thiserror::Error;

use crate::interpreter::DslRuntimeError;
use crate::parser::ParseError;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Runtime(#[from] DslRuntimeError),
}
