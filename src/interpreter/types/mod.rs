//! Type definitions for the interpreter
//!
//! - AST nodes (`Node`) and source spans
//! - Runtime values (`Val`, `Dict`)
//! - The persistent environment (`Env`)
//! - The per-session type registry

pub mod ast;
pub mod env;
pub mod registry;
pub mod values;

pub use ast::{BinaryOp, KwArg, Node, Number, Span, TypedName};
pub use env::Env;
pub use registry::{Primitive, TypeRegistry};
pub use values::{Dict, Val};
