pub mod application;
pub mod cli;
pub mod config;
pub mod error;
pub mod flow;
pub mod interpreter;
pub mod parser;
pub mod resource;
pub mod stdlib;
pub mod triggers;

// Re-export main types
pub use application::{Application, ApplicationBuilder, Program};
pub use config::Config;
pub use error::Error;
pub use flow::{execute_step, Context, FlowError, Func, Step, Transaction};
pub use interpreter::{DslRuntimeError, Evaluation, Interpreter, Val};
pub use parser::ParseError;
pub use stdlib::Registry;
pub use triggers::{Trigger, TriggerScheduler};
