//! # Execution engine
//!
//! Steps, the `execute_step` primitive, and the combinators built on it.
//! Every result travels as a `Transaction` envelope; failures compose
//! through `retry`, `catch`, `fallback` and `switch` instead of unwinding.

pub mod callable;
pub mod combinators;
pub mod context;
pub mod errors;
pub mod policy;
pub mod signals;
pub mod step;
pub mod throttle;
pub mod transaction;

#[cfg(test)]
mod tests;

pub use callable::{CallResult, Callable, Func, Invocation};
pub use context::{Context, CONTEXT_SIGIL, EVENT_KEY};
pub use errors::FlowError;
pub use policy::{AllowList, PolicyCheck};
pub use signals::Signals;
pub use step::{execute_step, Callee, Step};
pub use throttle::Throttle;
pub use transaction::{error_object, Transaction};
