//! Control combinators over steps
//!
//! Every combinator takes steps and a context and returns a `Transaction`;
//! none of them lets a callee error escape as `Err` (`work`'s permission
//! denial is the one deliberate exception).

mod concurrency;
mod guard;
mod resilience;
mod sequence;
mod work;

pub use concurrency::{batch, race};
pub use guard::guard;
pub use resilience::{
    catch, fallback, is_retryable, retry, retry_on, timeout, DEFAULT_RETRYABLE_ERRORS,
};
pub use sequence::{branch, foreach, pipe, switch};
pub use work::work;
