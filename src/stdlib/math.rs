//! Arithmetic

use std::cmp::Ordering;

use super::Registry;
use crate::flow::{CallResult, FlowError, Invocation};
use crate::interpreter::operators::apply_binop;
use crate::interpreter::types::{BinaryOp, Val};

pub(super) fn install(registry: &mut Registry) {
    registry.register_fn("add", |inv| fold("add", BinaryOp::Add, &inv));
    registry.register_fn("mul", |inv| fold("mul", BinaryOp::Mul, &inv));
    registry.register_fn("sub", |inv| binary("sub", BinaryOp::Sub, &inv));
    registry.register_fn("div", |inv| binary("div", BinaryOp::Div, &inv));
    registry.register_fn("mod", |inv| binary("mod", BinaryOp::Mod, &inv));
    registry.register_fn("pow", |inv| binary("pow", BinaryOp::Pow, &inv));
    registry.register_fn("neg", neg);
    registry.register_fn("abs", abs);
    registry.register_fn("min", |inv| extreme("min", Ordering::Less, &inv));
    registry.register_fn("max", |inv| extreme("max", Ordering::Greater, &inv));
}

fn fold(function: &str, op: BinaryOp, inv: &Invocation) -> CallResult {
    let (first, rest) = inv
        .args
        .split_first()
        .ok_or_else(|| FlowError::argument(function, "expected at least one argument"))?;
    rest.iter().try_fold(first.clone(), |acc, value| {
        apply_binop(op, &acc, value).map_err(|message| FlowError::argument(function, message))
    })
}

fn binary(function: &str, op: BinaryOp, inv: &Invocation) -> CallResult {
    let left = inv.required(function, 0, "a")?;
    let right = inv.required(function, 1, "b")?;
    apply_binop(op, left, right).map_err(|message| FlowError::argument(function, message))
}

fn neg(inv: Invocation) -> CallResult {
    match inv.required("neg", 0, "value")? {
        Val::Int(n) => n
            .checked_neg()
            .map(Val::Int)
            .ok_or_else(|| FlowError::argument("neg", "integer overflow")),
        Val::Real(n) => Ok(Val::Real(-n)),
        other => Err(FlowError::argument(
            "neg",
            format!("expected a number, got {}", other.type_name()),
        )),
    }
}

fn abs(inv: Invocation) -> CallResult {
    match inv.required("abs", 0, "value")? {
        Val::Int(n) => n
            .checked_abs()
            .map(Val::Int)
            .ok_or_else(|| FlowError::argument("abs", "integer overflow")),
        Val::Real(n) => Ok(Val::Real(n.abs())),
        other => Err(FlowError::argument(
            "abs",
            format!("expected a number, got {}", other.type_name()),
        )),
    }
}

/// Smallest or largest of the arguments, or of a single list argument
fn extreme(function: &str, wanted: Ordering, inv: &Invocation) -> CallResult {
    let values: &[Val] = match inv.args.as_slice() {
        [single] => single.as_seq().unwrap_or(std::slice::from_ref(single)),
        many => many,
    };
    let (first, rest) = values
        .split_first()
        .ok_or_else(|| FlowError::argument(function, "expected at least one value"))?;

    let mut best = first;
    for candidate in rest {
        let op = if wanted == Ordering::Less {
            BinaryOp::Lt
        } else {
            BinaryOp::Gt
        };
        let better = apply_binop(op, candidate, best)
            .map_err(|message| FlowError::argument(function, message))?;
        if better.is_truthy() {
            best = candidate;
        }
    }
    Ok(best.clone())
}
