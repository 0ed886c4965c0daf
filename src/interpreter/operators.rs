//! Binary operator semantics
//!
//! Numbers follow the usual promotion rule: two integers stay integral
//! (except `/`, which always yields a real), anything involving a real is
//! real. Integer overflow is an error rather than a wrap.

use std::cmp::Ordering;

use super::types::{BinaryOp, Val};

/// Longest string (in bytes) or list a single operation may build
pub(crate) const MAX_SEQUENCE_LEN: usize = 1 << 24;

pub fn apply_binop(op: BinaryOp, left: &Val, right: &Val) -> Result<Val, String> {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => arithmetic(op, left, right, i64::checked_sub, |a, b| a - b),
        BinaryOp::Mul => multiply(left, right),
        BinaryOp::Div => divide(left, right),
        BinaryOp::Mod => modulo(left, right),
        BinaryOp::Pow => power(left, right),
        BinaryOp::Eq => Ok(Val::Bool(left == right)),
        BinaryOp::Ne => Ok(Val::Bool(left != right)),
        BinaryOp::Lt => compare(op, left, right).map(|o| Val::Bool(o == Ordering::Less)),
        BinaryOp::Le => compare(op, left, right).map(|o| Val::Bool(o != Ordering::Greater)),
        BinaryOp::Gt => compare(op, left, right).map(|o| Val::Bool(o == Ordering::Greater)),
        BinaryOp::Ge => compare(op, left, right).map(|o| Val::Bool(o != Ordering::Less)),
        // Both operands are already evaluated; these pick one of them
        BinaryOp::And => Ok(if left.is_truthy() {
            right.clone()
        } else {
            left.clone()
        }),
        BinaryOp::Or => Ok(if left.is_truthy() {
            left.clone()
        } else {
            right.clone()
        }),
    }
}

fn unsupported(op: BinaryOp, left: &Val, right: &Val) -> String {
    format!(
        "Unsupported operand types for {}: {} and {}",
        op.symbol(),
        left.type_name(),
        right.type_name()
    )
}

fn overflow(op: BinaryOp) -> String {
    format!("Integer overflow in {}", op.symbol())
}

fn arithmetic(
    op: BinaryOp,
    left: &Val,
    right: &Val,
    int_op: fn(i64, i64) -> Option<i64>,
    real_op: fn(f64, f64) -> f64,
) -> Result<Val, String> {
    match (left, right) {
        (Val::Int(a), Val::Int(b)) => int_op(*a, *b).map(Val::Int).ok_or_else(|| overflow(op)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => Ok(Val::Real(real_op(a, b))),
            _ => Err(unsupported(op, left, right)),
        },
    }
}

fn add(left: &Val, right: &Val) -> Result<Val, String> {
    match (left, right) {
        (Val::Str(a), Val::Str(b)) => Ok(Val::Str(format!("{a}{b}"))),
        (Val::List(a), Val::List(b)) => Ok(Val::List(a.iter().chain(b).cloned().collect())),
        (Val::Tuple(a), Val::Tuple(b)) => Ok(Val::Tuple(a.iter().chain(b).cloned().collect())),
        _ => arithmetic(BinaryOp::Add, left, right, i64::checked_add, |a, b| a + b),
    }
}

/// Negative counts repeat zero times
fn repeat(len: usize, count: i64) -> Result<usize, String> {
    let count = usize::try_from(count).unwrap_or(0);
    match len.checked_mul(count) {
        Some(total) if total <= MAX_SEQUENCE_LEN => Ok(count),
        _ => Err("Repetition too large".to_string()),
    }
}

fn multiply(left: &Val, right: &Val) -> Result<Val, String> {
    match (left, right) {
        (Val::Str(s), Val::Int(n)) | (Val::Int(n), Val::Str(s)) => {
            Ok(Val::Str(s.repeat(repeat(s.len(), *n)?)))
        }
        (Val::List(items), Val::Int(n)) | (Val::Int(n), Val::List(items)) => {
            let count = repeat(items.len(), *n)?;
            Ok(Val::List(
                std::iter::repeat(items.iter().cloned())
                    .take(count)
                    .flatten()
                    .collect(),
            ))
        }
        _ => arithmetic(BinaryOp::Mul, left, right, i64::checked_mul, |a, b| a * b),
    }
}

fn divide(left: &Val, right: &Val) -> Result<Val, String> {
    match (left.as_f64(), right.as_f64()) {
        (Some(_), Some(b)) if b == 0.0 => Err("Division by zero".to_string()),
        (Some(a), Some(b)) => Ok(Val::Real(a / b)),
        _ => Err(unsupported(BinaryOp::Div, left, right)),
    }
}

/// Result takes the sign of the divisor
fn modulo(left: &Val, right: &Val) -> Result<Val, String> {
    match (left, right) {
        (Val::Int(_), Val::Int(0)) => Err("Modulo by zero".to_string()),
        (Val::Int(a), Val::Int(b)) => {
            let r = a.checked_rem(*b).ok_or_else(|| overflow(BinaryOp::Mod))?;
            Ok(Val::Int(if r != 0 && (r < 0) != (*b < 0) { r + b } else { r }))
        }
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(_), Some(b)) if b == 0.0 => Err("Modulo by zero".to_string()),
            (Some(a), Some(b)) => Ok(Val::Real(a - b * (a / b).floor())),
            _ => Err(unsupported(BinaryOp::Mod, left, right)),
        },
    }
}

fn power(left: &Val, right: &Val) -> Result<Val, String> {
    match (left, right) {
        (Val::Int(base), Val::Int(exp)) if *exp >= 0 => {
            let exp = u32::try_from(*exp).map_err(|_| overflow(BinaryOp::Pow))?;
            base.checked_pow(exp)
                .map(Val::Int)
                .ok_or_else(|| overflow(BinaryOp::Pow))
        }
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => Ok(Val::Real(a.powf(b))),
            _ => Err(unsupported(BinaryOp::Pow, left, right)),
        },
    }
}

fn compare(op: BinaryOp, left: &Val, right: &Val) -> Result<Ordering, String> {
    match (left, right) {
        (Val::Str(a), Val::Str(b)) => Ok(a.cmp(b)),
        (Val::Bool(a), Val::Bool(b)) => Ok(a.cmp(b)),
        (Val::List(a), Val::List(b)) | (Val::Tuple(a), Val::Tuple(b)) => {
            for (x, y) in a.iter().zip(b) {
                match compare(op, x, y)? {
                    Ordering::Equal => continue,
                    other => return Ok(other),
                }
            }
            Ok(a.len().cmp(&b.len()))
        }
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a
                .partial_cmp(&b)
                .ok_or_else(|| format!("Cannot order NaN with {}", op.symbol())),
            _ => Err(format!(
                "'{}' not supported between {} and {}",
                op.symbol(),
                left.type_name(),
                right.type_name()
            )),
        },
    }
}
