//! Collection helpers

use super::{int_arg, Registry};
use crate::flow::{CallResult, FlowError, Invocation};
use crate::interpreter::operators::MAX_SEQUENCE_LEN;
use crate::interpreter::types::{Dict, Val};

pub(super) fn install(registry: &mut Registry) {
    registry.register_fn("len", len);
    registry.register_fn("keys", keys);
    registry.register_fn("values", values);
    registry.register_fn("get", get);
    registry.register_fn("put", put);
    registry.register_fn("merge", merge);
    registry.register_fn("range", range);
}

fn len(inv: Invocation) -> CallResult {
    let count = match inv.required("len", 0, "value")? {
        Val::Str(s) => s.chars().count(),
        Val::List(items) | Val::Tuple(items) => items.len(),
        Val::Dict(map) => map.len(),
        other => {
            return Err(FlowError::argument(
                "len",
                format!("{} has no length", other.type_name()),
            ))
        }
    };
    Ok(Val::Int(count as i64))
}

fn dict_arg<'a>(inv: &'a Invocation, function: &str) -> Result<&'a Dict, FlowError> {
    let value = inv.required(function, 0, "dict")?;
    value.as_dict().ok_or_else(|| {
        FlowError::argument(
            function,
            format!("expected a dict, got {}", value.type_name()),
        )
    })
}

fn keys(inv: Invocation) -> CallResult {
    let map = dict_arg(&inv, "keys")?;
    Ok(Val::List(map.keys().cloned().map(Val::Str).collect()))
}

fn values(inv: Invocation) -> CallResult {
    let map = dict_arg(&inv, "values")?;
    Ok(Val::List(map.values().cloned().collect()))
}

/// `get(collection, path, default)`; the path is dotted, integers index
/// sequences
fn get(inv: Invocation) -> CallResult {
    let collection = inv.required("get", 0, "collection")?;
    let key = inv.required("get", 1, "key")?;
    let default = inv.arg(2, "default").cloned().unwrap_or(Val::Null);

    let found = match key {
        Val::Int(index) => collection
            .as_seq()
            .and_then(|items| usize::try_from(*index).ok().and_then(|i| items.get(i))),
        other => collection.get_path(&other.to_key()),
    };
    Ok(found.cloned().unwrap_or(default))
}

/// Copy of `dict` with `key` set
fn put(inv: Invocation) -> CallResult {
    let mut map = dict_arg(&inv, "put")?.clone();
    let key = inv.required("put", 1, "key")?.to_key();
    let value = inv.required("put", 2, "value")?.clone();
    map.insert(key, value);
    Ok(Val::Dict(map))
}

/// Shallow merge, later dicts win
fn merge(inv: Invocation) -> CallResult {
    let mut merged = Dict::new();
    for value in &inv.args {
        let map = value.as_dict().ok_or_else(|| {
            FlowError::argument(
                "merge",
                format!("expected dicts, got {}", value.type_name()),
            )
        })?;
        for (key, value) in map.iter() {
            merged.insert(key.clone(), value.clone());
        }
    }
    Ok(Val::Dict(merged))
}

/// `range(stop)`, `range(start, stop)` or `range(start, stop, step)`
fn range(inv: Invocation) -> CallResult {
    let first = int_arg(&inv, "range", 0, "start")?
        .ok_or_else(|| FlowError::argument("range", "missing argument 'stop'"))?;
    let (start, stop) = match int_arg(&inv, "range", 1, "stop")? {
        Some(stop) => (first, stop),
        None => (0, first),
    };
    let step = int_arg(&inv, "range", 2, "step")?.unwrap_or(1);
    if step == 0 {
        return Err(FlowError::argument("range", "step must not be zero"));
    }

    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        if items.len() == MAX_SEQUENCE_LEN {
            return Err(FlowError::argument("range", "range too large"));
        }
        items.push(Val::Int(current));
        current = match current.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(Val::List(items))
}
