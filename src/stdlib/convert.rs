//! Format conversion: `convert(value, to: ..., from: ...)`
//!
//! `from` decodes a string (`json`, `toml`); `to` encodes (`json`, `toml`,
//! `text`) or digests (`hash`, SHA-256 hex). Both may be given; decoding
//! happens first.

use sha2::{Digest, Sha256};

use super::Registry;
use crate::flow::{CallResult, FlowError, Invocation};
use crate::interpreter::types::Val;
use crate::resource::toml_to_val;

pub(super) fn install(registry: &mut Registry) {
    registry.register_fn("convert", convert);
}

fn format_arg(inv: &Invocation, index: usize, name: &str) -> Result<Option<String>, FlowError> {
    match inv.arg(index, name) {
        None | Some(Val::Null) => Ok(None),
        Some(Val::Str(format)) => Ok(Some(format.to_lowercase())),
        Some(other) => Err(FlowError::argument(
            "convert",
            format!("'{name}' must be a format name, got {}", other.type_name()),
        )),
    }
}

fn convert(inv: Invocation) -> CallResult {
    let value = inv.required("convert", 0, "value")?.clone();
    let to = format_arg(&inv, 1, "to")?;
    let from = format_arg(&inv, 2, "from")?;

    let decoded = match from.as_deref() {
        None => value,
        Some(format) => decode(format, &value)?,
    };
    match to.as_deref() {
        None => Ok(decoded),
        Some(format) => encode(format, &decoded),
    }
}

fn decode(format: &str, value: &Val) -> CallResult {
    let text = value.as_str().ok_or_else(|| {
        FlowError::argument(
            "convert",
            format!("can only decode strings, got {}", value.type_name()),
        )
    })?;
    let failed = |message: String| FlowError::Failed(format!("convert from {format}: {message}"));
    match format {
        "json" => serde_json::from_str(text)
            .map(|json| Val::from_json(&json))
            .map_err(|e| failed(e.to_string())),
        "toml" => toml::from_str::<toml::Value>(text)
            .map(|parsed| toml_to_val(&parsed))
            .map_err(|e| failed(e.to_string())),
        "text" => Ok(value.clone()),
        other => Err(FlowError::argument(
            "convert",
            format!("unknown source format '{other}'"),
        )),
    }
}

fn encode(format: &str, value: &Val) -> CallResult {
    let failed = |message: String| FlowError::Failed(format!("convert to {format}: {message}"));
    match format {
        "json" => serde_json::to_string(&value.to_json())
            .map(Val::Str)
            .map_err(|e| failed(e.to_string())),
        "toml" => {
            let toml_value = serde_json::from_value::<toml::Value>(value.to_json())
                .map_err(|e| failed(e.to_string()))?;
            toml::to_string(&toml_value)
                .map(Val::Str)
                .map_err(|e| failed(e.to_string()))
        }
        "hash" => {
            let digest = Sha256::digest(value.to_string().as_bytes());
            Ok(Val::Str(hex::encode(digest)))
        }
        "text" => Ok(Val::Str(value.to_string())),
        other => Err(FlowError::argument(
            "convert",
            format!("unknown target format '{other}'"),
        )),
    }
}
