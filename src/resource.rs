//! Resource loading for the `resource(path)` DSL function
//!
//! Loads are cached per resolved path, so `a.json` and `./a.json` share an
//! entry. Concurrent requests for the same path share a
//! single in-flight load: the cache map hands out one `OnceCell` per key and
//! every requester awaits that cell.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};

use crate::interpreter::types::Val;
use crate::parser;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Invalid resource path '{0}'")]
    InvalidPath(String),

    #[error("Failed to read resource '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode resource '{path}': {message}")]
    Decode { path: String, message: String },
}

pub trait ResourceLoader: Send + Sync {
    fn load<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Val, ResourceError>>;
}

/// Loads files below a root directory
///
/// `.json` and `.toml` files are decoded, `.dsl` files are parsed and
/// returned as their AST, anything else is returned as text. Failed loads are
/// not cached, so a later request tries again.
#[derive(Debug)]
pub struct FileResourceLoader {
    root: PathBuf,
    cache: Mutex<HashMap<PathBuf, Arc<OnceCell<Val>>>>,
}

impl FileResourceLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths are relative to the root and may not climb out of it
    fn resolve(&self, path: &str) -> Result<PathBuf, ResourceError> {
        let mut relative = PathBuf::new();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                _ => return Err(ResourceError::InvalidPath(path.to_string())),
            }
        }
        if relative.as_os_str().is_empty() {
            return Err(ResourceError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    async fn cell(&self, full: &Path) -> Arc<OnceCell<Val>> {
        let mut cache = self.cache.lock().await;
        cache.entry(full.to_path_buf()).or_default().clone()
    }

    async fn read(&self, path: &str, full: &Path) -> Result<Val, ResourceError> {
        tracing::debug!(path, file = %full.display(), "loading resource");
        let text = tokio::fs::read_to_string(full)
            .await
            .map_err(|source| ResourceError::Io {
                path: path.to_string(),
                source,
            })?;
        decode(path, &text)
    }
}

impl ResourceLoader for FileResourceLoader {
    fn load<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Val, ResourceError>> {
        Box::pin(async move {
            let full = self.resolve(path)?;
            let cell = self.cell(&full).await;
            let value = cell.get_or_try_init(|| self.read(path, &full)).await?;
            Ok(value.clone())
        })
    }
}

fn decode(path: &str, text: &str) -> Result<Val, ResourceError> {
    let failed = |message: String| ResourceError::Decode {
        path: path.to_string(),
        message,
    };
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    match extension {
        "json" => serde_json::from_str(text)
            .map(|json| Val::from_json(&json))
            .map_err(|e| failed(e.to_string())),
        "toml" => toml::from_str::<toml::Value>(text)
            .map(|value| toml_to_val(&value))
            .map_err(|e| failed(e.to_string())),
        "dsl" => {
            let program = parser::parse_program(text).map_err(|e| failed(e.to_string()))?;
            let json = serde_json::to_value(&program).map_err(|e| failed(e.to_string()))?;
            Ok(Val::from_json(&json))
        }
        _ => Ok(Val::Str(text.to_string())),
    }
}

pub(crate) fn toml_to_val(value: &toml::Value) -> Val {
    match value {
        toml::Value::String(s) => Val::Str(s.clone()),
        toml::Value::Integer(n) => Val::Int(*n),
        toml::Value::Float(n) => Val::Real(*n),
        toml::Value::Boolean(b) => Val::Bool(*b),
        toml::Value::Datetime(dt) => Val::Str(dt.to_string()),
        toml::Value::Array(items) => Val::List(items.iter().map(toml_to_val).collect()),
        toml::Value::Table(table) => Val::Dict(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_val(v)))
                .collect(),
        ),
    }
}
