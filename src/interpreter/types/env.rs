//! Persistent evaluation environment
//!
//! An `Env` is a linked stack of frames behind `Arc`. Binding never mutates
//! an existing frame: it pushes a new one, so a child evaluation can shadow
//! names without touching what its parent sees, and cloning is O(1).

use super::values::{Dict, Val};
use std::fmt;
use std::sync::Arc;

struct Frame {
    bindings: Vec<(String, Val)>,
    parent: Option<Arc<Frame>>,
}

#[derive(Clone, Default)]
pub struct Env {
    head: Option<Arc<Frame>>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment holding a single frame of bindings
    pub fn from_bindings(bindings: impl IntoIterator<Item = (String, Val)>) -> Self {
        Self::new().extend(bindings)
    }

    /// New environment with `name` bound on top of this one
    pub fn bind(&self, name: impl Into<String>, value: Val) -> Env {
        self.extend([(name.into(), value)])
    }

    /// New environment with one frame of bindings on top of this one
    pub fn extend(&self, bindings: impl IntoIterator<Item = (String, Val)>) -> Env {
        let bindings: Vec<_> = bindings.into_iter().collect();
        if bindings.is_empty() {
            return self.clone();
        }
        Env {
            head: Some(Arc::new(Frame {
                bindings,
                parent: self.head.clone(),
            })),
        }
    }

    /// Innermost binding of `name`
    pub fn get(&self, name: &str) -> Option<&Val> {
        let mut frame = self.head.as_deref();
        while let Some(current) = frame {
            if let Some((_, value)) = current.bindings.iter().rev().find(|(k, _)| k == name) {
                return Some(value);
            }
            frame = current.parent.as_deref();
        }
        None
    }

    /// Dotted lookup: the first segment names a binding, the rest index into it
    pub fn resolve(&self, path: &str) -> Option<&Val> {
        if let Some(value) = self.get(path) {
            return Some(value);
        }
        let (root, rest) = path.split_once('.')?;
        self.get(root)?.get_path(rest)
    }

    /// Every visible binding, innermost wins, outermost first
    pub fn flatten(&self) -> Dict {
        let mut frames = Vec::new();
        let mut frame = self.head.as_deref();
        while let Some(current) = frame {
            frames.push(current);
            frame = current.parent.as_deref();
        }
        let mut visible = Dict::new();
        for current in frames.into_iter().rev() {
            for (name, value) in &current.bindings {
                visible.insert(name.clone(), value.clone());
            }
        }
        visible
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.flatten().keys()).finish()
    }
}
