//! Authorization collaborator for `work`

use futures::future::BoxFuture;
use std::collections::HashSet;

use super::Context;

pub trait PolicyCheck: Send + Sync {
    fn check_permission<'a>(
        &'a self,
        workflow: &'a str,
        context: &'a Context,
    ) -> BoxFuture<'a, anyhow::Result<bool>>;
}

/// Allows a fixed set of workflow names, plus trusted system contexts
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    allowed: HashSet<String>,
}

impl AllowList {
    pub fn new(allowed: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl PolicyCheck for AllowList {
    fn check_permission<'a>(
        &'a self,
        workflow: &'a str,
        context: &'a Context,
    ) -> BoxFuture<'a, anyhow::Result<bool>> {
        Box::pin(async move { Ok(context.is_system() || self.allowed.contains(workflow)) })
    }
}
