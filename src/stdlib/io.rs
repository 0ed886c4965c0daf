//! Output and resources

use super::{str_arg, Registry, Services};
use crate::flow::{FlowError, Invocation};
use crate::interpreter::types::Val;

pub(super) fn install(registry: &mut Registry, services: &Services) {
    registry.register_fn("print", |inv: Invocation| {
        let rendered: Vec<String> = inv.args.iter().map(Val::to_string).collect();
        tracing::info!(target: "cadence_core::print", "{}", rendered.join(" "));
        Ok(inv.args.into_iter().next().unwrap_or(Val::Null))
    });

    registry.register_fn("pass", |inv: Invocation| {
        Ok(inv.args.into_iter().next().unwrap_or(Val::Null))
    });

    let loader = services.loader.clone();
    registry.register_async("resource", move |inv: Invocation| {
        let loader = loader.clone();
        async move {
            let path = str_arg(&inv, "resource", 0, "path")?;
            loader
                .load(path)
                .await
                .map_err(|err| FlowError::Failed(err.to_string()))
        }
    });
}
