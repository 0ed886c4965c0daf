//! Root workflow entry point

use uuid::Uuid;

use crate::flow::policy::PolicyCheck;
use crate::flow::{execute_step, Context, FlowError, Step, Transaction};
use crate::interpreter::types::Val;

/// Run `workflow` as a root transaction after an authorization check
///
/// The context receives a fresh correlation id unless it already carries one.
/// With a policy present, its verdict decides; without one (offline), only
/// trusted system contexts and workflows whose name contains `bootstrap` are
/// let through. Denial is returned as `Err`, never as a failure envelope.
pub async fn work(
    workflow: &Step,
    context: &Context,
    policy: Option<&dyn PolicyCheck>,
) -> Result<Transaction, FlowError> {
    let transaction_id = Uuid::new_v4().to_string();
    let mut root = context.clone();
    if root.identifier.is_none() {
        root.identifier = Some(transaction_id.clone());
    }
    let name = workflow.identity();

    let authorized = match policy {
        Some(policy) => {
            let probe = root
                .clone()
                .with_value("workflow_name", Val::Str(name.clone()))
                .with_value("transaction_id", Val::Str(transaction_id.clone()));
            match policy.check_permission(&name, &probe).await {
                Ok(allowed) => allowed,
                Err(err) => {
                    tracing::warn!(workflow = %name, error = %err, "permission check failed");
                    false
                }
            }
        }
        None => {
            let allowed = root.is_system() || name.contains("bootstrap");
            tracing::debug!(workflow = %name, allowed, "policy offline, using system bypass");
            allowed
        }
    };

    if !authorized {
        tracing::warn!(workflow = %name, transaction = %transaction_id, "workflow denied");
        return Err(FlowError::PermissionDenied(format!(
            "insufficient permissions to run '{name}'"
        )));
    }

    tracing::debug!(workflow = %name, transaction = %transaction_id, "starting workflow");
    Ok(execute_step(workflow, &root).await)
}
