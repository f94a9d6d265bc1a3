//! Fail-fast deploy
//!
//! Steps run in dependency order. A step whose identifier already resolves
//! to a live resource, with every auxiliary value on record, is reused. The
//! first create failure stops the run; later steps are reported as not
//! attempted. Identifiers a step claimed before failing are still stored.

use super::plan::Plan;
use super::report::{Mode, Report, StepOutcome};
use crate::handler::{DeployContext, Locator, ResourceHandler};
use crate::registry::Registry;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A deploy that stopped at a failed step
#[derive(Debug, Error)]
#[error("deploy failed at {step}: {error:#}")]
pub struct DeployFailure {
    pub step: String,
    pub error: anyhow::Error,
    /// Every planned step, including the ones never attempted
    pub report: Report,
}

pub async fn deploy(
    handlers: &[Box<dyn ResourceHandler>],
    registry: &Registry,
    cancel: CancellationToken,
) -> Result<Report, Box<DeployFailure>> {
    let plan = Plan::deploy(handlers);
    let mut report = Report::new(Mode::Deploy);
    let mut ctx = DeployContext::new(cancel);
    let mut failure: Option<(String, anyhow::Error)> = None;

    for &index in &plan.steps {
        let handler = handlers[index].as_ref();

        if failure.is_some() {
            report.push(handler.name(), handler.kind(), None, StepOutcome::NotAttempted);
            continue;
        }

        if ctx.cancel().is_cancelled() {
            report.push(handler.name(), handler.kind(), None, StepOutcome::NotAttempted);
            failure = Some((handler.name().to_string(), anyhow::anyhow!("deploy cancelled")));
            continue;
        }

        if let Some(id) = reusable(handler, registry, &mut ctx).await {
            info!(resource = %handler.name(), id = %id, "Reusing existing resource");
            report.push(
                handler.name(),
                handler.kind(),
                Some(id.clone()),
                StepOutcome::Reused { id },
            );
            continue;
        }

        info!(resource = %handler.name(), "Creating");
        let created = handler.create(&ctx).await;
        for (key, id) in ctx.take_claims() {
            if created.is_err() {
                warn!(resource = %handler.name(), key = %key.name(), id = %id, "Recording partially created resource");
            }
            registry.store(&key, &id).await;
            ctx.record(&key, id);
        }

        match created {
            Ok(provisioned) => {
                if let Locator::Registry(key) = handler.locator() {
                    registry.store(key, &provisioned.id).await;
                    ctx.record(key, &provisioned.id);
                }
                for (key, value) in &provisioned.outputs {
                    registry.store(key, value).await;
                    ctx.record(key, value.as_str());
                }
                info!(resource = %handler.name(), id = %provisioned.id, "Created");
                report.push(
                    handler.name(),
                    handler.kind(),
                    Some(provisioned.id.clone()),
                    StepOutcome::Created { id: provisioned.id },
                );
            }
            Err(e) => {
                error!(resource = %handler.name(), error = ?e, "Create failed, stopping deploy");
                report.push(
                    handler.name(),
                    handler.kind(),
                    None,
                    StepOutcome::Failed {
                        error: format!("{e:#}"),
                    },
                );
                failure = Some((handler.name().to_string(), e));
            }
        }
    }

    match failure {
        None => Ok(report),
        Some((step, error)) => Err(Box::new(DeployFailure {
            step,
            error,
            report,
        })),
    }
}

/// The identifier of an already provisioned, still live resource.
///
/// Its identifier and auxiliary values are loaded into the context for later
/// steps. An identifier found only at a legacy path is copied to the
/// canonical path. A live resource missing an auxiliary value was left
/// half-built by an earlier run; it is handed back to `create` to finish.
async fn reusable(
    handler: &dyn ResourceHandler,
    registry: &Registry,
    ctx: &mut DeployContext,
) -> Option<String> {
    match handler.locator() {
        Locator::Registry(key) => {
            let resolved = registry.lookup(key).await?;
            if !handler.exists(&resolved.value).await {
                return None;
            }

            let mut aux = Vec::new();
            for aux_key in handler.auxiliary_keys() {
                let Some(value) = registry.lookup(&aux_key).await else {
                    info!(
                        resource = %handler.name(),
                        id = %resolved.value,
                        missing = %aux_key.name(),
                        "Existing resource is incomplete, finishing it"
                    );
                    return None;
                };
                aux.push((aux_key, value.value));
            }

            if resolved.legacy {
                registry.store(key, &resolved.value).await;
            }
            ctx.record(key, resolved.value.as_str());
            for (aux_key, value) in aux {
                ctx.record(&aux_key, value);
            }
            Some(resolved.value)
        }
        Locator::Derived(name) => handler.exists(name).await.then(|| name.clone()),
    }
}
