//! Best-effort teardown
//!
//! Every vendor error is logged and recorded as a warning on its step; the
//! run always continues to the next step.

use super::plan::{Plan, owned_keys, resolve};
use super::report::{Mode, Report, StepOutcome};
use crate::handler::{Child, ResourceHandler};
use crate::registry::Registry;
use agentcore_deploy_common::ResourceKind;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt, stream};
use tracing::{info, warn};

pub const REGISTRY_STEP: &str = "RegistryEntries";

#[derive(Debug, Clone)]
pub struct TeardownOptions {
    /// Child delete batches of one kind run with at most this many in flight
    pub parallel: usize,
}

impl Default for TeardownOptions {
    fn default() -> Self {
        Self { parallel: 1 }
    }
}

/// Tear down every resource in the catalog, then purge the registry.
pub async fn teardown(
    handlers: &[Box<dyn ResourceHandler>],
    registry: &Registry,
    options: &TeardownOptions,
) -> Report {
    let plan = Plan::teardown(handlers);
    let mut report = Report::new(Mode::Teardown);

    for &index in &plan.steps {
        let handler = handlers[index].as_ref();
        let Some(id) = resolve(handler, registry).await else {
            info!(resource = %handler.name(), "Not found, skipping");
            report.push(handler.name(), handler.kind(), None, StepOutcome::Skipped);
            continue;
        };

        info!(resource = %handler.name(), id = %id, "Tearing down");
        let warnings = teardown_resource(handler, &id, options.parallel).await;
        report.push(
            handler.name(),
            handler.kind(),
            Some(id),
            StepOutcome::Attempted { warnings },
        );
    }

    let summary = registry.purge(&owned_keys(handlers)).await;
    let outcome = if summary.found == 0 {
        StepOutcome::Skipped
    } else {
        let warnings = (summary.failed > 0)
            .then(|| format!("{} registry deletes failed", summary.failed))
            .into_iter()
            .collect();
        StepOutcome::Attempted { warnings }
    };
    info!(found = summary.found, "Registry entries purged");
    report.push(REGISTRY_STEP, ResourceKind::RegistryEntries, None, outcome);

    report
}

/// Children first, then the parent. The parent delete is attempted whatever
/// happened to the children.
async fn teardown_resource(handler: &dyn ResourceHandler, id: &str, parallel: usize) -> Vec<String> {
    let mut warnings = Vec::new();

    match handler.list_children(id).await {
        Ok(children) => warnings.extend(delete_children(handler, children, parallel).await),
        Err(e) => {
            warn!(resource = %handler.name(), id = %id, error = ?e, "Failed to list children");
            warnings.push(format!("list children: {e:#}"));
        }
    }

    if let Err(e) = handler.delete(id).await {
        warn!(resource = %handler.name(), id = %id, error = ?e, "Failed to delete");
        warnings.push(format!("delete {id}: {e:#}"));
    }

    warnings
}

/// Delete children in listing order, one run of same-kind children at a
/// time. Nested children go before the child that owns them.
fn delete_children<'a>(
    handler: &'a dyn ResourceHandler,
    children: Vec<Child>,
    parallel: usize,
) -> BoxFuture<'a, Vec<String>> {
    async move {
        let mut warnings = Vec::new();

        for run in runs_by_kind(children) {
            let size = handler.batch_size(run[0].kind).max(1);
            let batches: Vec<Vec<Child>> = run.chunks(size).map(<[Child]>::to_vec).collect();

            let results: Vec<Vec<String>> = stream::iter(batches)
                .map(|batch| delete_batch(handler, batch, parallel))
                .buffer_unordered(parallel.max(1))
                .collect()
                .await;
            warnings.extend(results.into_iter().flatten());
        }

        warnings
    }
    .boxed()
}

async fn delete_batch(handler: &dyn ResourceHandler, batch: Vec<Child>, parallel: usize) -> Vec<String> {
    let mut warnings = Vec::new();

    for child in &batch {
        match handler.list_nested(child).await {
            Ok(nested) if nested.is_empty() => {}
            Ok(nested) => warnings.extend(delete_children(handler, nested, parallel).await),
            Err(e) => {
                warn!(resource = %handler.name(), child = %child, error = ?e, "Failed to list nested children");
                warnings.push(format!("list {child}: {e:#}"));
            }
        }
    }

    if let Err(e) = handler.delete_children(&batch).await {
        warn!(resource = %handler.name(), count = batch.len(), error = ?e, "Failed to delete children");
        warnings.push(format!("delete {}: {e:#}", batch[0]));
    }

    warnings
}

/// Split into maximal runs of consecutive children of the same kind
fn runs_by_kind(children: Vec<Child>) -> Vec<Vec<Child>> {
    let mut runs: Vec<Vec<Child>> = Vec::new();
    for child in children {
        match runs.last_mut() {
            Some(run) if run[0].kind == child.kind => run.push(child),
            _ => runs.push(vec![child]),
        }
    }
    runs
}
