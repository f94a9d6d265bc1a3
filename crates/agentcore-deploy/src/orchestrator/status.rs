//! Read-only deployment status

use super::plan::{Plan, resolve};
use super::report::{Deployment, StatusEntry};
use crate::handler::ResourceHandler;
use crate::registry::Registry;

/// Where each resource stands, in teardown order. Nothing is mutated; any
/// lookup failure reads as not deployed.
pub async fn status(handlers: &[Box<dyn ResourceHandler>], registry: &Registry) -> Vec<StatusEntry> {
    preview(handlers, registry, &Plan::teardown(handlers)).await
}

/// The steps of a plan with what each currently resolves to
pub async fn preview(
    handlers: &[Box<dyn ResourceHandler>],
    registry: &Registry,
    plan: &Plan,
) -> Vec<StatusEntry> {
    let mut entries = Vec::with_capacity(plan.steps.len());
    for &index in &plan.steps {
        let handler = handlers[index].as_ref();
        let deployment = match resolve(handler, registry).await {
            Some(id) => Deployment::Deployed(id),
            None => Deployment::NotDeployed,
        };
        entries.push(StatusEntry {
            name: handler.name().to_string(),
            kind: handler.kind(),
            deployment,
        });
    }
    entries
}
