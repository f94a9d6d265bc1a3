//! Step ordering and identifier resolution

use super::report::Mode;
use crate::handler::{Locator, ResourceHandler};
use crate::registry::Registry;
use agentcore_deploy_common::RegistryKey;
use std::collections::BTreeSet;

/// Ordered handler indices into a catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub mode: Mode,
    pub steps: Vec<usize>,
}

impl Plan {
    /// Every handler, dependents first. Handlers of one kind keep catalog order.
    pub fn teardown(handlers: &[Box<dyn ResourceHandler>]) -> Self {
        let mut steps: Vec<usize> = (0..handlers.len()).collect();
        steps.sort_by_key(|&i| handlers[i].kind().teardown_priority());
        Self {
            mode: Mode::Teardown,
            steps,
        }
    }

    /// Deployable handlers, dependencies first
    pub fn deploy(handlers: &[Box<dyn ResourceHandler>]) -> Self {
        let mut steps: Vec<(u8, usize)> = handlers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.deployable())
            .filter_map(|(i, h)| Some((h.kind().deploy_priority()?, i)))
            .collect();
        steps.sort_by_key(|&(priority, _)| priority);
        Self {
            mode: Mode::Deploy,
            steps: steps.into_iter().map(|(_, i)| i).collect(),
        }
    }
}

/// Find a handler's identifier: from the registry, or by probing its
/// derived name. `None` means the resource was never provisioned.
pub async fn resolve(handler: &dyn ResourceHandler, registry: &Registry) -> Option<String> {
    match handler.locator() {
        Locator::Registry(key) => registry.lookup(key).await.map(|r| r.value),
        Locator::Derived(name) => handler.exists(name).await.then(|| name.clone()),
    }
}

/// Every registry key owned by any handler, without duplicate paths
pub fn owned_keys(handlers: &[Box<dyn ResourceHandler>]) -> Vec<RegistryKey> {
    let mut seen = BTreeSet::new();
    handlers
        .iter()
        .flat_map(|h| {
            let primary = match h.locator() {
                Locator::Registry(key) => Some(key.clone()),
                Locator::Derived(_) => None,
            };
            primary.into_iter().chain(h.auxiliary_keys())
        })
        .filter(|key| seen.insert(key.canonical().to_string()))
        .collect()
}
