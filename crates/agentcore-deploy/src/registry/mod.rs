//! Resource identifier registry
//!
//! A thin accessor over a [`ParameterStore`]. Reads never fail: a transport
//! error is logged and reads as absent, because absence already means
//! "never provisioned" to every caller. Writes and deletes are
//! fire-and-forget for the same reason.

mod memory;
mod store;

pub use memory::MemoryParameterStore;
pub use store::ParameterStore;
#[cfg(test)]
pub use store::MockParameterStore;

use agentcore_deploy_common::RegistryKey;
use std::sync::Arc;
use tracing::{debug, warn};

/// A registry value and the path it was found at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub value: String,
    pub path: String,
    /// True when the value came from a legacy path
    pub legacy: bool,
}

/// Outcome of purging a set of keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    /// Paths that held a value before the purge
    pub found: usize,
    /// Paths whose delete call failed
    pub failed: usize,
}

#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn ParameterStore>,
}

impl Registry {
    pub fn new(store: Arc<dyn ParameterStore>) -> Self {
        Self { store }
    }

    /// Read a single path. Errors are logged and read as absent.
    pub async fn get(&self, path: &str) -> Option<String> {
        match self.store.get(path).await {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path, error = ?e, "Registry read failed, treating as absent");
                None
            }
        }
    }

    pub async fn set(&self, path: &str, value: &str) {
        match self.store.put(path, value).await {
            Ok(()) => debug!(path = %path, "Registry value stored"),
            Err(e) => warn!(path = %path, error = ?e, "Registry write failed"),
        }
    }

    pub async fn delete(&self, path: &str) {
        if let Err(e) = self.store.delete(path).await {
            warn!(path = %path, error = ?e, "Registry delete failed");
        }
    }

    /// Resolve a key, trying the canonical path first and then each legacy
    /// path in order
    pub async fn lookup(&self, key: &RegistryKey) -> Option<Resolved> {
        for (index, path) in key.paths().iter().enumerate() {
            let Some(value) = self.get(path).await else {
                continue;
            };
            let legacy = index > 0;
            if legacy {
                warn!(
                    key = %key.name(),
                    path = %path,
                    canonical = %key.canonical(),
                    "Resolved from legacy registry path"
                );
            }
            return Some(Resolved {
                value,
                path: path.clone(),
                legacy,
            });
        }
        None
    }

    /// Write a value to the key's canonical path
    pub async fn store(&self, key: &RegistryKey, value: &str) {
        self.set(key.canonical(), value).await;
    }

    /// Delete every path of every key, canonical and legacy, whether or not it
    /// currently holds a value
    pub async fn purge(&self, keys: &[RegistryKey]) -> PurgeSummary {
        let mut summary = PurgeSummary::default();
        for path in keys.iter().flat_map(|k| k.paths()) {
            if self.get(path).await.is_some() {
                summary.found += 1;
            }
            if let Err(e) = self.store.delete(path).await {
                warn!(path = %path, error = ?e, "Registry delete failed");
                summary.failed += 1;
            }
        }
        debug!(found = summary.found, failed = summary.failed, "Registry purged");
        summary
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_deploy_common::ParameterLayout;
    use mockall::predicate::eq;

    fn registry_with(entries: &[(&str, &str)]) -> (Registry, Arc<MemoryParameterStore>) {
        let store = Arc::new(MemoryParameterStore::with_entries(entries.iter().copied()));
        (Registry::new(store.clone()), store)
    }

    #[tokio::test]
    async fn round_trips_values_including_empty_strings() {
        let (registry, _) = registry_with(&[]);
        registry.set("/app/octank/agentcore/gateway_id", "gw-123").await;
        registry.set("/app/octank/agentcore/scope", "").await;

        assert_eq!(
            registry.get("/app/octank/agentcore/gateway_id").await.as_deref(),
            Some("gw-123")
        );
        assert_eq!(
            registry.get("/app/octank/agentcore/scope").await.as_deref(),
            Some("")
        );
        assert_eq!(registry.get("/app/octank/agentcore/client_id").await, None);
    }

    #[tokio::test]
    async fn transport_error_reads_as_absent() {
        let mut store = MockParameterStore::new();
        store
            .expect_get()
            .with(eq("/app/octank/agentcore/memory_id"))
            .returning(|_| Err(anyhow::anyhow!("connection reset")));
        let registry = Registry::new(Arc::new(store));

        assert_eq!(registry.get("/app/octank/agentcore/memory_id").await, None);
    }

    #[tokio::test]
    async fn write_failures_are_swallowed() {
        let mut store = MockParameterStore::new();
        store
            .expect_put()
            .returning(|_, _| Err(anyhow::anyhow!("access denied")));
        store
            .expect_delete()
            .returning(|_| Err(anyhow::anyhow!("access denied")));
        let registry = Registry::new(Arc::new(store));

        registry.set("/app/octank/agentcore/runtime_id", "rt-1").await;
        registry.delete("/app/octank/agentcore/runtime_id").await;
    }

    #[tokio::test]
    async fn lookup_prefers_canonical_path() {
        let (registry, _) = registry_with(&[
            ("/app/octank/agentcore/memory_id", "mem-new"),
            ("/app/octankedu/agentcore/memory_id", "mem-old"),
        ]);
        let resolved = registry
            .lookup(&ParameterLayout::new("octank").memory_id())
            .await
            .unwrap();
        assert_eq!(resolved.value, "mem-new");
        assert!(!resolved.legacy);
    }

    #[tokio::test]
    async fn lookup_falls_back_to_legacy_paths_in_order() {
        let (registry, _) = registry_with(&[("/app/octank_edu_multi_agent/memory_id", "mem-9")]);
        let resolved = registry
            .lookup(&ParameterLayout::new("octank").memory_id())
            .await
            .unwrap();
        assert_eq!(resolved.value, "mem-9");
        assert_eq!(resolved.path, "/app/octank_edu_multi_agent/memory_id");
        assert!(resolved.legacy);
    }

    #[tokio::test]
    async fn lookup_of_unset_key_is_none() {
        let (registry, _) = registry_with(&[]);
        assert_eq!(
            registry
                .lookup(&ParameterLayout::new("octank").gateway_id())
                .await,
            None
        );
    }

    #[tokio::test]
    async fn purge_removes_canonical_and_legacy_paths() {
        let (registry, store) = registry_with(&[
            ("/app/octank/agentcore/gateway_id", "gw-1"),
            ("/app/octank/agentcore/gatewayID", "gw-0"),
            ("/app/unrelated/value", "keep"),
        ]);
        let layout = ParameterLayout::new("octank");
        let summary = registry
            .purge(&[layout.gateway_id(), layout.memory_id()])
            .await;

        assert_eq!(summary.found, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(store.len(), 1);
        assert!(store.contains("/app/unrelated/value"));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn block_on<F: std::future::Future>(f: F) -> F::Output {
            tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap()
                .block_on(f)
        }

        proptest! {
            /// Set then get returns the value; delete then get returns nothing
            #[test]
            fn set_get_delete_round_trip(
                path in "/app/[a-z_]{1,12}/agentcore/[a-z_]{1,20}",
                value in ".*",
            ) {
                let (registry, _) = registry_with(&[]);
                let (read, deleted) = block_on(async {
                    registry.set(&path, &value).await;
                    let read = registry.get(&path).await;
                    registry.delete(&path).await;
                    (read, registry.get(&path).await)
                });
                prop_assert_eq!(read, Some(value));
                prop_assert_eq!(deleted, None);
            }

            /// The last write to a path wins
            #[test]
            fn last_write_wins(values in prop::collection::vec(".{0,16}", 1..8)) {
                let (registry, _) = registry_with(&[]);
                let read = block_on(async {
                    for value in &values {
                        registry.set("/app/octank/agentcore/memory_id", value).await;
                    }
                    registry.get("/app/octank/agentcore/memory_id").await
                });
                prop_assert_eq!(read.as_ref(), values.last());
            }
        }
    }
}
