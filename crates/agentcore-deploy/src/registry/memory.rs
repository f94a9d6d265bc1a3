//! In-process parameter store

use super::ParameterStore;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Parameter store backed by a map, used by tests and for inspecting a plan
/// without touching SSM.
#[derive(Debug, Default)]
pub struct MemoryParameterStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    fn values(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of every stored path and value
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values().clone()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.values().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }
}

#[async_trait]
impl ParameterStore for MemoryParameterStore {
    async fn get(&self, path: &str) -> Result<Option<String>> {
        Ok(self.values().get(path).cloned())
    }

    async fn put(&self, path: &str, value: &str) -> Result<()> {
        self.values().insert(path.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.values().remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_empty_strings() {
        let store = MemoryParameterStore::new();
        store.put("/app/octank/agentcore/scope", "").await.unwrap();
        assert_eq!(
            store.get("/app/octank/agentcore/scope").await.unwrap(),
            Some(String::new())
        );
    }

    #[tokio::test]
    async fn delete_of_absent_path_succeeds() {
        let store = MemoryParameterStore::with_entries([("/a", "1")]);
        store.delete("/b").await.unwrap();
        store.delete("/a").await.unwrap();
        assert!(store.is_empty());
    }
}
