//! A scriptable handler that records every call it receives
#![allow(dead_code)]

use agentcore_deploy::handler::{Child, DeployContext, Locator, Provisioned, ResourceHandler};
use agentcore_deploy::registry::{MemoryParameterStore, Registry};
use agentcore_deploy_common::{ChildKind, RegistryKey, ResourceKind};
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

/// Calls from every handler sharing it, in order, as `"<handler> <op> <arg>"`
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Calls made by one handler
    pub fn calls_for(&self, handler: &str) -> Vec<String> {
        let prefix = format!("{handler} ");
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(&prefix))
            .collect()
    }
}

pub struct RecordingHandler {
    name: String,
    kind: ResourceKind,
    locator: Locator,
    aux: Vec<RegistryKey>,
    deployable: bool,
    live: BTreeSet<String>,
    children: Vec<Child>,
    nested: BTreeMap<String, Vec<Child>>,
    failing: BTreeSet<String>,
    fail_create: bool,
    fail_list: bool,
    created: Provisioned,
    claims: Vec<(RegistryKey, String)>,
    requires: Vec<RegistryKey>,
    journal: Journal,
}

impl RecordingHandler {
    pub fn new(name: &str, kind: ResourceKind, locator: Locator, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            kind,
            locator,
            aux: Vec::new(),
            deployable: true,
            live: BTreeSet::new(),
            children: Vec::new(),
            nested: BTreeMap::new(),
            failing: BTreeSet::new(),
            fail_create: false,
            fail_list: false,
            created: Provisioned::new(format!("{name}-id")),
            claims: Vec::new(),
            requires: Vec::new(),
            journal: journal.clone(),
        }
    }

    pub fn registry(name: &str, kind: ResourceKind, key: RegistryKey, journal: &Journal) -> Self {
        Self::new(name, kind, Locator::Registry(key), journal)
    }

    pub fn aux(mut self, key: RegistryKey) -> Self {
        self.aux.push(key);
        self
    }

    pub fn not_deployable(mut self) -> Self {
        self.deployable = false;
        self
    }

    /// Identifiers `exists` reports as live
    pub fn live(mut self, id: &str) -> Self {
        self.live.insert(id.to_string());
        self
    }

    pub fn child(mut self, kind: ChildKind, parent: &str, id: &str) -> Self {
        self.children.push(Child::new(kind, parent, id));
        self
    }

    pub fn nested(mut self, child_id: &str, kind: ChildKind, id: &str) -> Self {
        self.nested
            .entry(child_id.to_string())
            .or_default()
            .push(Child::new(kind, child_id, id));
        self
    }

    /// Make `delete` or `delete_child` of this identifier fail
    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn creates(mut self, provisioned: Provisioned) -> Self {
        self.created = provisioned;
        self
    }

    /// An identifier `create` claims before it can fail
    pub fn claims(mut self, key: RegistryKey, id: &str) -> Self {
        self.claims.push((key, id.to_string()));
        self
    }

    /// A value `create` reads from earlier steps
    pub fn requires(mut self, key: RegistryKey) -> Self {
        self.requires.push(key);
        self
    }

    pub fn boxed(self) -> Box<dyn ResourceHandler> {
        Box::new(self)
    }

    fn record(&self, op: &str, arg: &str) {
        self.journal.push(format!("{} {op} {arg}", self.name));
    }
}

#[async_trait]
impl ResourceHandler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn locator(&self) -> &Locator {
        &self.locator
    }

    fn auxiliary_keys(&self) -> Vec<RegistryKey> {
        self.aux.clone()
    }

    fn deployable(&self) -> bool {
        self.deployable
    }

    async fn exists(&self, id: &str) -> bool {
        self.record("exists", id);
        self.live.contains(id)
    }

    async fn create(&self, ctx: &DeployContext) -> Result<Provisioned> {
        self.record("create", &self.created.id);
        for key in &self.requires {
            ctx.require(&self.name, key)?;
        }
        for (key, id) in &self.claims {
            ctx.claim(key, id.clone());
        }
        if self.fail_create {
            bail!("{} create rejected", self.name);
        }
        Ok(self.created.clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.record("delete", id);
        if self.failing.contains(id) {
            bail!("{id} delete rejected");
        }
        Ok(())
    }

    async fn list_children(&self, id: &str) -> Result<Vec<Child>> {
        self.record("list_children", id);
        if self.fail_list {
            bail!("listing {id} rejected");
        }
        Ok(self.children.clone())
    }

    async fn list_nested(&self, child: &Child) -> Result<Vec<Child>> {
        Ok(self.nested.get(&child.id).cloned().unwrap_or_default())
    }

    async fn delete_child(&self, child: &Child) -> Result<()> {
        self.record("delete_child", &child.id);
        if self.failing.contains(&child.id) {
            bail!("{} delete rejected", child.id);
        }
        Ok(())
    }
}

/// A registry over an in-memory store, seeded with `(path, value)` pairs
pub fn registry_with(entries: &[(&str, &str)]) -> (Registry, Arc<MemoryParameterStore>) {
    let store = Arc::new(MemoryParameterStore::with_entries(
        entries.iter().map(|(k, v)| (k.to_string(), v.to_string())),
    ));
    (Registry::new(store.clone()), store)
}
