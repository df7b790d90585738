//! In-memory [`RecordStore`] holding records as JSON documents.
//!
//! Patches are applied the way the real store applies them, so tests can
//! observe that untouched fields survive. Failures can be injected per kind
//! (listing) or per record (patching).

use super::{merge_patch, ListParams, RecordStore, Resource};
use crate::utils::errors::{AgentError, Result};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

type Key = (&'static str, String, String);

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPatch {
    pub kind: &'static str,
    pub key: String,
    pub patch: Value,
}

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<BTreeMap<Key, Value>>,
    failing_lists: Mutex<BTreeSet<&'static str>>,
    failing_patches: Mutex<BTreeSet<(&'static str, String)>>,
    patches: Mutex<Vec<RecordedPatch>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn key_of<R: Resource>(namespace: &str, name: &str) -> Key {
    (R::KIND, namespace.to_string(), name.to_string())
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R: Resource>(self, record: R) -> Self {
        if let Err(e) = self.insert(&record) {
            tracing::error!(error = %e, record = %record.key(), "failed to seed record");
        }
        self
    }

    /// Make every `list::<R>` call fail.
    pub fn fail_list<R: Resource>(self) -> Self {
        lock(&self.failing_lists).insert(R::KIND);
        self
    }

    /// Make patches of the `R` named `name` fail.
    pub fn fail_patch<R: Resource>(self, name: &str) -> Self {
        lock(&self.failing_patches).insert((R::KIND, name.to_string()));
        self
    }

    /// Insert or replace a record, as another writer would.
    pub fn insert<R: Resource>(&self, record: &R) -> Result<()> {
        let meta = record.metadata();
        let value = serde_json::to_value(record)?;
        lock(&self.records).insert(key_of::<R>(&meta.namespace, &meta.name), value);
        Ok(())
    }

    /// Current stored copy of a record.
    pub fn stored<R: Resource>(&self, namespace: &str, name: &str) -> Option<R> {
        let value = lock(&self.records).get(&key_of::<R>(namespace, name)).cloned()?;
        serde_json::from_value(value).ok()
    }

    /// Raw stored document, including fields `R` does not model.
    pub fn stored_json<R: Resource>(&self, namespace: &str, name: &str) -> Option<Value> {
        lock(&self.records).get(&key_of::<R>(namespace, name)).cloned()
    }

    /// Replace the raw stored document.
    pub fn insert_json<R: Resource>(&self, namespace: &str, name: &str, value: Value) {
        lock(&self.records).insert(key_of::<R>(namespace, name), value);
    }

    /// Every patch applied so far, in order.
    pub fn patches(&self) -> Vec<RecordedPatch> {
        lock(&self.patches).clone()
    }
}

impl RecordStore for MemoryRecordStore {
    async fn list<R: Resource>(&self, params: &ListParams) -> Result<Vec<R>> {
        if lock(&self.failing_lists).contains(R::KIND) {
            return Err(AgentError::Network(format!("listing {} failed", R::PLURAL)));
        }

        let matching: Vec<Value> = lock(&self.records)
            .iter()
            .filter(|((kind, namespace, _), _)| {
                *kind == R::KIND
                    && params.namespace.as_deref().map_or(true, |ns| ns == namespace)
            })
            .filter(|(_, value)| params.fields.matches(value))
            .map(|(_, value)| value.clone())
            .collect();

        matching
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(AgentError::from))
            .collect()
    }

    async fn get<R: Resource>(&self, namespace: &str, name: &str) -> Result<R> {
        let value = lock(&self.records)
            .get(&key_of::<R>(namespace, name))
            .cloned()
            .ok_or_else(|| AgentError::RecordNotFound {
                kind: R::KIND.to_string(),
                name: format!("{namespace}/{name}"),
            })?;
        Ok(serde_json::from_value(value)?)
    }

    async fn patch<R: Resource>(&self, original: &R, modified: &R) -> Result<()> {
        let meta = original.metadata();
        if lock(&self.failing_patches).contains(&(R::KIND, meta.name.clone())) {
            return Err(AgentError::Network(format!(
                "patching {} {} failed",
                R::KIND,
                original.key()
            )));
        }

        let patch = merge_patch::diff(&serde_json::to_value(original)?, &serde_json::to_value(modified)?);

        let mut records = lock(&self.records);
        let stored = records
            .get_mut(&key_of::<R>(&meta.namespace, &meta.name))
            .ok_or_else(|| AgentError::RecordNotFound {
                kind: R::KIND.to_string(),
                name: original.key(),
            })?;
        merge_patch::apply(stored, &patch);
        drop(records);

        lock(&self.patches).push(RecordedPatch {
            kind: R::KIND,
            key: original.key(),
            patch,
        });
        Ok(())
    }
}
