//! Access to the cluster record store.
//!
//! Records are fetched and patched through [`RecordStore`]. The agent never
//! replaces a whole record: every write is a merge patch computed against the
//! copy it fetched (see [`merge_patch`]).

pub mod http;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod merge_patch;
pub mod types;

pub use http::HttpRecordStore;
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryRecordStore;
pub use types::{
    ObjectReference, OperationStatus, Phase, Pod, VolumeBackup, VolumeBackupSpec,
    VolumeBackupStatus, VolumeRestore, VolumeRestoreSpec,
};

use crate::utils::errors::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }
}

/// A record type the store knows how to address.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: &'static str;
    const API_PREFIX: &'static str;
    const PLURAL: &'static str;

    fn metadata(&self) -> &ObjectMeta;

    /// `namespace/name`, for logs and errors
    fn key(&self) -> String {
        let meta = self.metadata();
        format!("{}/{}", meta.namespace, meta.name)
    }
}

/// REST path of the collection holding `R`, optionally scoped to a namespace.
pub fn collection_path<R: Resource>(namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) => format!("{}/namespaces/{}/{}", R::API_PREFIX, ns, R::PLURAL),
        None => format!("{}/{}", R::API_PREFIX, R::PLURAL),
    }
}

/// Equality requirements on record fields, addressed by dotted path
/// (`spec.nodeName=node-1,status.phase=Running`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelector {
    requirements: Vec<(String, String)>,
}

impl FieldSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.requirements.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Evaluate against a serialized record. Missing fields compare as "".
    pub fn matches(&self, record: &Value) -> bool {
        self.requirements.iter().all(|(field, expected)| {
            let pointer = format!("/{}", field.replace('.', "/"));
            match record.pointer(&pointer) {
                None | Some(Value::Null) => expected.is_empty(),
                Some(Value::String(actual)) => actual == expected,
                Some(other) => other.to_string() == *expected,
            }
        })
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (field, value)) in self.requirements.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{field}={value}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListParams {
    /// `None` lists across all namespaces
    pub namespace: Option<String>,
    pub fields: FieldSelector,
}

impl ListParams {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn in_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            fields: FieldSelector::new(),
        }
    }

    pub fn fields(mut self, fields: FieldSelector) -> Self {
        self.fields = fields;
        self
    }
}

/// Wire shape of a list response.
#[derive(Debug, Deserialize)]
pub struct ObjectList<R> {
    #[serde(default = "Vec::new")]
    pub items: Vec<R>,
}

pub trait RecordStore {
    fn list<R: Resource>(&self, params: &ListParams) -> impl Future<Output = Result<Vec<R>>> + Send;

    /// Fails with `RecordNotFound` when the record does not exist.
    fn get<R: Resource>(&self, namespace: &str, name: &str) -> impl Future<Output = Result<R>> + Send;

    /// Send the merge patch from `original` to `modified`.
    fn patch<R: Resource>(&self, original: &R, modified: &R) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_paths() {
        assert_eq!(
            collection_path::<VolumeBackup>(Some("backup-system")),
            "/apis/volumes.backup.io/v1/namespaces/backup-system/volumebackups"
        );
        assert_eq!(collection_path::<Pod>(None), "/api/v1/pods");
    }

    #[test]
    fn test_field_selector_display() {
        let selector = FieldSelector::new()
            .with("spec.nodeName", "node-1")
            .with("status.phase", "Running");
        assert_eq!(selector.to_string(), "spec.nodeName=node-1,status.phase=Running");
        assert_eq!(FieldSelector::new().to_string(), "");
    }

    #[test]
    fn test_field_selector_matches() {
        let pod = json!({
            "metadata": {"name": "db-0", "namespace": "app"},
            "spec": {"nodeName": "node-1"},
            "status": {"phase": "Running"}
        });

        assert!(FieldSelector::new().matches(&pod));
        assert!(FieldSelector::new()
            .with("spec.nodeName", "node-1")
            .with("status.phase", "Running")
            .matches(&pod));
        assert!(!FieldSelector::new().with("spec.nodeName", "node-2").matches(&pod));
        assert!(FieldSelector::new().with("spec.hostNetwork", "").matches(&pod));
    }
}
