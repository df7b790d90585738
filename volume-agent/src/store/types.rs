//! Records the agent reads from and writes to the record store.

use super::{ObjectMeta, Resource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const API_PREFIX: &str = "/apis/volumes.backup.io/v1";

/// Lifecycle phase shared by volume backups and restores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Freshly created records carry an empty phase.
    #[default]
    #[serde(alias = "")]
    New,
    InProgress,
    Completed,
    Failed,
    /// Any phase this agent does not know, e.g. one added by a newer
    /// controller. Such records are never touched.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::New => "New",
            Phase::InProgress => "InProgress",
            Phase::Completed => "Completed",
            Phase::Failed => "Failed",
            Phase::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

/// Status fields common to backups and restores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatus {
    #[serde(default)]
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<OperationProgress>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationProgress {
    #[serde(default)]
    pub total_bytes: u64,
    #[serde(default)]
    pub bytes_done: u64,
}

/// Backup of one pod volume, pinned to the node the pod runs on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeBackup {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: VolumeBackupSpec,
    #[serde(default)]
    pub status: VolumeBackupStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeBackupSpec {
    /// Node the backup must run on
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub pod: ObjectReference,
    #[serde(default)]
    pub volume: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repository: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeBackupStatus {
    #[serde(flatten)]
    pub operation: OperationStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub snapshot_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

impl Resource for VolumeBackup {
    const KIND: &'static str = "VolumeBackup";
    const API_PREFIX: &'static str = API_PREFIX;
    const PLURAL: &'static str = "volumebackups";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

/// Restore of a snapshot into a pod volume. The node is whatever node the
/// target pod was scheduled to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeRestore {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: VolumeRestoreSpec,
    #[serde(default)]
    pub status: OperationStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRestoreSpec {
    #[serde(default)]
    pub pod: ObjectReference,
    #[serde(default)]
    pub volume: String,
    #[serde(default)]
    pub snapshot_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repository: String,
}

impl Resource for VolumeRestore {
    const KIND: &'static str = "VolumeRestore";
    const API_PREFIX: &'static str = API_PREFIX;
    const PLURAL: &'static str = "volumerestores";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default)]
    pub node_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodStatus {
    #[serde(default)]
    pub phase: String,
}

impl Resource for Pod {
    const KIND: &'static str = "Pod";
    const API_PREFIX: &'static str = "/api/v1";
    const PLURAL: &'static str = "pods";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_phase_wire_names() {
        assert_eq!(serde_json::to_value(Phase::InProgress).unwrap(), json!("InProgress"));
        assert_eq!(serde_json::from_value::<Phase>(json!("")).unwrap(), Phase::New);
        assert_eq!(Phase::Failed.to_string(), "Failed");
        assert_eq!(serde_json::from_value::<Phase>(json!("Canceled")).unwrap(), Phase::Unknown);
    }

    #[test]
    fn test_decode_backup() {
        let backup: VolumeBackup = serde_json::from_value(json!({
            "metadata": {"name": "pvb-1", "namespace": "backup-system", "resourceVersion": "42"},
            "spec": {"node": "node-a", "pod": {"namespace": "app", "name": "db-0"}, "volume": "data"},
            "status": {"phase": "InProgress", "startTimestamp": "2024-01-02T03:04:05Z", "snapshotId": "abc"}
        }))
        .unwrap();

        assert_eq!(backup.spec.node, "node-a");
        assert_eq!(backup.spec.pod.name, "db-0");
        assert_eq!(backup.status.operation.phase, Phase::InProgress);
        assert!(backup.status.operation.start_timestamp.is_some());
        assert_eq!(backup.status.snapshot_id, "abc");
        assert_eq!(backup.metadata.resource_version.as_deref(), Some("42"));
    }

    #[test]
    fn test_decode_minimal_restore() {
        let restore: VolumeRestore = serde_json::from_value(json!({
            "metadata": {"name": "pvr-1", "namespace": "backup-system"}
        }))
        .unwrap();
        assert_eq!(restore.status.phase, Phase::New);
        assert!(restore.spec.pod.name.is_empty());
    }
}
