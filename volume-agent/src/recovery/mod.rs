//! Startup recovery of volume backups and restores stuck in progress.
//!
//! When the agent restarts while an operation is running, the process that
//! owned it is gone and nothing else will ever move the record out of
//! `InProgress`. Before the watch loop attaches, the agent fails every such
//! record pinned to its own node. An operation that finished right before
//! the crash but never recorded it is failed too.

pub mod host_path;

use crate::store::{
    ListParams, OperationStatus, Phase, Pod, RecordStore, Resource, VolumeBackup, VolumeRestore,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    pub name: String,
    pub reason: String,
}

/// What one recovery sweep did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecoveryReport {
    pub failed_backups: Vec<String>,
    pub failed_restores: Vec<String>,
    /// Restores whose node could not be determined
    pub skipped_restores: Vec<SkippedRecord>,
    /// List and patch failures
    pub errors: usize,
}

impl RecoveryReport {
    pub fn failed_total(&self) -> usize {
        self.failed_backups.len() + self.failed_restores.len()
    }
}

fn mark_failed(status: &mut OperationStatus, kind: &str) {
    status.phase = Phase::Failed;
    status.message = format!(
        "found a {kind} with phase \"{}\" while the agent was starting, marked it as \"{}\"",
        Phase::InProgress,
        Phase::Failed
    );
    status.completion_timestamp = Some(Utc::now());
}

pub struct RecoveryReconciler<'a, S> {
    store: &'a S,
    namespace: String,
    node_name: String,
}

impl<'a, S: RecordStore> RecoveryReconciler<'a, S> {
    /// `store` must not depend on a cache that is populated by the watch
    /// loop: the sweep runs before it starts.
    pub fn new(store: &'a S, namespace: impl Into<String>, node_name: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            node_name: node_name.into(),
        }
    }

    /// Fail every in-progress backup and restore that belongs to this node.
    ///
    /// Best effort: errors are logged and counted, and never stop the sweep.
    pub async fn run(&self) -> RecoveryReport {
        let mut report = RecoveryReport::default();

        self.fail_in_progress_backups(&mut report).await;
        self.fail_in_progress_restores(&mut report).await;

        info!(
            failed_backups = report.failed_backups.len(),
            failed_restores = report.failed_restores.len(),
            skipped_restores = report.skipped_restores.len(),
            errors = report.errors,
            "Startup recovery finished"
        );
        report
    }

    async fn list<R: Resource>(&self, report: &mut RecoveryReport) -> Option<Vec<R>> {
        match self.store.list::<R>(&ListParams::in_namespace(&self.namespace)).await {
            Ok(records) => Some(records),
            Err(e) => {
                error!(error = %e, namespace = %self.namespace, "failed to list {}", R::PLURAL);
                report.errors += 1;
                None
            }
        }
    }

    async fn fail_in_progress_backups(&self, report: &mut RecoveryReport) {
        let Some(backups) = self.list::<VolumeBackup>(report).await else {
            return;
        };

        for backup in backups {
            let name = backup.metadata.name.clone();
            let phase = backup.status.operation.phase;
            if phase != Phase::InProgress {
                debug!(backup = %name, phase = %phase, "volume backup not in progress, skip");
                continue;
            }
            if backup.spec.node != self.node_name {
                debug!(
                    backup = %name,
                    node = %backup.spec.node,
                    local_node = %self.node_name,
                    "volume backup belongs to another node, skip"
                );
                continue;
            }

            let mut updated = backup.clone();
            mark_failed(&mut updated.status.operation, "volume backup");

            if let Err(e) = self.store.patch(&backup, &updated).await {
                error!(error = %e, backup = %name, "failed to patch volume backup");
                report.errors += 1;
                continue;
            }
            warn!(backup = %name, "{}", updated.status.operation.message);
            report.failed_backups.push(name);
        }
    }

    async fn fail_in_progress_restores(&self, report: &mut RecoveryReport) {
        let Some(restores) = self.list::<VolumeRestore>(report).await else {
            return;
        };

        for restore in restores {
            let name = restore.metadata.name.clone();
            if restore.status.phase != Phase::InProgress {
                debug!(restore = %name, phase = %restore.status.phase, "volume restore not in progress, skip");
                continue;
            }

            let target = &restore.spec.pod;
            let pod: Pod = match self.store.get(&target.namespace, &target.name).await {
                Ok(pod) => pod,
                Err(e) => {
                    // Without the pod the node is unknown; leave the record alone.
                    error!(
                        error = %e,
                        restore = %name,
                        pod = %format!("{}/{}", target.namespace, target.name),
                        "failed to get pod of volume restore"
                    );
                    report.skipped_restores.push(SkippedRecord {
                        name,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if pod.spec.node_name != self.node_name {
                debug!(
                    restore = %name,
                    node = %pod.spec.node_name,
                    local_node = %self.node_name,
                    "pod of volume restore runs on another node, skip"
                );
                continue;
            }

            let mut updated = restore.clone();
            mark_failed(&mut updated.status, "volume restore");

            if let Err(e) = self.store.patch(&restore, &updated).await {
                error!(error = %e, restore = %name, "failed to patch volume restore");
                report.errors += 1;
                continue;
            }
            warn!(restore = %name, "{}", updated.status.message);
            report.failed_restores.push(name);
        }
    }
}
