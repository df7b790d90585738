//! Startup check that the host pods directory is mounted where configured.
//!
//! Every running pod on the node has a directory named after its UID below
//! the kubelet pods directory. If those are missing the agent is looking at
//! the wrong mount and could never reach any volume.

use crate::fs::FileSystem;
use crate::store::{FieldSelector, ListParams, Pod, RecordStore};
use crate::utils::errors::{AgentError, Result};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

/// Static pods are mirrored with a different UID; the kubelet keeps using
/// the original one, stored in this annotation.
pub const MIRROR_POD_ANNOTATION: &str = "kubernetes.io/config.mirror";

fn host_dir_name(pod: &Pod) -> Option<&str> {
    pod.metadata
        .annotations
        .get(MIRROR_POD_ANNOTATION)
        .map(String::as_str)
        .or(pod.metadata.uid.as_deref())
}

/// Check that every running pod on `node_name` has its directory under
/// `host_pods_dir`.
pub async fn validate_pod_volumes_host_path<F, S>(
    fs: &F,
    store: &S,
    host_pods_dir: &Path,
    node_name: &str,
) -> Result<()>
where
    F: FileSystem + ?Sized,
    S: RecordStore,
{
    let dirs: BTreeSet<String> = fs
        .read_dir(host_pods_dir)
        .map_err(|source| AgentError::Traversal {
            path: host_pods_dir.to_path_buf(),
            source,
        })?
        .into_iter()
        .filter(|entry| entry.is_dir)
        .map(|entry| entry.name)
        .collect();

    let params = ListParams::all().fields(
        FieldSelector::new()
            .with("spec.nodeName", node_name)
            .with("status.phase", "Running"),
    );
    let pods: Vec<Pod> = store.list(&params).await?;

    let mut missing = 0;
    for pod in &pods {
        let Some(dir) = host_dir_name(pod) else {
            debug!(pod = %pod.metadata.name, "pod has no uid, skip");
            continue;
        };
        if !dirs.contains(dir) {
            missing += 1;
            debug!(
                pod = %format!("{}/{}", pod.metadata.namespace, pod.metadata.name),
                path = %host_pods_dir.join(dir).display(),
                "could not find volumes for pod in host path"
            );
        }
    }

    if missing > 0 {
        return Err(AgentError::HostPathInvalid(format!(
            "found {missing} running pods on node {node_name} with no directory in {}; \
             check that the host pods path is mounted correctly",
            host_pods_dir.display()
        )));
    }

    info!(pods = pods.len(), path = %host_pods_dir.display(), "host pods path validated");
    Ok(())
}
