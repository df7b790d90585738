//! Total size of the regular files below a volume path.

use super::{EntryKind, FileSystem};
use crate::utils::errors::{AgentError, Result};
use std::path::{Path, PathBuf};

/// Sum the byte length of every regular file under `root`.
///
/// Directories are descended into; symlinks and special files count as
/// zero. Any error aborts the walk: a partial total is never returned.
pub fn volume_size<F: FileSystem + ?Sized>(fs: &F, root: &Path) -> Result<u64> {
    let mut total = 0u64;
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = fs.read_dir(&dir).map_err(|source| AgentError::Traversal {
            path: dir.clone(),
            source,
        })?;

        for entry in entries {
            let path = dir.join(&entry.name);
            if entry.is_dir {
                pending.push(path);
                continue;
            }

            let stat = fs.stat(&path).map_err(|source| AgentError::Traversal {
                path: path.clone(),
                source,
            })?;
            if stat.kind == EntryKind::File {
                total += stat.len;
            }
        }
    }

    tracing::debug!(root = %root.display(), bytes = total, "computed volume size");
    Ok(total)
}
