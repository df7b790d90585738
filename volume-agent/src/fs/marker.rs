//! Verification marker written into a volume before it is backed up.
//!
//! The marker proves that the path the agent resolved for a volume is the
//! one the backup tool actually reads: after the backup, the marker is
//! looked up inside the snapshot. A missing marker means the host path and
//! the mounted volume disagree.

use super::FileSystem;
use crate::exec::listing::parse_listing;
use crate::utils::errors::{AgentError, Result};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error};

/// Hidden directory holding markers, relative to the volume root.
pub const MARKER_DIR: &str = ".backup-verify";

pub const MARKER_CONTENT: &[u8] = b"This file is auto created in volume backup process.";

/// Path of the marker for `backup_id`, relative to the volume root. This is
/// the path to look up in the snapshot.
///
/// The id becomes a file name, so it must not contain separators or be `.`
/// or `..`.
pub fn relative_path(backup_id: &str) -> Result<PathBuf> {
    let mut components = Path::new(backup_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None)
            if name == backup_id && !backup_id.contains(['/', '\\']) =>
        {
            Ok(Path::new(MARKER_DIR).join(name))
        }
        _ => Err(AgentError::InvalidBackupId(backup_id.to_string())),
    }
}

pub struct VerificationMarker<F> {
    fs: F,
}

impl<F: FileSystem> VerificationMarker<F> {
    pub fn new(fs: F) -> Self {
        Self { fs }
    }

    /// Write the marker for `backup_id` and return its full path.
    pub fn write(&self, volume: &Path, backup_id: &str) -> Result<PathBuf> {
        let relative = relative_path(backup_id)?;
        let dir = volume.join(MARKER_DIR);
        match self.fs.create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(source) => return Err(AgentError::Marker { path: dir, source }),
        }

        let path = volume.join(relative);
        self.fs
            .write_file(&path, MARKER_CONTENT)
            .map_err(|source| AgentError::Marker {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), "wrote verification marker");
        Ok(path)
    }

    /// Remove the marker directory. Failures are logged, never returned.
    pub fn clean(&self, volume: &Path) {
        let dir = volume.join(MARKER_DIR);

        if let Err(e) = self.fs.stat(&dir) {
            error!(error = %e, path = %dir.display(), "failed to detect verification marker directory");
            return;
        }

        if let Err(e) = self.fs.remove_all(&dir) {
            error!(error = %e, path = %dir.display(), "failed to remove verification marker directory");
        }
    }

    /// Check that a snapshot listing of the marker path found the marker.
    pub fn confirm_listing(&self, listing: &[u8], backup_id: &str) -> Result<()> {
        let found = parse_listing(listing)?;
        if found != backup_id {
            return Err(AgentError::MarkerMismatch {
                expected: backup_id.to_string(),
                found,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{MemoryFileSystem, OsFileSystem};
    use tempfile::TempDir;

    #[test]
    fn test_write_then_clean() {
        let fs = MemoryFileSystem::new().with_dir("/host_pods/uid-1/volumes/data");
        let volume = Path::new("/host_pods/uid-1/volumes/data");
        let marker = VerificationMarker::new(&fs);

        let path = marker.write(volume, "backup-1").unwrap();
        assert_eq!(path, volume.join(".backup-verify/backup-1"));
        assert_eq!(fs.read_file(&path).unwrap(), MARKER_CONTENT);

        marker.clean(volume);
        assert!(!fs.exists(volume.join(MARKER_DIR)));
        assert!(fs.exists(volume));
    }

    #[test]
    fn test_write_twice_reuses_directory() {
        let fs = MemoryFileSystem::new().with_dir("/vol");
        let marker = VerificationMarker::new(&fs);

        marker.write(Path::new("/vol"), "backup-1").unwrap();
        marker.write(Path::new("/vol"), "backup-2").unwrap();
        assert!(fs.exists("/vol/.backup-verify/backup-1"));
        assert!(fs.exists("/vol/.backup-verify/backup-2"));
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path("backup-1").unwrap(),
            PathBuf::from(".backup-verify/backup-1")
        );
        for id in ["", ".", "..", "../escape", "a/b", "/abs", "a\\b"] {
            assert!(
                matches!(relative_path(id), Err(AgentError::InvalidBackupId(_))),
                "{id:?} accepted"
            );
        }
    }

    #[test]
    fn test_write_rejects_escaping_id() {
        let fs = MemoryFileSystem::new().with_dir("/vol");
        let marker = VerificationMarker::new(&fs);

        assert!(matches!(
            marker.write(Path::new("/vol"), "../outside"),
            Err(AgentError::InvalidBackupId(_))
        ));
        assert!(!fs.exists("/vol/.backup-verify"));
        assert!(!fs.exists("/outside"));
    }

    #[test]
    fn test_write_missing_volume() {
        let fs = MemoryFileSystem::new();
        let marker = VerificationMarker::new(&fs);

        match marker.write(Path::new("/not-mounted"), "backup-1") {
            Err(AgentError::Marker { path, source }) => {
                assert_eq!(path, PathBuf::from("/not-mounted/.backup-verify"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected marker error, got {other:?}"),
        }
    }

    #[test]
    fn test_clean_without_marker_does_not_fail() {
        let fs = MemoryFileSystem::new().with_dir("/vol");
        let marker = VerificationMarker::new(&fs);
        marker.clean(Path::new("/vol"));
        marker.clean(Path::new("/never/existed"));
        assert!(fs.exists("/vol"));
    }

    #[test]
    fn test_clean_denied_is_swallowed() {
        let fs = MemoryFileSystem::new()
            .with_file("/vol/.backup-verify/backup-1", MARKER_CONTENT)
            .deny("/vol/.backup-verify");
        VerificationMarker::new(&fs).clean(Path::new("/vol"));
    }

    #[test]
    fn test_host_filesystem_round() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let marker = VerificationMarker::new(OsFileSystem);

        let path = marker.write(temp_dir.path(), "backup-1").unwrap();
        assert_eq!(std::fs::read(&path)?, MARKER_CONTENT);

        marker.clean(temp_dir.path());
        assert!(!temp_dir.path().join(MARKER_DIR).exists());
        Ok(())
    }

    #[test]
    fn test_confirm_listing() {
        let marker = VerificationMarker::new(MemoryFileSystem::new());
        let listing = concat!(
            r#"{"id":"7be14766","short_id":"7be14766","paths":["/vol"],"struct_type":"snapshot"}"#,
            "\n",
            r#"{"name":"backup-1","type":"file","path":"/.backup-verify/backup-1","size":51,"struct_type":"node"}"#,
            "\n",
        );

        marker.confirm_listing(listing.as_bytes(), "backup-1").unwrap();
        assert!(matches!(
            marker.confirm_listing(listing.as_bytes(), "backup-2"),
            Err(AgentError::MarkerMismatch { .. })
        ));
        assert!(matches!(
            marker.confirm_listing(b"", "backup-1"),
            Err(AgentError::NotFound(_))
        ));
    }
}
