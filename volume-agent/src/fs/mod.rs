//! Filesystem access for volume operations.
//!
//! Components receive a [`FileSystem`] instead of touching `std::fs`
//! directly, so the same code runs against the host and against
//! [`memory::MemoryFileSystem`] in tests.

pub mod marker;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod volume_size;

pub use marker::VerificationMarker;
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryFileSystem;
pub use volume_size::volume_size;

use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Type of a filesystem entry. Symlinks are never followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Other,
}

impl From<std::fs::FileType> for EntryKind {
    fn from(file_type: std::fs::FileType) -> Self {
        if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::Other
        }
    }
}

/// A child of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Length in bytes; only meaningful for regular files
    pub len: u64,
    pub kind: EntryKind,
}

pub trait FileSystem {
    /// List the direct children of `path`.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Metadata of `path` without following symlinks.
    fn stat(&self, path: &Path) -> io::Result<FileStat>;

    /// Create a single directory. Fails with `AlreadyExists` if it is there.
    fn create_dir(&self, path: &Path) -> io::Result<()>;

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Remove `path` and everything below it.
    fn remove_all(&self, path: &Path) -> io::Result<()>;
}

impl<T: FileSystem + ?Sized> FileSystem for &T {
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        (**self).read_dir(path)
    }

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        (**self).stat(path)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        (**self).create_dir(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        (**self).write_file(path, contents)
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        (**self).remove_all(path)
    }
}

/// The host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        // The root itself may be a symlink, as with std::fs::read_dir.
        if !std::fs::metadata(path)?.is_dir() {
            return Err(io::Error::other(format!("{} is not a directory", path.display())));
        }

        WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .follow_root_links(true)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .map(|entry| {
                let entry = entry?;
                Ok(DirEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    is_dir: entry.file_type().is_dir(),
                })
            })
            .collect()
    }

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let metadata = std::fs::symlink_metadata(path)?;
        Ok(FileStat {
            len: metadata.len(),
            kind: metadata.file_type().into(),
        })
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }
}
