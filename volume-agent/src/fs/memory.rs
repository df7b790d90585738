//! In-memory [`FileSystem`] for tests and dry runs.

use super::{DirEntry, EntryKind, FileStat, FileSystem};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
    Symlink,
}

/// Simulated filesystem rooted at `/`.
///
/// Paths are compared component-wise and must be absolute.
#[derive(Debug)]
pub struct MemoryFileSystem {
    nodes: Mutex<BTreeMap<PathBuf, Node>>,
    denied: Mutex<BTreeSet<PathBuf>>,
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{}: no such file or directory", path.display()))
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::from("/"), Node::Dir);
        Self {
            nodes: Mutex::new(nodes),
            denied: Mutex::new(BTreeSet::new()),
        }
    }

    /// Add a file, creating missing parent directories.
    pub fn with_file(self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) -> Self {
        let path = path.as_ref();
        self.insert_parents(path);
        self.lock().insert(path.to_path_buf(), Node::File(contents.into()));
        self
    }

    /// Add a directory, creating missing parents.
    pub fn with_dir(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.insert_parents(path);
        self.lock().insert(path.to_path_buf(), Node::Dir);
        self
    }

    pub fn with_symlink(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.insert_parents(path);
        self.lock().insert(path.to_path_buf(), Node::Symlink);
        self
    }

    /// Make every operation on `path` fail with `PermissionDenied`.
    pub fn deny(self, path: impl AsRef<Path>) -> Self {
        self.denied
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.as_ref().to_path_buf());
        self
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.lock().contains_key(path.as_ref())
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().get(path.as_ref()) {
            Some(Node::File(contents)) => Some(contents.clone()),
            _ => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Node>> {
        self.nodes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn insert_parents(&self, path: &Path) {
        let mut nodes = self.lock();
        for ancestor in path.ancestors().skip(1) {
            nodes.entry(ancestor.to_path_buf()).or_insert(Node::Dir);
        }
    }

    fn check_access(&self, path: &Path) -> io::Result<()> {
        if self.denied.lock().unwrap_or_else(|e| e.into_inner()).contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{}: permission denied", path.display()),
            ));
        }
        Ok(())
    }

    fn require_parent_dir(nodes: &BTreeMap<PathBuf, Node>, path: &Path) -> io::Result<()> {
        let parent = path.parent().ok_or_else(|| not_found(path))?;
        match nodes.get(parent) {
            Some(Node::Dir) => Ok(()),
            _ => Err(not_found(parent)),
        }
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        self.check_access(path)?;
        let nodes = self.lock();

        match nodes.get(path) {
            Some(Node::Dir) => {}
            Some(_) => return Err(io::Error::other(format!("{} is not a directory", path.display()))),
            None => return Err(not_found(path)),
        }

        Ok(nodes
            .iter()
            .filter(|(child, _)| child.parent() == Some(path))
            .filter_map(|(child, node)| {
                Some(DirEntry {
                    name: child.file_name()?.to_string_lossy().into_owned(),
                    is_dir: matches!(node, Node::Dir),
                })
            })
            .collect())
    }

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        self.check_access(path)?;
        match self.lock().get(path) {
            Some(Node::Dir) => Ok(FileStat { len: 0, kind: EntryKind::Dir }),
            Some(Node::File(contents)) => Ok(FileStat {
                len: contents.len() as u64,
                kind: EntryKind::File,
            }),
            Some(Node::Symlink) => Ok(FileStat { len: 0, kind: EntryKind::Symlink }),
            None => Err(not_found(path)),
        }
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        self.check_access(path)?;
        let mut nodes = self.lock();
        if nodes.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{}: file exists", path.display()),
            ));
        }
        Self::require_parent_dir(&nodes, path)?;
        nodes.insert(path.to_path_buf(), Node::Dir);
        Ok(())
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.check_access(path)?;
        let mut nodes = self.lock();
        Self::require_parent_dir(&nodes, path)?;
        if let Some(Node::Dir) = nodes.get(path) {
            return Err(io::Error::other(format!("{} is a directory", path.display())));
        }
        nodes.insert(path.to_path_buf(), Node::File(contents.to_vec()));
        Ok(())
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        self.check_access(path)?;
        let mut nodes = self.lock();
        if !nodes.contains_key(path) {
            return Err(not_found(path));
        }
        nodes.retain(|candidate, _| !candidate.starts_with(path));
        Ok(())
    }
}
