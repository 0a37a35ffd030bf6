//! In-memory mock filesystem for testing the procfs source without real `/proc`.

use crate::collector::traits::FileSystem;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
enum Node {
    File(String),
    Dir,
}

/// In-memory `/proc` tree.
///
/// Directory listings come back sorted, so scans over a mock tree are
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    nodes: BTreeMap<PathBuf, Node>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file; missing parent directories are created.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.nodes
            .insert(path.to_path_buf(), Node::File(content.into()));
    }

    /// Adds a directory and its ancestors.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        for dir in path.as_ref().ancestors() {
            if dir.as_os_str().is_empty() {
                continue;
            }
            self.nodes.entry(dir.to_path_buf()).or_insert(Node::Dir);
        }
    }

    /// Removes a file, as when a process exits mid-scan.
    pub fn remove_file(&mut self, path: impl AsRef<Path>) {
        if let Some(Node::File(_)) = self.nodes.get(path.as_ref()) {
            self.nodes.remove(path.as_ref());
        }
    }

    /// Adds `<proc>/<pid>/stat` and `<proc>/<pid>/status` under `/proc`.
    pub fn add_process(&mut self, pid: u32, stat: &str, status: &str) {
        let dir = Path::new("/proc").join(pid.to_string());
        self.add_file(dir.join("stat"), stat);
        self.add_file(dir.join("status"), status);
    }
}

fn not_found(what: &str, path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} not found: {}", what, path.display()),
    )
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        match self.nodes.get(path) {
            Some(Node::File(content)) => Ok(content.clone()),
            _ => Err(not_found("file", path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.nodes.contains_key(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !matches!(self.nodes.get(path), Some(Node::Dir)) {
            return Err(not_found("directory", path));
        }
        Ok(self
            .nodes
            .keys()
            .filter(|entry| entry.parent() == Some(path))
            .cloned()
            .collect())
    }
}
