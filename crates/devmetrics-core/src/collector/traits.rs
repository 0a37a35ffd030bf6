//! Filesystem seam of the procfs source: `RealFs` on a device, `MockFs` in
//! tests.

use std::io;
use std::path::{Path, PathBuf};

/// Read-only view of the statistics tree.
pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    fn exists(&self, path: &Path) -> bool;

    /// Full paths of the entries directly below `path`, in no particular
    /// order.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_fs_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("stat");
        std::fs::write(&file, "cpu 1 2 3\n").unwrap();

        let fs = RealFs::new();
        assert!(fs.exists(&file));
        assert!(!fs.exists(&dir.path().join("missing")));
        assert_eq!(fs.read_to_string(&file).unwrap(), "cpu 1 2 3\n");
        assert_eq!(fs.read_dir(dir.path()).unwrap(), vec![file]);
    }
}
