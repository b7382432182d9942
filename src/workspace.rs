//! Per-request scoped working directories.
//!
//! Every audio request downloads and re-encodes inside its own directory so
//! concurrent requests for the same video cannot clobber each other's files.
//! The directory and everything in it is removed when the workspace is
//! dropped, on success and failure alike.

use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// A uniquely named directory that lives as long as one request.
#[derive(Debug)]
pub struct RequestWorkspace {
    root: PathBuf,
}

impl RequestWorkspace {
    /// Create a fresh workspace under `base`, creating `base` itself if needed.
    pub fn create(base: &Path) -> io::Result<Self> {
        let root = base.join(Uuid::new_v4().to_string());
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory this request may write into.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for a file inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Drop for RequestWorkspace {
    fn drop(&mut self) {
        // Best effort: disk cleanup must never turn into a second failure.
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove workspace {:?}: {}", self.root, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_unique_directories() {
        let base = TempDir::new().unwrap();
        let a = RequestWorkspace::create(base.path()).unwrap();
        let b = RequestWorkspace::create(base.path()).unwrap();
        assert_ne!(a.root(), b.root());
        assert!(a.root().is_dir());
        assert!(b.root().is_dir());
    }

    #[test]
    fn drop_removes_directory_and_contents() {
        let base = TempDir::new().unwrap();
        let path = {
            let ws = RequestWorkspace::create(base.path()).unwrap();
            std::fs::write(ws.file("audio.mp3"), b"data").unwrap();
            std::fs::write(ws.file("compressed_audio.mp3"), b"data").unwrap();
            ws.root().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn file_paths_stay_inside_root() {
        let base = TempDir::new().unwrap();
        let ws = RequestWorkspace::create(base.path()).unwrap();
        assert!(ws.file("x.mp3").starts_with(ws.root()));
    }
}
