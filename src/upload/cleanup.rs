// src/upload/cleanup.rs

//! Scoped cleanup of temporary artifacts
//!
//! Every locally-created file of a publish invocation (downloaded
//! installer copy, ciphertext) is registered here. The guard removes them
//! on drop, so they are gone on every exit path of the orchestrator:
//! success, error, or panic. Removal happens exactly once.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// RAII guard owning the temporary files of one publish invocation.
#[derive(Debug, Default)]
pub struct CleanupGuard {
    paths: Vec<PathBuf>,
}

impl CleanupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path for removal when the guard drops.
    pub fn register(&mut self, path: &Path) {
        debug!("Registered temporary artifact {}", path.display());
        self.paths.push(path.to_path_buf());
    }

    /// Number of artifacts currently registered.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed temporary artifact {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_registered_files_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.tmp");
        let b = dir.path().join("b.tmp");
        fs::write(&a, b"x").unwrap();
        fs::write(&b, b"y").unwrap();

        {
            let mut guard = CleanupGuard::new();
            guard.register(&a);
            guard.register(&b);
            assert_eq!(guard.len(), 2);
        }
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[test]
    fn test_missing_file_tolerated() {
        let dir = TempDir::new().unwrap();
        let ghost = dir.path().join("never-created.tmp");
        let mut guard = CleanupGuard::new();
        guard.register(&ghost);
        drop(guard); // must not panic
    }

    #[test]
    fn test_cleanup_runs_on_panic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("panic.tmp");
        fs::write(&path, b"z").unwrap();

        let target = path.clone();
        let result = std::panic::catch_unwind(move || {
            let mut guard = CleanupGuard::new();
            guard.register(&target);
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(!path.exists());
    }
}
