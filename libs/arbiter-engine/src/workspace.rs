/// Execution workspace
///
/// **Core Responsibility:**
/// Own the directory tree that holds per-request sources and build artifacts.
///
/// - `Workspace` lives as long as the engine and removes itself on drop
/// - `ScratchDir` is one request's directory, removed when the guard drops
///   (success, error, timeout, cancellation or panic)

use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug)]
pub struct Workspace {
    root: TempDir,
}

impl Workspace {
    /// Create a fresh workspace under `base`, or under the system temp dir
    pub fn create(base: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("arbiter-");
        let root = match base {
            Some(base) => {
                fs::create_dir_all(base)?;
                builder.tempdir_in(base)?
            }
            None => builder.tempdir()?,
        };
        debug!(path = %root.path().display(), "Created execution workspace");
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Allocate a uniquely named directory for one request
    pub fn scratch(&self) -> io::Result<ScratchDir> {
        let id = Uuid::new_v4();
        let name = format!(
            "run_{}_{}",
            Utc::now().format("%Y%m%d%H%M%S%3f"),
            id.simple()
        );
        let path = self.root.path().join(name);
        fs::create_dir(&path)?;
        Ok(ScratchDir { id, path })
    }
}

/// Request-scoped directory guard
#[derive(Debug)]
pub struct ScratchDir {
    id: Uuid,
    path: PathBuf,
}

impl ScratchDir {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        // Best-effort cleanup, runs before the result reaches the caller
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed scratch directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove scratch directory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_dirs_are_unique_and_removed() {
        let workspace = Workspace::create(None).unwrap();
        let first = workspace.scratch().unwrap();
        let second = workspace.scratch().unwrap();

        assert_ne!(first.path(), second.path());
        assert!(first.path().starts_with(workspace.path()));

        let name = first.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("run_"));
        assert!(name.ends_with(&first.id().simple().to_string()));

        fs::write(first.join("Main.java"), "class Main {}").unwrap();
        let kept = first.path().to_path_buf();
        drop(first);
        assert!(!kept.exists());
        assert!(second.path().exists());
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let base = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(Some(&base.path().join("nested"))).unwrap();
        let root = workspace.path().to_path_buf();
        assert!(root.starts_with(base.path()));
        assert!(root.exists());

        drop(workspace);
        assert!(!root.exists());
    }
}
