/// Per-job workspaces
///
/// Each job gets a fresh `snipbox-<job id>` directory under the configured
/// root. The directory is removed before `with_workspace` returns, whatever
/// the outcome, and again from `Drop` if a panic unwinds through it.
use crate::config::types::{Result, SandboxError};
use crate::judge::registry::LanguageProfile;
use crate::observability::audit;
use crate::safety::cleanup;
use std::fs;
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

pub const WORKSPACE_PREFIX: &str = "snipbox-";

/// Traversable but not listable, so the container user can open the
/// script by name even without DAC override capabilities.
const WORKSPACE_DIR_MODE: u32 = 0o711;
const SOURCE_FILE_MODE: u32 = 0o644;

/// One job's directory
pub struct Workspace {
    job_id: Uuid,
    dir: PathBuf,
    removed: bool,
}

impl Workspace {
    fn create(root: &Path, job_id: Uuid) -> Result<Self> {
        // umask may have narrowed the mode
        Self::create_with(root, job_id, |dir| {
            fs::set_permissions(dir, fs::Permissions::from_mode(WORKSPACE_DIR_MODE))
        })
    }

    /// Create the directory, then run `prepare` on it with the guard
    /// already live, so a failed step removes the directory on return.
    fn create_with<F>(root: &Path, job_id: Uuid, prepare: F) -> Result<Self>
    where
        F: FnOnce(&Path) -> std::io::Result<()>,
    {
        let dir = root.join(format!("{}{}", WORKSPACE_PREFIX, job_id));

        fs::DirBuilder::new()
            .mode(WORKSPACE_DIR_MODE)
            .create(&dir)
            .map_err(|e| {
                SandboxError::Workspace(format!(
                    "Failed to create workspace directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;

        let workspace = Self {
            job_id,
            dir,
            removed: false,
        };

        prepare(&workspace.dir).map_err(|e| {
            SandboxError::Workspace(format!(
                "Failed to set permissions on {}: {}",
                workspace.dir.display(),
                e
            ))
        })?;

        log::debug!("Created workspace {}", workspace.dir.display());
        Ok(workspace)
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `contents` to `<dir>/<filename>`.
    pub fn write_source(&self, filename: &str, contents: &str) -> Result<PathBuf> {
        let path = self.dir.join(filename);

        let write = || -> std::io::Result<()> {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .mode(SOURCE_FILE_MODE)
                .open(&path)?;
            file.set_permissions(fs::Permissions::from_mode(SOURCE_FILE_MODE))?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()
        };

        write().map_err(|e| {
            SandboxError::Workspace(format!(
                "Failed to write source file {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(path)
    }

    /// Remove the directory. Idempotent; failures are logged, never returned.
    pub fn cleanup(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;

        if let Err(e) = cleanup::remove_tree(&self.dir) {
            log::warn!(
                "Failed to remove workspace {}: {}",
                self.dir.display(),
                e
            );
            audit::events::cleanup_failure(
                self.job_id,
                &format!("{}: {}", self.dir.display(), e),
            );
        } else {
            log::debug!("Removed workspace {}", self.dir.display());
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Creates workspaces under a single root
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    /// Create the manager, creating `root` if needed.
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root).map_err(|e| {
            SandboxError::Workspace(format!(
                "Failed to create workspace root {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn create_workspace(&self, job_id: Uuid) -> Result<Workspace> {
        Workspace::create(&self.root, job_id)
    }

    /// Scoped workspace: create, write `source` as the profile's script,
    /// run `body` with the directory, then remove the directory.
    ///
    /// The result of `body` (or of the write) is returned untouched;
    /// removal problems never replace it.
    pub fn with_workspace<T, F>(
        &self,
        job_id: Uuid,
        profile: &LanguageProfile,
        source: &str,
        body: F,
    ) -> Result<T>
    where
        F: FnOnce(&Path) -> Result<T>,
    {
        let mut workspace = self.create_workspace(job_id)?;

        let result = workspace
            .write_source(&profile.script_filename, source)
            .and_then(|_| body(workspace.dir()));

        workspace.cleanup();
        result
    }

    /// Remove `snipbox-*` directories older than `max_age`.
    ///
    /// Only needed after a crash; normal jobs clean up after themselves.
    pub fn sweep_stale(&self, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        let entries = fs::read_dir(&self.root).map_err(|e| {
            SandboxError::Workspace(format!(
                "Failed to read workspace root {}: {}",
                self.root.display(),
                e
            ))
        })?;

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Failed to read directory entry: {}", e);
                    continue;
                }
            };

            if !entry.file_name().to_string_lossy().starts_with(WORKSPACE_PREFIX) {
                continue;
            }

            let path = entry.path();
            let metadata = match fs::symlink_metadata(&path) {
                Ok(m) if m.is_dir() => m,
                Ok(_) => continue,
                Err(e) => {
                    log::warn!("Failed to get metadata for {}: {}", path.display(), e);
                    continue;
                }
            };

            let age = match metadata.modified().map(|m| now.duration_since(m)) {
                Ok(Ok(age)) => age,
                // future mtime or no mtime support
                _ => continue,
            };

            if age >= max_age {
                log::info!("Removing stale workspace: {}", path.display());
                match cleanup::remove_tree(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => log::warn!("Failed to remove stale workspace {}: {}", path.display(), e),
                }
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::registry::LanguageRegistry;

    fn python() -> LanguageProfile {
        LanguageRegistry::new().resolve("python").unwrap().clone()
    }

    fn entries(root: &Path) -> usize {
        fs::read_dir(root).unwrap().count()
    }

    #[test]
    fn test_workspace_creation() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf()).unwrap();
        let job_id = Uuid::new_v4();

        let mut workspace = manager.create_workspace(job_id).unwrap();
        assert!(workspace.dir().is_dir());
        assert_eq!(
            workspace.dir().file_name().unwrap().to_string_lossy(),
            format!("snipbox-{}", job_id)
        );
        let mode = fs::metadata(workspace.dir()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, WORKSPACE_DIR_MODE);

        workspace.cleanup();
        assert!(!workspace.dir().exists());
        workspace.cleanup();
    }

    #[test]
    fn test_failed_preparation_removes_directory() {
        let root = tempfile::tempdir().unwrap();

        let result = Workspace::create_with(root.path(), Uuid::new_v4(), |dir| {
            assert!(dir.is_dir());
            Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
        });

        assert!(matches!(result, Err(SandboxError::Workspace(_))));
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn test_with_workspace_writes_source_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf()).unwrap();

        let seen = manager
            .with_workspace(Uuid::new_v4(), &python(), "print(1)", |dir| {
                let script = dir.join("script.py");
                Ok((dir.to_path_buf(), fs::read_to_string(script)?))
            })
            .unwrap();

        assert_eq!(seen.1, "print(1)");
        assert!(!seen.0.exists());
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn test_with_workspace_cleans_up_on_error() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf()).unwrap();

        let result: Result<()> = manager.with_workspace(Uuid::new_v4(), &python(), "x", |_| {
            Err(SandboxError::RuntimeUnavailable("no docker".into()))
        });

        assert!(matches!(result, Err(SandboxError::RuntimeUnavailable(_))));
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn test_with_workspace_cleans_up_on_panic() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf()).unwrap();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<()> = manager.with_workspace(Uuid::new_v4(), &python(), "x", |_| {
                panic!("body panicked");
            });
        }));

        assert!(outcome.is_err());
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn test_body_can_remove_directory_itself() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf()).unwrap();

        let value = manager
            .with_workspace(Uuid::new_v4(), &python(), "x", |dir| {
                fs::remove_dir_all(dir)?;
                Ok(7)
            })
            .unwrap();

        assert_eq!(value, 7);
    }

    #[test]
    fn test_duplicate_job_id_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf()).unwrap();
        let job_id = Uuid::new_v4();

        let _first = manager.create_workspace(job_id).unwrap();
        assert!(matches!(
            manager.create_workspace(job_id),
            Err(SandboxError::Workspace(_))
        ));
    }

    #[test]
    fn test_sweep_stale_only_touches_prefixed_dirs() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf()).unwrap();

        fs::create_dir(root.path().join("snipbox-leftover")).unwrap();
        fs::write(root.path().join("snipbox-leftover/script.py"), b"x").unwrap();
        fs::create_dir(root.path().join("unrelated")).unwrap();

        let removed = manager.sweep_stale(Duration::ZERO).unwrap();
        assert_eq!(removed, 1);
        assert!(!root.path().join("snipbox-leftover").exists());
        assert!(root.path().join("unrelated").exists());
    }

    #[test]
    fn test_sweep_stale_keeps_young_dirs() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf()).unwrap();
        fs::create_dir(root.path().join("snipbox-fresh")).unwrap();

        let removed = manager.sweep_stale(Duration::from_secs(3600)).unwrap();
        assert_eq!(removed, 0);
        assert!(root.path().join("snipbox-fresh").exists());
    }
}
