/// Tree removal for job workspaces
///
/// Removal is idempotent: a path that is already gone counts as removed.
/// Symlinks are unlinked, never followed.
use std::fs;
use std::io;
use std::path::Path;

/// Remove `path` and everything below it.
pub fn remove_tree(path: &Path) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let result = if metadata.file_type().is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_nested_tree() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("job");
        fs::create_dir_all(target.join("a/b")).unwrap();
        fs::write(target.join("a/b/file.txt"), b"x").unwrap();
        fs::write(target.join("top.txt"), b"y").unwrap();

        remove_tree(&target).unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn test_missing_path_is_ok() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("never-created");
        remove_tree(&target).unwrap();
        remove_tree(&target).unwrap();
    }

    #[test]
    fn test_symlink_is_not_followed() {
        let root = tempfile::tempdir().unwrap();
        let outside = root.path().join("outside");
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("keep.txt"), b"keep").unwrap();

        let job = root.path().join("job");
        fs::create_dir(&job).unwrap();
        std::os::unix::fs::symlink(&outside, job.join("link")).unwrap();

        remove_tree(&job).unwrap();
        assert!(!job.exists());
        assert!(outside.join("keep.txt").exists());
    }
}
