use std::path::{Path, PathBuf};

use dockwalk_core::DESCRIPTOR_FILE;

/// Remove every directory below `root` that is empty or holds nothing but a
/// `Dockerfile`, repeating bottom-up passes until one removes nothing.
///
/// `root` itself is never removed. Returns the removed directories.
pub fn prune_until_stable(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    loop {
        let before = removed.len();
        prune_pass(root, &mut removed)?;
        if removed.len() == before {
            return Ok(removed);
        }
    }
}

fn prune_pass(dir: &Path, removed: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for child in subdirectories(dir)? {
        prune_pass(&child, removed)?;
        if is_prunable(&child)? {
            tracing::debug!("pruning {}", child.display());
            std::fs::remove_dir_all(&child)?;
            removed.push(child);
        }
    }
    Ok(())
}

fn subdirectories(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn is_prunable(dir: &Path) -> std::io::Result<bool> {
    let names = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<std::io::Result<Vec<_>>>()?;
    Ok(match names.as_slice() {
        [] => true,
        [only] => *only == DESCRIPTOR_FILE,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn removes_nested_empty_chain() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("a/b/c/d")).unwrap();

        let removed = prune_until_stable(tmp.path()).unwrap();

        assert!(!tmp.path().join("a").exists());
        assert_eq!(removed.len(), 4);
    }

    #[test]
    fn removes_dockerfile_only_directories() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("variant")).unwrap();
        std::fs::write(tmp.path().join("variant/Dockerfile"), "FROM a\n").unwrap();

        prune_until_stable(tmp.path()).unwrap();

        assert!(!tmp.path().join("variant").exists());
    }

    #[test]
    fn parent_left_with_only_dockerfile_is_removed_too() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("outer/inner")).unwrap();
        std::fs::write(tmp.path().join("outer/Dockerfile"), "FROM a\n").unwrap();

        prune_until_stable(tmp.path()).unwrap();

        assert!(!tmp.path().join("outer").exists());
    }

    #[test]
    fn keeps_directories_with_content_and_root() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("Dockerfile"), "FROM a\n").unwrap();
        std::fs::create_dir_all(tmp.path().join("etc/empty")).unwrap();
        std::fs::write(tmp.path().join("etc/motd"), "hi").unwrap();

        prune_until_stable(tmp.path()).unwrap();

        assert!(tmp.path().join("Dockerfile").is_file());
        assert!(tmp.path().join("etc/motd").is_file());
        assert!(!tmp.path().join("etc/empty").exists());
    }

    #[test]
    fn directory_with_single_other_file_is_kept() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("conf")).unwrap();
        std::fs::write(tmp.path().join("conf/Dockerfile.meta"), "ARG X\n").unwrap();

        prune_until_stable(tmp.path()).unwrap();

        assert!(tmp.path().join("conf/Dockerfile.meta").is_file());
    }
}
