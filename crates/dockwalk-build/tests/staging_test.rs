use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dockwalk_build::{StagingAreaBuilder, StagingError};
use dockwalk_core::{BuildableUnit, DockwalkConfig};
use tempfile::TempDir;

const DESCRIPTOR: &str = "FROM debian:stretch\n### Build-time metadata ###\nRUN apt-get update\n";
const META: &str = "ARG BUILD_DATE\nARG VERSION\nLABEL org.label-schema.version=$VERSION\n";

/// Repository with one unit (`stretch`), the default include dir and fill-in file.
fn repo() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    std::fs::create_dir_all(root.join("stretch/scripts")).unwrap();
    std::fs::create_dir_all(root.join("stretch/empty/deeper")).unwrap();
    std::fs::create_dir_all(root.join("stretch/variant")).unwrap();
    std::fs::write(root.join("stretch/Dockerfile"), DESCRIPTOR).unwrap();
    std::fs::write(root.join("stretch/scripts/setup.sh"), "#!/bin/sh\n").unwrap();
    std::fs::write(root.join("stretch/variant/Dockerfile"), "FROM stretch\n").unwrap();

    std::fs::create_dir_all(root.join("root-fs/etc/profile.d")).unwrap();
    std::fs::write(root.join("root-fs/etc/profile.d/env.sh"), "export A=1\n").unwrap();

    std::fs::write(root.join("Dockerfile.meta"), META).unwrap();
    tmp
}

/// Every file and directory below `root`, with file contents.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
    let mut out = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            let relative = path.strip_prefix(root).unwrap().to_path_buf();
            if path.is_dir() {
                out.insert(relative, None);
                pending.push(path);
            } else {
                out.insert(relative, Some(std::fs::read(&path).unwrap()));
            }
        }
    }
    out
}

fn unit(root: &Path, path: &str) -> BuildableUnit {
    BuildableUnit::from_path(root, Path::new(path)).unwrap()
}

#[test]
fn staging_root_is_named_after_unit() {
    let repo = repo();
    let config = DockwalkConfig::default();

    let staging = StagingAreaBuilder::new(repo.path(), &config)
        .stage(&unit(repo.path(), "stretch"))
        .unwrap();

    assert_eq!(staging.root(), staging.temp_dir().join("stretch"));
    assert!(staging.root().join("scripts/setup.sh").is_file());
}

#[test]
fn include_dirs_are_merged_into_staging_root() {
    let repo = repo();
    let config = DockwalkConfig::default();

    let staging = StagingAreaBuilder::new(repo.path(), &config)
        .stage(&unit(repo.path(), "stretch"))
        .unwrap();

    let env_sh = staging.root().join("root-fs/etc/profile.d/env.sh");
    assert_eq!(std::fs::read_to_string(env_sh).unwrap(), "export A=1\n");
}

#[test]
fn include_merges_with_existing_directory() {
    let repo = repo();
    std::fs::create_dir_all(repo.path().join("stretch/root-fs/opt")).unwrap();
    std::fs::write(repo.path().join("stretch/root-fs/opt/own"), "mine").unwrap();
    let config = DockwalkConfig::default();

    let staging = StagingAreaBuilder::new(repo.path(), &config)
        .stage(&unit(repo.path(), "stretch"))
        .unwrap();

    assert!(staging.root().join("root-fs/opt/own").is_file());
    assert!(staging.root().join("root-fs/etc/profile.d/env.sh").is_file());
}

#[test]
fn metadata_is_spliced_after_marker() {
    let repo = repo();
    let config = DockwalkConfig::default();

    let staging = StagingAreaBuilder::new(repo.path(), &config)
        .stage(&unit(repo.path(), "stretch"))
        .unwrap();

    let dockerfile = std::fs::read_to_string(staging.root().join("Dockerfile")).unwrap();
    assert_eq!(
        dockerfile,
        format!(
            "FROM debian:stretch\n### Build-time metadata ###\n{META}RUN apt-get update\n"
        )
    );
}

#[test]
fn empty_and_dockerfile_only_dirs_are_pruned() {
    let repo = repo();
    let config = DockwalkConfig::default();

    let staging = StagingAreaBuilder::new(repo.path(), &config)
        .stage(&unit(repo.path(), "stretch"))
        .unwrap();

    assert!(!staging.root().join("empty").exists());
    assert!(!staging.root().join("variant").exists());

    for (path, content) in snapshot(staging.root()) {
        if content.is_none() {
            let entries: Vec<_> = std::fs::read_dir(staging.root().join(&path))
                .unwrap()
                .map(|e| e.unwrap().file_name())
                .collect();
            assert!(!entries.is_empty(), "{} is empty", path.display());
            assert!(
                !(entries.len() == 1 && entries[0] == "Dockerfile"),
                "{} only holds a Dockerfile",
                path.display()
            );
        }
    }
}

#[test]
fn source_tree_is_never_modified() {
    let repo = repo();
    let config = DockwalkConfig::default();
    let before = snapshot(repo.path());

    let staging = StagingAreaBuilder::new(repo.path(), &config)
        .stage(&unit(repo.path(), "stretch"))
        .unwrap();
    staging.cleanup().unwrap();

    assert_eq!(snapshot(repo.path()), before);
}

#[test]
fn cleanup_removes_temp_directory() {
    let repo = repo();
    let config = DockwalkConfig::default();

    let staging = StagingAreaBuilder::new(repo.path(), &config)
        .stage(&unit(repo.path(), "stretch"))
        .unwrap();
    let temp = staging.temp_dir().to_path_buf();
    assert!(temp.exists());

    staging.cleanup().unwrap();
    assert!(!temp.exists());
}

#[test]
fn dropping_staging_area_removes_temp_directory() {
    let repo = repo();
    let config = DockwalkConfig::default();

    let staging = StagingAreaBuilder::new(repo.path(), &config)
        .stage(&unit(repo.path(), "stretch"))
        .unwrap();
    let temp = staging.temp_dir().to_path_buf();

    drop(staging);
    assert!(!temp.exists());
}

#[test]
fn missing_fill_in_file_fails() {
    let repo = repo();
    std::fs::remove_file(repo.path().join("Dockerfile.meta")).unwrap();
    let config = DockwalkConfig::default();

    let result = StagingAreaBuilder::new(repo.path(), &config).stage(&unit(repo.path(), "stretch"));

    assert!(matches!(result, Err(StagingError::ReadFillIn { .. })));
}

#[test]
fn missing_include_dir_fails() {
    let repo = repo();
    let mut config = DockwalkConfig::default();
    config.staging.include_dirs.push("does-not-exist".to_owned());

    let result = StagingAreaBuilder::new(repo.path(), &config).stage(&unit(repo.path(), "stretch"));

    assert!(matches!(result, Err(StagingError::ReadDir { .. })));
}

#[test]
fn no_fill_in_leaves_descriptor_untouched() {
    let repo = repo();
    let mut config = DockwalkConfig::default();
    config.staging.fill_in.clear();
    config.staging.include_dirs.clear();

    let staging = StagingAreaBuilder::new(repo.path(), &config)
        .stage(&unit(repo.path(), "stretch"))
        .unwrap();

    let dockerfile = std::fs::read_to_string(staging.root().join("Dockerfile")).unwrap();
    assert_eq!(dockerfile, DESCRIPTOR);
    assert!(!staging.root().join("root-fs").exists());
}
