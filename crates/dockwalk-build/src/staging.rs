use std::path::{Path, PathBuf};

use dockwalk_core::{BuildableUnit, DESCRIPTOR_FILE, DockwalkConfig};
use tempfile::TempDir;

use crate::prune::prune_until_stable;
use crate::splice::splice_after_marker;

/// Isolated copy of a unit, used as the docker build context.
///
/// The temporary directory is removed by [`StagingArea::cleanup`], or on drop
/// if the pipeline is abandoned before that.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    root: PathBuf,
}

impl StagingArea {
    /// The staging root: `<tmp>/<unit name>`. Pass this to `docker build`.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The enclosing temporary directory.
    pub fn temp_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Delete the temporary directory.
    pub fn cleanup(self) -> Result<(), StagingError> {
        let path = self.dir.path().to_path_buf();
        tracing::debug!("deleting staging directory {}", path.display());
        self.dir
            .close()
            .map_err(|e| StagingError::Cleanup { path, source: e })
    }
}

/// Builds staging areas for units of one repository.
pub struct StagingAreaBuilder<'a> {
    repo_root: &'a Path,
    config: &'a DockwalkConfig,
}

impl<'a> StagingAreaBuilder<'a> {
    /// Include directories and fill-in files are resolved against `repo_root`.
    pub fn new(repo_root: &'a Path, config: &'a DockwalkConfig) -> Self {
        Self { repo_root, config }
    }

    pub fn stage(&self, unit: &BuildableUnit) -> Result<StagingArea, StagingError> {
        let dir = tempfile::Builder::new()
            .prefix("dockwalk-")
            .tempdir()
            .map_err(|e| StagingError::CreateTemp { source: e })?;

        let dir_name = unit.dir_name();
        if dir_name.is_empty() {
            return Err(StagingError::InvalidUnitPath(unit.source_path().to_path_buf()));
        }
        let root = dir.path().join(&dir_name);

        copy_tree(unit.source_path(), &root)?;

        for include in &self.config.staging.include_dirs {
            let source = self.repo_root.join(include);
            let Some(name) = source.file_name() else {
                return Err(StagingError::InvalidUnitPath(source));
            };
            let target = root.join(name);
            tracing::debug!("merging include {} into {}", source.display(), target.display());
            copy_tree(&source, &target)?;
        }

        for (fill_file, marker) in &self.config.staging.fill_in {
            self.fill_in(&root, &self.repo_root.join(fill_file), marker)?;
        }

        let pruned = prune_until_stable(&root).map_err(|e| StagingError::Prune {
            path: root.clone(),
            source: e,
        })?;
        for path in &pruned {
            tracing::debug!("pruned {}", path.display());
        }

        tracing::info!("staged {} at {}", unit, root.display());
        Ok(StagingArea { dir, root })
    }

    fn fill_in(&self, root: &Path, fill_file: &Path, marker: &str) -> Result<(), StagingError> {
        let descriptor_path = root.join(DESCRIPTOR_FILE);
        let descriptor =
            std::fs::read_to_string(&descriptor_path).map_err(|e| StagingError::ReadDescriptor {
                path: descriptor_path.clone(),
                source: e,
            })?;
        let fill = std::fs::read_to_string(fill_file).map_err(|e| StagingError::ReadFillIn {
            path: fill_file.to_path_buf(),
            source: e,
        })?;

        let spliced = splice_after_marker(&descriptor, marker, &fill);
        std::fs::write(&descriptor_path, spliced).map_err(|e| StagingError::WriteDescriptor {
            path: descriptor_path,
            source: e,
        })
    }
}

/// Recursively copy `src` into `dst`, merging with anything already in `dst`.
///
/// Symlinks are followed; their targets are copied as regular content.
fn copy_tree(src: &Path, dst: &Path) -> Result<(), StagingError> {
    std::fs::create_dir_all(dst).map_err(|e| StagingError::CreateDir {
        path: dst.to_path_buf(),
        source: e,
    })?;

    let entries = std::fs::read_dir(src).map_err(|e| StagingError::ReadDir {
        path: src.to_path_buf(),
        source: e,
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| StagingError::ReadDir {
            path: src.to_path_buf(),
            source: e,
        })?;
        let from = entry.path();
        let to = dst.join(entry.file_name());

        let metadata = std::fs::metadata(&from).map_err(|e| StagingError::Copy {
            path: from.clone(),
            source: e,
        })?;

        if metadata.is_dir() {
            copy_tree(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(|e| StagingError::Copy {
                path: from,
                source: e,
            })?;
        }
    }

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("failed to create staging directory")]
    CreateTemp { source: std::io::Error },
    #[error("cannot derive a staging directory name from {0}")]
    InvalidUnitPath(PathBuf),
    #[error("failed to create directory {path}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read directory {path}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to copy {path}")]
    Copy {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read Dockerfile at {path}")]
    ReadDescriptor {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read fill-in file {path}")]
    ReadFillIn {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write Dockerfile at {path}")]
    WriteDescriptor {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to prune empty directories under {path}")]
    Prune {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to delete staging directory {path}")]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },
}
