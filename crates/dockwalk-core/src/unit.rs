//! Buildable unit discovery.
//!
//! A buildable unit is a directory below the repository root that directly
//! contains a `Dockerfile`. Top-level hidden directories and the configured
//! include directories are skipped entirely: include directories hold shared
//! content merged into every unit and are never built on their own.

use std::ffi::OsString;
use std::fs::FileType;
use std::path::{Component, Path, PathBuf};

use crate::config::DockwalkConfig;
use crate::error::DiscoveryError;
use crate::DESCRIPTOR_FILE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildableUnit {
    relative_path: PathBuf,
    source_path: PathBuf,
    base_tag: String,
}

impl BuildableUnit {
    fn new(root: &Path, relative_path: PathBuf) -> Self {
        let base_tag = relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("-");
        Self {
            source_path: root.join(&relative_path),
            relative_path,
            base_tag,
        }
    }

    /// Build a unit from an explicit path, as given on the command line.
    ///
    /// Relative paths are taken relative to `root`; absolute paths must lie
    /// inside it. The directory must contain a `Dockerfile`.
    pub fn from_path(root: &Path, path: &Path) -> Result<Self, DiscoveryError> {
        let root = resolve_root(root)?;

        let candidate = if path.is_absolute() {
            path.strip_prefix(&root)
                .map_err(|_| DiscoveryError::OutsideRoot {
                    path: path.to_path_buf(),
                    root: root.clone(),
                })?
                .to_path_buf()
        } else {
            path.to_path_buf()
        };

        let mut relative = PathBuf::new();
        for component in candidate.components() {
            match component {
                Component::Normal(segment) => relative.push(segment),
                Component::CurDir => {}
                _ => {
                    return Err(DiscoveryError::OutsideRoot {
                        path: path.to_path_buf(),
                        root,
                    });
                }
            }
        }

        if relative.as_os_str().is_empty() {
            return Err(DiscoveryError::EmptyTag {
                path: path.to_path_buf(),
            });
        }

        let unit = Self::new(&root, relative);
        if !unit.source_path.join(DESCRIPTOR_FILE).is_file() {
            return Err(DiscoveryError::NotBuildable {
                path: unit.source_path,
                descriptor: DESCRIPTOR_FILE,
            });
        }
        Ok(unit)
    }

    /// Path relative to the repository root; the unit's identity.
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// Absolute path of the unit's source directory.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Relative path segments joined by `-`.
    pub fn base_tag(&self) -> &str {
        &self.base_tag
    }

    /// Last path segment, used as the staging root's directory name.
    pub fn dir_name(&self) -> OsString {
        self.relative_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for BuildableUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let segments: Vec<_> = self
            .relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        f.write_str(&segments.join("/"))
    }
}

/// Walk `root` and lazily yield every buildable unit below it.
///
/// Children are visited in file-name order, parents before children.
pub fn discover(root: &Path, config: &DockwalkConfig) -> Result<UnitWalker, DiscoveryError> {
    let root = resolve_root(root)?;
    Ok(UnitWalker {
        root,
        excluded: config.include_paths(),
        pending: vec![PathBuf::new()],
    })
}

/// Iterator returned by [`discover`].
///
/// Unreadable directories are reported as errors; the walk continues after them.
#[derive(Debug)]
pub struct UnitWalker {
    root: PathBuf,
    excluded: Vec<PathBuf>,
    pending: Vec<PathBuf>,
}

impl UnitWalker {
    /// Hidden directories are skipped at the top level only; include
    /// directories are skipped wherever they are configured to live.
    fn admits(&self, child: &Path, at_root: bool) -> bool {
        let hidden = child
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with('.'));
        !(at_root && hidden) && !self.excluded.iter().any(|dir| dir == child)
    }
}

impl Iterator for UnitWalker {
    type Item = Result<BuildableUnit, DiscoveryError>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(relative) = self.pending.pop() {
            let dir = self.root.join(&relative);
            let entries = match read_entries(&dir) {
                Ok(entries) => entries,
                Err(source) => return Some(Err(DiscoveryError::ReadDir { path: dir, source })),
            };

            let at_root = relative.as_os_str().is_empty();
            let mut has_descriptor = false;
            let mut children = Vec::new();

            for (name, file_type) in entries {
                if file_type.is_dir() {
                    let child = relative.join(&name);
                    if self.admits(&child, at_root) {
                        children.push(child);
                    }
                } else if name == DESCRIPTOR_FILE {
                    has_descriptor = true;
                }
            }

            children.sort();
            self.pending.extend(children.into_iter().rev());

            if has_descriptor && !at_root {
                return Some(Ok(BuildableUnit::new(&self.root, relative)));
            }
        }
        None
    }
}

fn read_entries(dir: &Path) -> std::io::Result<Vec<(OsString, FileType)>> {
    std::fs::read_dir(dir)?
        .map(|entry| {
            let entry = entry?;
            Ok((entry.file_name(), entry.file_type()?))
        })
        .collect()
}

fn resolve_root(root: &Path) -> Result<PathBuf, DiscoveryError> {
    std::path::absolute(root).map_err(|e| DiscoveryError::ResolveRoot {
        path: root.to_path_buf(),
        source: e,
    })
}
