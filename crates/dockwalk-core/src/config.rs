use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// dockwalk.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockwalkConfig {
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Repository name every unit is tagged under
    #[serde(default = "default_image_name")]
    pub name: String,
    /// Only builds from this branch are pushed
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// Version the implicit `latest` alias points at
    #[serde(default = "default_latest")]
    pub latest: String,
    /// Alias name -> version it is applied to
    #[serde(default = "default_special_tags")]
    pub special_tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Shared directories merged into every staging area.
    /// They are never buildable units themselves.
    #[serde(default = "default_include_dirs")]
    pub include_dirs: Vec<String>,
    /// Fill-in file -> marker line after which its content is spliced
    #[serde(default = "default_fill_in")]
    pub fill_in: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Build output lines containing any of these are not echoed
    #[serde(default = "default_ignore_lines")]
    pub ignore_lines: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Directory receiving compressed image archives
    #[serde(default = "default_save_dir")]
    pub save_dir: String,
}

/// Per-command timeouts in seconds. `0` disables the timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_git_timeout")]
    pub git: u64,
    #[serde(default = "default_build_timeout")]
    pub build: u64,
    #[serde(default = "default_save_timeout")]
    pub save: u64,
    #[serde(default = "default_registry_timeout")]
    pub registry: u64,
}

impl TimeoutConfig {
    pub fn git(&self) -> Option<Duration> {
        seconds(self.git)
    }

    pub fn build(&self) -> Option<Duration> {
        seconds(self.build)
    }

    pub fn save(&self) -> Option<Duration> {
        seconds(self.save)
    }

    pub fn registry(&self) -> Option<Duration> {
        seconds(self.registry)
    }
}

fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            name: default_image_name(),
            default_branch: default_branch(),
            latest: default_latest(),
            special_tags: default_special_tags(),
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            include_dirs: default_include_dirs(),
            fill_in: default_fill_in(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            ignore_lines: default_ignore_lines(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            git: default_git_timeout(),
            build: default_build_timeout(),
            save: default_save_timeout(),
            registry: default_registry_timeout(),
        }
    }
}

impl DockwalkConfig {
    /// Load from dockwalk.toml at the given root, or return defaults if not found.
    ///
    /// The result is validated before it is returned.
    pub fn load(root: &Path) -> crate::Result<Self> {
        let config_path = root.join(crate::CONFIG_FILE);
        let config: Self = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path,
                source: e,
            })?
        } else {
            tracing::debug!("no {} in {}, using defaults", crate::CONFIG_FILE, root.display());
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        let name = self.image.name.trim();
        if name.is_empty() {
            return Err(invalid("image.name", "must not be empty"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(invalid("image.name", "must not contain whitespace"));
        }
        if self.image.default_branch.trim().is_empty() {
            return Err(invalid("image.default_branch", "must not be empty"));
        }
        if self.archive.save_dir.trim().is_empty() {
            return Err(invalid("archive.save_dir", "must not be empty"));
        }
        if self.staging.fill_in.values().any(|marker| marker.is_empty()) {
            return Err(invalid("staging.fill_in", "markers must not be empty"));
        }
        for dir in &self.staging.include_dirs {
            validate_include_dir(dir)?;
        }
        Ok(())
    }

    /// Alias table used for tag fan-out.
    ///
    /// Adds `latest -> image.latest` unless `special_tags` names `latest` itself.
    pub fn alias_table(&self) -> BTreeMap<String, String> {
        let mut table = self.image.special_tags.clone();
        table
            .entry("latest".to_owned())
            .or_insert_with(|| self.image.latest.clone());
        table
    }

    /// Include directories relative to the repository root, with `./`
    /// segments and trailing separators dropped.
    pub fn include_paths(&self) -> Vec<PathBuf> {
        self.staging
            .include_dirs
            .iter()
            .map(|dir| {
                Path::new(dir)
                    .components()
                    .filter(|c| matches!(c, Component::Normal(_)))
                    .collect()
            })
            .collect()
    }
}

fn invalid(field: &'static str, reason: &'static str) -> crate::Error {
    crate::Error::ConfigInvalid { field, reason }
}

fn validate_include_dir(dir: &str) -> crate::Result<()> {
    let path = Path::new(dir);
    if dir.trim().is_empty() {
        return Err(crate::Error::InvalidIncludePath {
            path: dir.to_owned(),
            reason: "must not be empty",
        });
    }
    if path.is_absolute() {
        return Err(crate::Error::InvalidIncludePath {
            path: dir.to_owned(),
            reason: "must be relative to the repository root",
        });
    }
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(crate::Error::InvalidIncludePath {
            path: dir.to_owned(),
            reason: "must not contain `..`",
        });
    }
    Ok(())
}

fn default_image_name() -> String {
    "mumblepins/circleci-dev".to_owned()
}

fn default_branch() -> String {
    "master".to_owned()
}

fn default_latest() -> String {
    "stretch".to_owned()
}

fn default_special_tags() -> BTreeMap<String, String> {
    [
        ("latest", "stretch"),
        ("ubuntu", "zesty"),
        ("ubuntu-LTS", "xenial"),
        ("debian", "stretch"),
    ]
    .into_iter()
    .map(|(alias, version)| (alias.to_owned(), version.to_owned()))
    .collect()
}

fn default_include_dirs() -> Vec<String> {
    vec!["root-fs".to_owned()]
}

fn default_fill_in() -> BTreeMap<String, String> {
    BTreeMap::from([(
        "Dockerfile.meta".to_owned(),
        "### Build-time metadata ###".to_owned(),
    )])
}

fn default_ignore_lines() -> Vec<String> {
    vec![
        "Selecting previously unselected ".to_owned(),
        "Preparing to unpack".to_owned(),
        "update-alternatives".to_owned(),
    ]
}

fn default_save_dir() -> String {
    "workspace".to_owned()
}

fn default_git_timeout() -> u64 {
    30
}

fn default_build_timeout() -> u64 {
    3600
}

fn default_save_timeout() -> u64 {
    1800
}

fn default_registry_timeout() -> u64 {
    900
}
