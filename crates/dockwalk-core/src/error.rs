use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config value for `{field}`: {reason}")]
    ConfigInvalid {
        field: &'static str,
        reason: &'static str,
    },

    #[error("invalid include path {path:?}: {reason}")]
    InvalidIncludePath { path: String, reason: &'static str },
}

/// Failure to turn a directory into a buildable unit.
///
/// During a tree walk these are reported and skipped; in single-unit mode
/// they fail the unit.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("failed to read directory {path}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not a buildable unit: no {descriptor} found")]
    NotBuildable {
        path: PathBuf,
        descriptor: &'static str,
    },

    #[error("{path} does not lie inside the repository root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("{path} names the repository root, which has no image tag")]
    EmptyTag { path: PathBuf },

    #[error("failed to resolve repository root {path}")]
    ResolveRoot {
        path: PathBuf,
        source: std::io::Error,
    },
}
