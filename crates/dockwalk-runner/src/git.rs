use std::path::Path;
use std::time::Duration;

use dockwalk_core::GitState;

use crate::executor::{CommandExecutor, Invocation, RealExecutor};
use crate::process::ProcessError;

/// Read-only git metadata provider, parameterized over the executor for testability.
pub struct GitClient<E: CommandExecutor = RealExecutor> {
    executor: E,
    timeout: Option<Duration>,
}

impl GitClient<RealExecutor> {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            executor: RealExecutor,
            timeout,
        }
    }
}

impl<E: CommandExecutor> GitClient<E> {
    pub fn with_executor(executor: E, timeout: Option<Duration>) -> Self {
        Self { executor, timeout }
    }

    /// Query commit, remote URL and branch of the work tree containing `dir`.
    pub async fn query(&self, dir: &Path) -> Result<GitState, VersionQueryError> {
        let commit = self
            .read(dir, &["rev-parse", "--short", "HEAD"], "commit")
            .await?;
        let url = self
            .read(dir, &["config", "--get", "remote.origin.url"], "remote url")
            .await?;
        let branch = self
            .read(dir, &["rev-parse", "--abbrev-ref", "HEAD"], "branch")
            .await?;

        tracing::debug!(%commit, %url, %branch, "git state of {}", dir.display());
        Ok(GitState {
            commit,
            url,
            branch,
        })
    }

    async fn read(
        &self,
        dir: &Path,
        args: &[&str],
        what: &'static str,
    ) -> Result<String, VersionQueryError> {
        let invocation = Invocation::new("git")
            .args(args.iter().copied())
            .current_dir(dir)
            .timeout(self.timeout);

        let output = self
            .executor
            .exec(&invocation)
            .await
            .map_err(|e| VersionQueryError::Query { what, source: e })?;

        let value = output.trim();
        if value.is_empty() {
            return Err(VersionQueryError::Empty { what });
        }
        Ok(value.to_owned())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VersionQueryError {
    #[error("failed to read git {what}")]
    Query {
        what: &'static str,
        source: ProcessError,
    },

    #[error("git returned an empty {what}")]
    Empty { what: &'static str },
}
