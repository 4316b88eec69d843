use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use dockwalk_core::{BuildEnv, TimeoutConfig};
use secrecy::ExposeSecret;

use crate::archive::archive_file_name;
use crate::executor::{CommandExecutor, Invocation, OutputFilter, RealExecutor};
use crate::process::ProcessError;
use crate::publish::RegistryCredentials;

const DOCKER: &str = "docker";
const COMPRESSOR: &str = "lz4";

/// docker CLI operations, parameterized over the executor for testability.
pub struct DockerClient<E: CommandExecutor = RealExecutor> {
    executor: E,
    timeouts: TimeoutConfig,
}

impl DockerClient<RealExecutor> {
    pub fn new(timeouts: TimeoutConfig) -> Self {
        Self {
            executor: RealExecutor,
            timeouts,
        }
    }
}

impl<E: CommandExecutor> DockerClient<E> {
    pub fn with_executor(executor: E, timeouts: TimeoutConfig) -> Self {
        Self { executor, timeouts }
    }

    // ── Build ──

    /// `docker build` the staging root, tagging the result `full_image_name`.
    pub async fn build_image(
        &self,
        context: &Path,
        env: &BuildEnv,
        filter: &OutputFilter,
    ) -> Result<(), BuildError> {
        let context_str = context
            .to_str()
            .ok_or_else(|| BuildError::InvalidPath(context.to_path_buf()))?;

        let mut invocation = Invocation::new(DOCKER).arg("build");
        for (name, value) in env.build_args() {
            invocation = invocation
                .arg("--build-arg")
                .arg(format!("{name}={value}"));
        }
        let invocation = invocation
            .args(["-t", env.full_image_name.as_str(), context_str])
            .timeout(self.timeouts.build());

        println!("Building {}", env.full_image_name);
        self.executor
            .exec_filtered(&invocation, filter)
            .await
            .map_err(|e| BuildError::Build {
                image: env.full_image_name.clone(),
                source: e,
            })
    }

    // ── Save ──

    /// Export the image as `<save_dir>/<archive name>` through the compressor.
    ///
    /// A failed export removes the partial archive; the image itself is kept.
    pub async fn save_image(
        &self,
        env: &BuildEnv,
        save_dir: &Path,
    ) -> Result<ArchiveReport, ArchiveError> {
        std::fs::create_dir_all(save_dir).map_err(|e| ArchiveError::CreateDir {
            path: save_dir.to_path_buf(),
            source: e,
        })?;

        let file_name = archive_file_name(&env.full_image_name);
        let path = save_dir.join(&file_name);

        let producer = Invocation::new(DOCKER)
            .args(["save", env.full_image_name.as_str()])
            .timeout(self.timeouts.save());
        let consumer = Invocation::new(COMPRESSOR).arg("-zc");

        println!("Saving {}", env.full_image_name);
        let started = Instant::now();
        if let Err(e) = self
            .executor
            .exec_pipeline(&producer, &consumer, &path)
            .await
        {
            if path.exists() {
                if let Err(rm) = std::fs::remove_file(&path) {
                    tracing::warn!("could not remove partial archive {}: {rm}", path.display());
                }
            }
            return Err(ArchiveError::Export {
                image: env.full_image_name.clone(),
                source: e,
            });
        }
        let elapsed = started.elapsed();

        println!("Elapsed Time: {:.3}s", elapsed.as_secs_f64());
        tracing::info!(archive = %path.display(), "saved {}", env.full_image_name);

        Ok(ArchiveReport {
            file_name,
            path,
            elapsed,
        })
    }

    // ── Registry ──

    pub async fn tag_image(&self, source: &str, target: &str) -> Result<(), ProcessError> {
        let invocation = Invocation::new(DOCKER)
            .args(["tag", source, target])
            .timeout(self.timeouts.registry());
        println!("Running: {invocation}");
        self.executor.exec(&invocation).await.map(|_| ())
    }

    /// Push `reference`, or only log the command when `dry_run` is set.
    pub async fn push_image(&self, reference: &str, dry_run: bool) -> Result<(), ProcessError> {
        let invocation = Invocation::new(DOCKER)
            .args(["push", reference])
            .timeout(self.timeouts.registry());

        if dry_run {
            println!("Dry run: {invocation}");
            return Ok(());
        }

        println!("Running: {invocation}");
        self.executor.exec(&invocation).await.map(|_| ())
    }

    /// `docker login`, feeding the password on stdin so it never shows up in
    /// the process list.
    pub async fn login(&self, credentials: &RegistryCredentials) -> Result<(), ProcessError> {
        let invocation = Invocation::new(DOCKER)
            .args(["login", "-u", credentials.user.as_str(), "--password-stdin"])
            .timeout(self.timeouts.registry());

        let output = self
            .executor
            .exec_with_stdin(&invocation, credentials.password.expose_secret().as_bytes())
            .await?;
        let output = output.trim();
        if !output.is_empty() {
            println!("{output}");
        }
        Ok(())
    }
}

/// Result of a successful [`DockerClient::save_image`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    pub file_name: String,
    pub path: PathBuf,
    pub elapsed: Duration,
}

// ── Error types ──

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("build context path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),

    #[error("docker build of {image} failed")]
    Build {
        image: String,
        source: ProcessError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("failed to create save directory {path}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to export {image}")]
    Export {
        image: String,
        source: ProcessError,
    },
}
