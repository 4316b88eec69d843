use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use dockwalk_build::{StagingArea, StagingAreaBuilder, StagingError};
use dockwalk_core::{BuildEnv, BuildableUnit, DeployDecision, DockwalkConfig, TagSet};
use dockwalk_runner::{
    ArchiveError, ArchiveReport, BuildError, CommandExecutor, DockerClient, GitClient,
    OutputFilter, PublishError, PublishReport, RealExecutor, RegistryCredentials,
    VersionQueryError, publish,
};

/// Result of a unit that made it through every step.
#[derive(Debug)]
pub(crate) struct UnitOutcome {
    pub env: BuildEnv,
    pub decision: DeployDecision,
    pub archive: ArchiveReport,
    pub publish: PublishReport,
}

/// Runs one unit at a time: stage → environment → build → archive → publish.
///
/// Every piece of per-repository state (config, clients, output filter,
/// alias table) is prepared once and shared by all units.
pub(crate) struct Pipeline<'a, G: CommandExecutor = RealExecutor, D: CommandExecutor = RealExecutor>
{
    root: &'a Path,
    config: &'a DockwalkConfig,
    git: GitClient<G>,
    docker: DockerClient<D>,
    filter: OutputFilter,
    aliases: BTreeMap<String, String>,
    save_dir: PathBuf,
    credentials: Option<RegistryCredentials>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        root: &'a Path,
        config: &'a DockwalkConfig,
        credentials: Option<RegistryCredentials>,
    ) -> Self {
        Self::with_clients(
            root,
            config,
            GitClient::new(config.timeouts.git()),
            DockerClient::new(config.timeouts.clone()),
            credentials,
        )
    }
}

impl<'a, G: CommandExecutor, D: CommandExecutor> Pipeline<'a, G, D> {
    pub fn with_clients(
        root: &'a Path,
        config: &'a DockwalkConfig,
        git: GitClient<G>,
        docker: DockerClient<D>,
        credentials: Option<RegistryCredentials>,
    ) -> Self {
        Self {
            root,
            config,
            git,
            docker,
            filter: OutputFilter::new(config.build.ignore_lines.iter().cloned()),
            aliases: config.alias_table(),
            save_dir: root.join(&config.archive.save_dir),
            credentials,
        }
    }

    /// Process `unit` end to end. The staging area is removed whatever the
    /// outcome; if this future is dropped mid-way, its drop removes it.
    pub async fn run_unit(&self, unit: &BuildableUnit) -> Result<UnitOutcome, UnitError> {
        let staging = StagingAreaBuilder::new(self.root, self.config).stage(unit)?;
        tracing::debug!("staged {unit} at {}", staging.root().display());

        let result = self.run_staged(unit, &staging).await;

        if let Err(e) = staging.cleanup() {
            tracing::warn!("{e}");
        }
        result
    }

    async fn run_staged(
        &self,
        unit: &BuildableUnit,
        staging: &StagingArea,
    ) -> Result<UnitOutcome, UnitError> {
        let git = self.git.query(unit.source_path()).await?;
        let (mut env, decision) = BuildEnv::derive(
            unit.base_tag(),
            &self.config.image.name,
            &git,
            &self.config.image.default_branch,
            Utc::now(),
        );
        tracing::debug!(?env, ?decision, "derived environment for {unit}");

        self.docker
            .build_image(staging.root(), &env, &self.filter)
            .await?;

        let archive = self.docker.save_image(&env, &self.save_dir).await?;
        env.set_save_name(archive.file_name.as_str());

        let tags = TagSet::derive(&env, &self.aliases);
        let publish = publish(&self.docker, &tags, decision, self.credentials.as_ref()).await?;

        Ok(UnitOutcome {
            env,
            decision,
            archive,
            publish,
        })
    }
}

/// Why a unit failed, tagged with the step it failed in.
#[derive(Debug, thiserror::Error)]
pub(crate) enum UnitError {
    #[error("staging failed")]
    Stage(#[from] StagingError),

    #[error("could not derive the build environment")]
    Environment(#[from] VersionQueryError),

    #[error("build failed")]
    Build(#[from] BuildError),

    #[error("archive failed")]
    Archive(#[from] ArchiveError),

    #[error("publish failed")]
    Publish(#[from] PublishError),
}

impl UnitError {
    pub fn step(&self) -> &'static str {
        match self {
            Self::Stage(_) => "stage",
            Self::Environment(_) => "environment",
            Self::Build(_) => "build",
            Self::Archive(_) => "archive",
            Self::Publish(_) => "publish",
        }
    }
}
