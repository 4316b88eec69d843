use dockwalk_core::{DeployDecision, TagSet};
use secrecy::SecretString;

use crate::docker::DockerClient;
use crate::executor::CommandExecutor;
use crate::process::ProcessError;

/// Registry login passed through from `DOCKER_USER` / `DOCKER_PASS`.
#[derive(Debug)]
pub struct RegistryCredentials {
    pub user: String,
    pub password: SecretString,
}

impl RegistryCredentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: SecretString::from(password.into()),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Tags applied locally
    pub tagged: Vec<String>,
    /// References actually pushed (empty on a dry run)
    pub pushed: Vec<String>,
    pub dry_run: bool,
}

/// Tag the built image and push every tag.
///
/// Tags are always applied. Pushing needs [`DeployDecision::Deploy`];
/// otherwise every push is only logged. Pushes are attempted one after
/// another even when some fail, and the failures are reported together.
pub async fn publish<E: CommandExecutor>(
    docker: &DockerClient<E>,
    tags: &TagSet,
    decision: DeployDecision,
    credentials: Option<&RegistryCredentials>,
) -> Result<PublishReport, PublishError> {
    let mut report = PublishReport {
        dry_run: !decision.is_eligible(),
        ..Default::default()
    };

    for tag in tags.extra_tags() {
        docker
            .tag_image(&tags.primary, tag)
            .await
            .map_err(|e| PublishError::Tag {
                tag: tag.to_owned(),
                source: e,
            })?;
        report.tagged.push(tag.to_owned());
    }

    if !report.dry_run {
        let credentials = credentials.ok_or(PublishError::MissingCredentials)?;
        println!("Logging in...");
        docker
            .login(credentials)
            .await
            .map_err(|e| PublishError::Login {
                user: credentials.user.clone(),
                source: e,
            })?;
    }

    let mut failed = Vec::new();
    for reference in std::iter::once(tags.primary.as_str()).chain(tags.extra_tags()) {
        match docker.push_image(reference, report.dry_run).await {
            Ok(()) if report.dry_run => {}
            Ok(()) => report.pushed.push(reference.to_owned()),
            Err(e) => {
                tracing::warn!("push of {reference} failed: {e}");
                failed.push(reference.to_owned());
            }
        }
    }

    if failed.is_empty() {
        Ok(report)
    } else {
        Err(PublishError::Push { failed })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to tag image as {tag}")]
    Tag { tag: String, source: ProcessError },

    #[error("registry credentials missing, set DOCKER_USER and DOCKER_PASS")]
    MissingCredentials,

    #[error("docker login as {user} failed")]
    Login { user: String, source: ProcessError },

    #[error("failed to push {}", .failed.join(", "))]
    Push { failed: Vec<String> },
}
