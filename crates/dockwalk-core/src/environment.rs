//! Version environment derived from git state.
//!
//! ```text
//! base tag ── projectA
//! branch   ── master     → version projectA          (Deploy)
//! branch   ── feature-x  → version projectA_abc1234  (DryRun)
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

const SSH_GITHUB: &str = "git@github.com";
const HTTPS_GITHUB: &str = "https://github.com";

/// Raw answers from the version-control provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitState {
    /// Short hash of HEAD
    pub commit: String,
    /// `remote.origin.url`
    pub url: String,
    /// Current branch name
    pub branch: String,
}

/// Whether the unit's images may be pushed to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployDecision {
    Deploy,
    DryRun,
}

impl DeployDecision {
    pub fn is_eligible(self) -> bool {
        matches!(self, Self::Deploy)
    }
}

/// Build metadata for one unit, injected into the build and used for tagging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEnv {
    pub git_commit: String,
    pub git_url: String,
    pub git_branch: String,
    /// ISO-8601 UTC timestamp, whole seconds, `Z` suffix
    pub build_date: String,
    pub version: String,
    pub docker_image: String,
    /// `YYYYMMDD`
    pub date: String,
    /// `{docker_image}:{version}`
    pub full_image_name: String,
    save_name: Option<String>,
}

impl BuildEnv {
    /// Derive the environment for a unit tagged `base_tag`.
    ///
    /// `now` is captured once by the caller; both date fields come from it.
    pub fn derive(
        base_tag: &str,
        docker_image: &str,
        git: &GitState,
        default_branch: &str,
        now: DateTime<Utc>,
    ) -> (Self, DeployDecision) {
        let decision = if git.branch == default_branch {
            DeployDecision::Deploy
        } else {
            DeployDecision::DryRun
        };

        let version = match decision {
            DeployDecision::Deploy => base_tag.to_owned(),
            DeployDecision::DryRun => format!("{base_tag}_{commit}", commit = git.commit),
        };

        let env = Self {
            git_commit: git.commit.clone(),
            git_url: normalize_remote_url(&git.url),
            git_branch: git.branch.clone(),
            build_date: now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            full_image_name: format!("{docker_image}:{version}"),
            version,
            docker_image: docker_image.to_owned(),
            date: now.format("%Y%m%d").to_string(),
            save_name: None,
        };

        (env, decision)
    }

    /// Archive file name, once the image has been saved.
    pub fn save_name(&self) -> Option<&str> {
        self.save_name.as_deref()
    }

    pub fn set_save_name(&mut self, name: impl Into<String>) {
        self.save_name = Some(name.into());
    }

    /// `--build-arg` pairs passed to `docker build`.
    pub fn build_args(&self) -> [(&'static str, &str); 4] {
        [
            ("BUILD_DATE", self.build_date.as_str()),
            ("VERSION", self.version.as_str()),
            ("VCS_URL", self.git_url.as_str()),
            ("VCS_REF", self.git_commit.as_str()),
        ]
    }
}

/// Rewrite an SSH-style GitHub remote to its HTTPS form.
///
/// Only the host prefix is replaced; the remainder is kept as is.
pub fn normalize_remote_url(url: &str) -> String {
    match url.strip_prefix(SSH_GITHUB) {
        Some(rest) => format!("{HTTPS_GITHUB}{rest}"),
        None => url.to_owned(),
    }
}

/// Tags applied to a built image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSet {
    /// `{image}:{version}`
    pub primary: String,
    /// `{image}:{version}-{date}`
    pub dated: String,
    /// `{image}:{version}-{alias}` for every alias targeting this version
    pub aliases: Vec<String>,
}

impl TagSet {
    pub fn derive(env: &BuildEnv, alias_table: &BTreeMap<String, String>) -> Self {
        let image = &env.docker_image;
        let version = &env.version;
        let aliases = alias_table
            .iter()
            .filter(|(_, target)| *target == version)
            .map(|(alias, _)| format!("{image}:{version}-{alias}"))
            .collect();

        Self {
            primary: format!("{image}:{version}"),
            dated: format!("{image}:{version}-{date}", date = env.date),
            aliases,
        }
    }

    /// Dated tag followed by alias tags.
    pub fn extra_tags(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.dated.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssh_remote_becomes_https() {
        assert_eq!(
            normalize_remote_url("git@github.com:org/repo.git"),
            "https://github.com:org/repo.git"
        );
    }

    #[test]
    fn https_remote_is_unchanged() {
        assert_eq!(
            normalize_remote_url("https://gitlab.com/org/repo.git"),
            "https://gitlab.com/org/repo.git"
        );
    }

    #[test]
    fn save_name_is_unset_until_archived() {
        let git = GitState {
            commit: "abc1234".to_owned(),
            url: "u".to_owned(),
            branch: "master".to_owned(),
        };
        let (mut env, _) = BuildEnv::derive("a", "img", &git, "master", Utc::now());
        assert!(env.save_name().is_none());
        env.set_save_name("img-a.tar.lz4");
        assert_eq!(env.save_name(), Some("img-a.tar.lz4"));
    }
}
