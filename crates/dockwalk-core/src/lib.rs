//! Core types and configuration for dockwalk.
//!
//! This crate defines the `dockwalk.toml` schema ([`DockwalkConfig`]),
//! buildable unit discovery ([`discover`]), the per-unit version
//! environment ([`BuildEnv`]) and shared error types.

pub mod config;
pub mod environment;
pub mod error;
pub mod unit;

pub use config::{
    ArchiveConfig, BuildConfig, DockwalkConfig, ImageConfig, StagingConfig, TimeoutConfig,
};
pub use environment::{BuildEnv, DeployDecision, GitState, TagSet};
pub use error::{DiscoveryError, Error, Result};
pub use unit::{BuildableUnit, UnitWalker, discover};

/// File name of the build descriptor every buildable unit must contain.
pub const DESCRIPTOR_FILE: &str = "Dockerfile";

/// Name of the configuration file looked up at the repository root.
pub const CONFIG_FILE: &str = "dockwalk.toml";
