//! Build-context staging for dockwalk.
//!
//! # Staging pipeline
//!
//! ```text
//! dockwalk <unit>
//!   1. Copy      ── <unit>/            → $TMP/dockwalk-XXXX/<unit name>/
//!   2. Includes  ── root-fs/           → <staging root>/root-fs/
//!   3. Fill-in   ── Dockerfile.meta    → spliced after "### Build-time metadata ###"
//!   4. Prune     ── empty dirs and Dockerfile-only dirs removed until stable
//! ```
//!
//! The unit's source tree is only ever read. Every write happens inside the
//! temporary directory, which is removed when the [`StagingArea`] is cleaned
//! up or dropped.

pub mod prune;
pub mod splice;
pub mod staging;

pub use splice::splice_after_marker;
pub use staging::{StagingArea, StagingAreaBuilder, StagingError};
