use anyhow::Context;
use dockwalk_core::{BuildableUnit, DiscoveryError, DockwalkConfig, discover};
use std::path::Path;

/// Write every buildable unit's path under `root` to `output`, one per line.
pub fn list(root: &Path, output: &Path) -> anyhow::Result<()> {
    let config = DockwalkConfig::load(root)?;
    let paths = unit_paths(discover(root, &config)?);

    let output = root.join(output);
    let content: String = paths.iter().map(|p| format!("{p}\n")).collect();
    std::fs::write(&output, content)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("Wrote {} unit(s) to {}", paths.len(), output.display());
    Ok(())
}

/// Relative paths of the discovered units. Discovery errors are logged and skipped.
fn unit_paths<I>(units: I) -> Vec<String>
where
    I: IntoIterator<Item = Result<BuildableUnit, DiscoveryError>>,
{
    units
        .into_iter()
        .filter_map(|item| match item {
            Ok(unit) => Some(unit.to_string()),
            Err(e) => {
                tracing::warn!("skipping: {e}");
                None
            }
        })
        .collect()
}
