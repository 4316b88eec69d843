use dockwalk_core::{BuildableUnit, DiscoveryError, DockwalkConfig, discover};
use dockwalk_runner::RegistryCredentials;
use std::path::Path;

use super::interrupt::Interrupt;
use super::pipeline::Pipeline;

/// Build, save, and publish `unit_path`, or every unit under `root` when
/// no path is given.
///
/// A failing unit is reported and the run moves on to the next one. The
/// command fails if any unit did.
pub async fn build(
    root: &Path,
    unit_path: Option<&Path>,
    credentials: Option<RegistryCredentials>,
) -> anyhow::Result<()> {
    let config = DockwalkConfig::load(root)?;

    let units: Box<dyn Iterator<Item = Result<BuildableUnit, DiscoveryError>>> = match unit_path {
        Some(path) => Box::new(std::iter::once(Ok(BuildableUnit::from_path(root, path)?))),
        None => Box::new(discover(root, &config)?),
    };

    if credentials.is_none() {
        tracing::debug!("no registry credentials; pushes from the default branch will fail");
    }
    let pipeline = Pipeline::new(root, &config, credentials);

    let mut interrupt = Interrupt::install()
        .map_err(|e| anyhow::anyhow!("failed to listen for Ctrl-C: {e}"))?;
    let mut succeeded = 0usize;
    let mut failed = Vec::new();

    for item in units {
        let unit = match item {
            Ok(unit) => unit,
            Err(e) => {
                tracing::warn!("skipping: {e}");
                continue;
            }
        };

        println!("Working Path {unit}");
        let result = tokio::select! {
            biased;
            signal = interrupt.recv() => {
                signal.map_err(|e| anyhow::anyhow!("failed to listen for Ctrl-C: {e}"))?;
                anyhow::bail!("interrupted while processing {unit}; remaining units skipped");
            }
            result = pipeline.run_unit(&unit) => result,
        };

        match result {
            Ok(outcome) => {
                let pushed = if outcome.decision.is_eligible() {
                    format!("{} tag(s) pushed", outcome.publish.pushed.len())
                } else {
                    "dry run".to_owned()
                };
                println!(
                    "Finished {unit}: {} saved to {} ({pushed})",
                    outcome.env.full_image_name,
                    outcome.archive.path.display(),
                );
                succeeded += 1;
            }
            Err(e) => {
                let step = e.step();
                eprintln!("Unit {unit} failed at {step}: {:#}", anyhow::Error::from(e));
                failed.push(unit.to_string());
            }
        }
    }

    if succeeded == 0 && failed.is_empty() {
        println!("No buildable units found under {}", root.display());
        return Ok(());
    }

    println!("{succeeded} unit(s) succeeded, {} failed", failed.len());
    if !failed.is_empty() {
        anyhow::bail!("failed units: {}", failed.join(", "));
    }
    Ok(())
}
