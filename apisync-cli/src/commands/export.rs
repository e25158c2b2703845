//! Export command implementation.

use anyhow::{Context, Result};
use apisync::{Config, Exporter, ResourceKind, SnapshotWriter, SyncProgress};
use std::path::Path;

use super::{connect, print_summary};
use crate::ServiceArgs;

/// Run the export command.
pub async fn run_export(
    config: &Config,
    source: &ServiceArgs,
    output: &Path,
    kinds: &[ResourceKind],
    no_progress: bool,
) -> Result<()> {
    let client = connect(config, source)?;
    let output = apisync::config::expand_tilde(output)?;
    let writer = SnapshotWriter::create(&output)
        .with_context(|| format!("Cannot create snapshot directory {}", output.display()))?;

    println!("Exporting {} -> {}", client.coordinates(), output.display());

    let progress = if no_progress {
        SyncProgress::hidden()
    } else {
        SyncProgress::new("Export:")
    };
    let summary = Exporter::new(&client, config.sync.clone())
        .with_kinds(kinds)
        .with_progress(progress)
        .run(&writer)
        .await?;

    print_summary("Export summary", &summary);
    println!("Snapshot: {}", output.display());
    Ok(())
}
