//! Import command implementation.

use anyhow::{Context, Result};
use apisync::{read_mapping, Config, Importer, ResourceKind, SnapshotReader, SyncProgress};
use std::path::Path;

use super::{connect, print_summary};
use crate::ServiceArgs;

/// Run the import command.
pub async fn run_import(
    config: &Config,
    target: &ServiceArgs,
    input: &Path,
    kinds: &[ResourceKind],
    links: Option<&Path>,
    no_progress: bool,
) -> Result<()> {
    let input = apisync::config::expand_tilde(input)?;
    let reader = SnapshotReader::open(&input)?;
    let mapping = links
        .map(|path| {
            read_mapping(path).with_context(|| format!("Cannot use link mapping {}", path.display()))
        })
        .transpose()?;
    let client = connect(config, target)?;

    println!("Importing {} -> {}", input.display(), client.coordinates());

    let progress = if no_progress {
        SyncProgress::hidden()
    } else {
        SyncProgress::new("Import:")
    };
    let mut importer = Importer::new(&client, &config.sync)
        .with_kinds(kinds)
        .with_progress(progress);
    if let Some(mapping) = mapping {
        importer = importer.with_links(mapping);
    }

    let summary = importer.run(&reader).await?;
    print_summary("Import summary", &summary);
    Ok(())
}
