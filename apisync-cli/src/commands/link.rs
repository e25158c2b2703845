use anyhow::{Context, Result};
use apisync::{read_mapping, Config, LinkResolver};
use std::path::Path;

use super::{connect, print_summary};
use crate::ServiceArgs;

/// Apply a link mapping without importing anything else.
pub async fn run_link(config: &Config, target: &ServiceArgs, mapping: &Path) -> Result<()> {
    let mapping = read_mapping(mapping)
        .with_context(|| format!("Cannot use link mapping {}", mapping.display()))?;
    let client = connect(config, target)?;

    println!(
        "Linking {} edge(s) on {}",
        mapping.edges.len(),
        client.coordinates()
    );

    let mut summary = apisync::RunSummary::new();
    for problem in &mapping.invalid {
        summary.warn(format!("link mapping {}", problem));
    }
    summary.merge(LinkResolver::new(&client).apply(&mapping.edges).await);

    print_summary("Link summary", &summary);
    Ok(())
}
