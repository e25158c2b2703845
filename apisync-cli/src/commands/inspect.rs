use anyhow::Result;
use apisync::snapshot::SnapshotEntry;
use apisync::SnapshotReader;
use std::path::Path;

/// List the resources a snapshot holds and flag entries import would skip.
pub fn run_inspect(input: &Path) -> Result<()> {
    let reader = SnapshotReader::open(input)?;

    println!();
    println!("================================================================================");
    println!("Snapshot: {}", reader.root().display());
    println!("================================================================================");

    match reader.manifest()? {
        Some(manifest) => {
            println!("  Source:        {}", manifest.source);
            println!("  Exported at:   {}", manifest.exported_at);
            println!("  Tool version:  {}", manifest.tool_version);
            println!("  Format:        {}", manifest.format_version);
        }
        None => println!("  (no manifest.json)"),
    }
    println!();

    for kind in reader.kinds() {
        let entries = reader.read_kind(kind)?;
        println!("{} ({})", kind.dir_name(), entries.len());
        println!("--------------------------------------------------------------------------------");
        for entry in &entries {
            match entry {
                SnapshotEntry::Resource(resource) => {
                    let files: Vec<String> = resource
                        .artifacts
                        .iter()
                        .map(|a| {
                            if a.matches_declared() {
                                a.kind.file_name().to_string()
                            } else {
                                format!("{} ({})", a.kind.file_name(), a.content_kind())
                            }
                        })
                        .collect();
                    println!(
                        "  {:<32} {:<28} {}",
                        resource.descriptor.id,
                        resource.descriptor.display_path,
                        files.join(", ")
                    );
                }
                SnapshotEntry::Skippable { id, reason, .. } => {
                    println!("  {:<32} ⚠ skipped on import: {}", id, reason);
                }
            }
        }
        println!();
    }

    Ok(())
}
