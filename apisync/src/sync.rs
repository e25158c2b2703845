//! Export and import runs.
//!
//! Kinds are processed one after another in dependency order; resources of a
//! kind run with bounded parallelism, each touching only its own directory.
//! Links are applied last, after every kind has been imported.

use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::adapters::{adapter_for, ExportContext};
use crate::client::ManagementClient;
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::isolation::{Outcome, Phase, ResourceReport, RunSummary, SummaryKey};
use crate::links::{LinkMapping, LinkResolver};
use crate::model::{sanitize_id, ResourceKind};
use crate::pager::PagedCollectionReader;
use crate::progress::SyncProgress;
use crate::snapshot::{SnapshotEntry, SnapshotManifest, SnapshotReader, SnapshotWriter, FORMAT_VERSION};

/// Kinds to process, deduplicated and in dependency order. Empty means all.
pub fn select_kinds(filter: &[ResourceKind]) -> Vec<ResourceKind> {
    if filter.is_empty() {
        return ResourceKind::ALL.to_vec();
    }
    let mut kinds = filter.to_vec();
    kinds.sort();
    kinds.dedup();
    kinds
}

/// Reads a live service into a snapshot.
pub struct Exporter<'a> {
    client: &'a ManagementClient,
    options: SyncConfig,
    kinds: Vec<ResourceKind>,
    progress: SyncProgress,
}

impl<'a> Exporter<'a> {
    pub fn new(client: &'a ManagementClient, options: SyncConfig) -> Self {
        Self {
            client,
            options,
            kinds: ResourceKind::ALL.to_vec(),
            progress: SyncProgress::hidden(),
        }
    }

    pub fn with_kinds(mut self, kinds: &[ResourceKind]) -> Self {
        self.kinds = select_kinds(kinds);
        self
    }

    pub fn with_progress(mut self, progress: SyncProgress) -> Self {
        self.progress = progress;
        self
    }

    pub async fn run(&self, writer: &SnapshotWriter) -> Result<RunSummary> {
        let ctx = ExportContext {
            client: self.client,
            writer,
            options: &self.options,
        };
        let mut summary = RunSummary::new();
        let mut manifest = SnapshotManifest::new(self.client.coordinates().clone(), self.kinds.clone());

        info!(
            source = %self.client.coordinates(),
            output = %writer.root().display(),
            "Starting export"
        );

        for &kind in &self.kinds {
            self.progress.set_stage(kind.dir_name());
            let ids = self.list_ids(kind, &mut summary).await?;
            info!(%kind, count = ids.len(), "Exporting");

            let adapter = adapter_for(kind);
            let reports: Vec<ResourceReport> = stream::iter(ids.iter())
                .map(|id| adapter.export(&ctx, id))
                .buffer_unordered(self.options.concurrency.max(1))
                .collect()
                .await;

            let mut written = 0u64;
            for report in &reports {
                let outcome = report.overall();
                if report.outcome_of(Phase::Entity) == Some(&Outcome::Applied) {
                    written += 1;
                }
                self.progress.record(&outcome);
                summary.record(report);
            }
            manifest.counts.insert(kind.dir_name().to_string(), written);
        }

        writer.write_manifest(&manifest)?;
        self.progress.finish();
        Ok(summary)
    }

    /// Ids of every resource of a kind. Items without a name, duplicates and
    /// ids that would share a directory are reported and dropped.
    async fn list_ids(&self, kind: ResourceKind, summary: &mut RunSummary) -> Result<Vec<String>> {
        let url = self.client.collection_url(kind)?;
        let reader = PagedCollectionReader::new(self.client, self.options.max_pages);
        let (items, partial) = reader.collect(url).await;
        if let Some(e) = partial {
            summary.warn(format!("{} list incomplete: {}", kind, e));
        }

        let mut dirs = HashSet::new();
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let Some(id) = item.get("name").and_then(Value::as_str) else {
                summary.warn(format!("{} list item without a name skipped", kind));
                continue;
            };
            if !dirs.insert(sanitize_id(id)) {
                if ids.iter().any(|existing| existing == id) {
                    continue;
                }
                summary.warn(format!(
                    "{} '{}' maps to an already used directory '{}', skipped",
                    kind,
                    id,
                    sanitize_id(id)
                ));
                continue;
            }
            ids.push(id.to_string());
        }
        Ok(ids)
    }
}

/// Replays a snapshot against a target service.
pub struct Importer<'a> {
    client: &'a ManagementClient,
    concurrency: usize,
    kinds: Vec<ResourceKind>,
    links: Option<LinkMapping>,
    progress: SyncProgress,
}

impl<'a> Importer<'a> {
    pub fn new(client: &'a ManagementClient, options: &SyncConfig) -> Self {
        Self {
            client,
            concurrency: options.concurrency.max(1),
            kinds: ResourceKind::ALL.to_vec(),
            links: None,
            progress: SyncProgress::hidden(),
        }
    }

    pub fn with_kinds(mut self, kinds: &[ResourceKind]) -> Self {
        self.kinds = select_kinds(kinds);
        self
    }

    /// Links to apply once every kind has been imported.
    pub fn with_links(mut self, mapping: LinkMapping) -> Self {
        self.links = Some(mapping);
        self
    }

    pub fn with_progress(mut self, progress: SyncProgress) -> Self {
        self.progress = progress;
        self
    }

    pub async fn run(&self, reader: &SnapshotReader) -> Result<RunSummary> {
        match reader.manifest() {
            Ok(Some(manifest)) => {
                info!(
                    source = %manifest.source,
                    exported_at = %manifest.exported_at,
                    "Importing snapshot"
                );
                if manifest.format_version != FORMAT_VERSION {
                    warn!(
                        found = %manifest.format_version,
                        expected = FORMAT_VERSION,
                        "Snapshot format version differs"
                    );
                }
            }
            Ok(None) => info!(root = %reader.root().display(), "Importing snapshot without manifest"),
            Err(e) => warn!(error = %e, "Unreadable snapshot manifest, continuing"),
        }

        let entries = reader.read_all(&self.kinds)?;
        if !entries.iter().any(|e| matches!(e, SnapshotEntry::Resource(_))) {
            return Err(Error::NoResources(reader.root().to_path_buf()));
        }

        let mut summary = RunSummary::new();
        for &kind in &self.kinds {
            self.progress.set_stage(kind.dir_name());
            let adapter = adapter_for(kind);

            let mut resources = Vec::new();
            for entry in entries.iter().filter(|e| e.kind() == kind) {
                match entry {
                    SnapshotEntry::Resource(resource) => resources.push(resource),
                    SnapshotEntry::Skippable { id, reason, .. } => {
                        warn!(%kind, id = %id, reason = %reason, "Skipping snapshot entry");
                        let mut report = ResourceReport::new(SummaryKey::Kind(kind), id.clone());
                        report.push(Phase::Read, Outcome::Skipped(reason.clone()));
                        self.progress.record(&report.overall());
                        summary.record(&report);
                    }
                }
            }
            if resources.is_empty() {
                continue;
            }
            info!(%kind, count = resources.len(), "Importing");

            let reports: Vec<ResourceReport> = stream::iter(resources)
                .map(|resource| adapter.import(self.client, resource))
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
            for report in &reports {
                self.progress.record(&report.overall());
                summary.record(report);
            }
        }

        if let Some(mapping) = &self.links {
            self.progress.set_stage("links");
            for problem in &mapping.invalid {
                summary.warn(format!("link mapping {}", problem));
            }
            let links = LinkResolver::new(self.client).apply(&mapping.edges).await;
            summary.merge(links);
        }

        self.progress.finish();
        Ok(summary)
    }
}
