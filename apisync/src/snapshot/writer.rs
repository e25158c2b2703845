use std::fs;
use std::path::{Path, PathBuf};

use super::{SnapshotManifest, MANIFEST_FILE};
use crate::error::Result;
use crate::model::{sanitize_id, Artifact, ArtifactKind, ResourceDescriptor, ResourceKind};

/// Persists exported resources under a snapshot root.
///
/// Single writer per snapshot; concurrent callers must write disjoint
/// resource directories.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    root: PathBuf,
}

impl SnapshotWriter {
    pub fn create(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resource_dir(&self, kind: ResourceKind, id: &str) -> PathBuf {
        self.root.join(kind.dir_name()).join(sanitize_id(id))
    }

    /// Write the canonical entity file. The entity keeps its `name` so the
    /// original id survives sanitization.
    pub fn write_entity(&self, descriptor: &ResourceDescriptor) -> Result<PathBuf> {
        let dir = self.resource_dir(descriptor.kind, &descriptor.id);
        fs::create_dir_all(&dir)?;

        let mut entity = descriptor.properties.clone();
        if let Some(obj) = entity.as_object_mut() {
            obj.entry("name")
                .or_insert_with(|| serde_json::Value::String(descriptor.id.clone()));
        }

        let path = dir.join(descriptor.kind.entity_file());
        let bytes = serde_json::to_vec_pretty(&entity)?;
        write_atomic(&path, &bytes)?;
        Ok(path)
    }

    pub fn write_artifact(
        &self,
        kind: ResourceKind,
        id: &str,
        artifact: &Artifact,
    ) -> Result<PathBuf> {
        let dir = self.resource_dir(kind, id);
        fs::create_dir_all(&dir)?;
        let path = dir.join(artifact.kind.file_name());
        write_atomic(&path, &artifact.bytes)?;
        Ok(path)
    }

    /// Delete an artifact the source no longer has. Returns whether a file was removed.
    pub fn remove_artifact(
        &self,
        kind: ResourceKind,
        id: &str,
        artifact: ArtifactKind,
    ) -> Result<bool> {
        let path = self.resource_dir(kind, id).join(artifact.file_name());
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_manifest(&self, manifest: &SnapshotManifest) -> Result<PathBuf> {
        let path = self.root.join(MANIFEST_FILE);
        write_atomic(&path, &serde_json::to_vec_pretty(manifest)?)?;
        Ok(path)
    }
}

/// Write through a sibling temp file so a file is either old or new, never torn.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
