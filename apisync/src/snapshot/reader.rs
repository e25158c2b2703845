use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{SnapshotManifest, MANIFEST_FILE};
use crate::error::{Error, Result};
use crate::model::{Artifact, ArtifactKind, ResourceDescriptor, ResourceKind};

/// A resource directory reconstructed for replay.
#[derive(Debug, Clone)]
pub struct SnapshotResource {
    pub descriptor: ResourceDescriptor,
    pub artifacts: Vec<Artifact>,
    pub dir: PathBuf,
    /// False when the id came from the directory name
    pub has_entity: bool,
}

impl SnapshotResource {
    pub fn artifact(&self, kind: ArtifactKind) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }
}

/// Outcome of reading one resource directory.
#[derive(Debug, Clone)]
pub enum SnapshotEntry {
    Resource(SnapshotResource),
    /// Directory that cannot be replayed; reported, never fatal.
    Skippable {
        kind: ResourceKind,
        id: String,
        reason: String,
    },
}

impl SnapshotEntry {
    pub fn kind(&self) -> ResourceKind {
        match self {
            SnapshotEntry::Resource(r) => r.descriptor.kind,
            SnapshotEntry::Skippable { kind, .. } => *kind,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            SnapshotEntry::Resource(r) => &r.descriptor.id,
            SnapshotEntry::Skippable { id, .. } => id,
        }
    }
}

/// Read-only view of a snapshot written by [`super::SnapshotWriter`].
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    root: PathBuf,
}

impl SnapshotReader {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(Error::InputNotFound(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> Result<Option<SnapshotManifest>> {
        let path = self.root.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&fs::read(path)?)?))
    }

    /// Kinds that have a subtree in this snapshot, in dependency order.
    pub fn kinds(&self) -> Vec<ResourceKind> {
        ResourceKind::ALL
            .into_iter()
            .filter(|k| self.root.join(k.dir_name()).is_dir())
            .collect()
    }

    /// Every resource directory of one kind, sorted by directory name.
    pub fn read_kind(&self, kind: ResourceKind) -> Result<Vec<SnapshotEntry>> {
        let kind_dir = self.root.join(kind.dir_name());
        if !kind_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut dirs: Vec<PathBuf> = fs::read_dir(&kind_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        Ok(dirs.iter().map(|dir| read_resource(kind, dir)).collect())
    }

    /// Read the given kinds (all kinds when `filter` is empty).
    pub fn read_all(&self, filter: &[ResourceKind]) -> Result<Vec<SnapshotEntry>> {
        let mut entries = Vec::new();
        for kind in self.kinds() {
            if filter.is_empty() || filter.contains(&kind) {
                entries.extend(self.read_kind(kind)?);
            }
        }
        Ok(entries)
    }
}

fn read_resource(kind: ResourceKind, dir: &Path) -> SnapshotEntry {
    let dir_name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let entity_path = dir.join(kind.entity_file());
    let entity: Option<Value> = if entity_path.exists() {
        match fs::read(&entity_path)
            .map_err(Error::from)
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(Error::from))
        {
            Ok(value) => Some(value),
            Err(e) => {
                return SnapshotEntry::Skippable {
                    kind,
                    id: dir_name,
                    reason: format!("unreadable {}: {}", kind.entity_file(), e),
                }
            }
        }
    } else {
        None
    };

    let mut artifacts = Vec::new();
    for artifact_kind in ArtifactKind::ALL {
        let path = dir.join(artifact_kind.file_name());
        if let Ok(bytes) = fs::read(&path) {
            artifacts.push(Artifact::new(artifact_kind, bytes));
        }
    }

    let has_entity = entity.is_some();
    let descriptor = match entity {
        Some(entity) => match ResourceDescriptor::from_entity(kind, entity.clone()) {
            Some(descriptor) => descriptor,
            None => ResourceDescriptor::with_id(kind, dir_name.clone(), entity),
        },
        None => ResourceDescriptor::with_id(kind, dir_name.clone(), Value::Null),
    };

    if kind == ResourceKind::Api
        && !artifacts.iter().any(|a| a.kind == ArtifactKind::Definition)
    {
        return SnapshotEntry::Skippable {
            kind,
            id: descriptor.id,
            reason: format!("no {}", ArtifactKind::Definition.file_name()),
        };
    }
    if kind != ResourceKind::Api && !has_entity {
        return SnapshotEntry::Skippable {
            kind,
            id: descriptor.id,
            reason: format!("no {}", kind.entity_file()),
        };
    }

    debug!(%kind, id = %descriptor.id, artifacts = artifacts.len(), "Read snapshot resource");
    SnapshotEntry::Resource(SnapshotResource {
        descriptor,
        artifacts,
        dir: dir.to_path_buf(),
        has_entity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotWriter;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_root() {
        let temp = TempDir::new().unwrap();
        let err = SnapshotReader::open(temp.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::InputNotFound(_)));
    }

    #[test]
    fn test_recovers_original_id() {
        let temp = TempDir::new().unwrap();
        let writer = SnapshotWriter::create(temp.path()).unwrap();
        let descriptor = ResourceDescriptor::from_entity(
            ResourceKind::Backend,
            json!({"name": "legacy backend", "properties": {"url": "https://legacy"}}),
        )
        .unwrap();
        writer.write_entity(&descriptor).unwrap();

        let entries = SnapshotReader::open(temp.path())
            .unwrap()
            .read_kind(ResourceKind::Backend)
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id(), "legacy backend");
    }

    #[test]
    fn test_api_without_definition_is_skippable() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("apis/orders-api");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("api-entity.json"), r#"{"name":"orders-api"}"#).unwrap();

        let entries = SnapshotReader::open(temp.path()).unwrap().read_all(&[]).unwrap();
        assert!(matches!(
            &entries[0],
            SnapshotEntry::Skippable { reason, .. } if reason == "no openapi.json"
        ));
    }

    #[test]
    fn test_api_without_entity_uses_dir_name() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("apis/echo-api");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("openapi.json"), "{}").unwrap();

        let entries = SnapshotReader::open(temp.path()).unwrap().read_all(&[]).unwrap();
        match &entries[0] {
            SnapshotEntry::Resource(r) => {
                assert_eq!(r.descriptor.id, "echo-api");
                assert!(!r.has_entity);
                assert!(r.artifact(ArtifactKind::Definition).is_some());
            }
            other => panic!("expected resource, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_and_order() {
        let temp = TempDir::new().unwrap();
        let writer = SnapshotWriter::create(temp.path()).unwrap();
        for (kind, id) in [
            (ResourceKind::Product, "b"),
            (ResourceKind::Product, "a"),
            (ResourceKind::Logger, "l"),
        ] {
            let d = ResourceDescriptor::with_id(kind, id.to_string(), json!({"name": id}));
            writer.write_entity(&d).unwrap();
        }
        fs::create_dir_all(temp.path().join("users/x")).unwrap();

        let reader = SnapshotReader::open(temp.path()).unwrap();
        assert_eq!(reader.kinds(), vec![ResourceKind::Logger, ResourceKind::Product]);

        let ids: Vec<_> = reader
            .read_all(&[ResourceKind::Product])
            .unwrap()
            .iter()
            .map(|e| e.id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
