// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
File-backed snapshot store.

Each snapshot is a blob file `<id>.<extension>` next to a JSON metadata file
`<id>.json` in one directory.
*/

use crate::traits::{SnapshotInfo, SnapshotStore};
use crate::types::{ServiceError, ServiceResult};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

const METADATA_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
    extension: String,
}

impl FileSnapshotStore {
    /// Use `dir` for snapshots, creating it if needed
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> ServiceResult<Self> {
        let dir = dir.into();
        let extension = extension.into();
        if extension.is_empty() || extension == METADATA_EXTENSION {
            return Err(ServiceError::InvalidInput(format!(
                "snapshot file extension '{extension}' is not usable"
            )));
        }
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, extension })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, snapshot_id: &str) -> PathBuf {
        self.dir.join(format!("{snapshot_id}.{}", self.extension))
    }

    fn metadata_path(&self, snapshot_id: &str) -> PathBuf {
        self.dir.join(format!("{snapshot_id}.{METADATA_EXTENSION}"))
    }

    /// Ids are generated uuids; anything else could escape the directory
    fn check_id(snapshot_id: &str) -> ServiceResult<()> {
        Uuid::parse_str(snapshot_id).map(|_| ()).map_err(|_| ServiceError::NotFound {
            resource: "Snapshot".to_string(),
            id: snapshot_id.to_string(),
        })
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, cluster_id: Uuid, name: &str, blob: &[u8]) -> ServiceResult<SnapshotInfo> {
        let info = SnapshotInfo {
            snapshot_id: Uuid::new_v4().to_string(),
            cluster_id,
            name: name.to_string(),
            created_at: Utc::now(),
            size_bytes: blob.len() as u64,
        };
        let path = self.blob_path(&info.snapshot_id);
        fs::write(&path, blob)?;
        let metadata =
            serde_json::to_vec_pretty(&info).map_err(|e| ServiceError::Internal(e.to_string()))?;
        fs::write(self.metadata_path(&info.snapshot_id), metadata)?;
        info!(
            target: "hanami-services",
            snapshot = %info.snapshot_id, path = %path.display(), bytes = blob.len(), "Snapshot written"
        );
        Ok(info)
    }

    fn load(&self, snapshot_id: &str) -> ServiceResult<Vec<u8>> {
        Self::check_id(snapshot_id)?;
        let path = self.blob_path(snapshot_id);
        if !path.exists() {
            return Err(ServiceError::NotFound {
                resource: "Snapshot".to_string(),
                id: snapshot_id.to_string(),
            });
        }
        Ok(fs::read(path)?)
    }

    fn list(&self) -> ServiceResult<Vec<SnapshotInfo>> {
        let mut infos = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(METADATA_EXTENSION) {
                continue;
            }
            let parsed = fs::read(&path)
                .map_err(ServiceError::from)
                .and_then(|bytes| serde_json::from_slice::<SnapshotInfo>(&bytes).map_err(ServiceError::from));
            match parsed {
                Ok(info) => infos.push(info),
                Err(e) => warn!(
                    target: "hanami-services",
                    path = %path.display(), error = %e, "Skipping unreadable snapshot metadata"
                ),
            }
        }
        infos.sort_by_key(|i| i.created_at);
        Ok(infos)
    }

    fn delete(&self, snapshot_id: &str) -> ServiceResult<bool> {
        if Self::check_id(snapshot_id).is_err() {
            return Ok(false);
        }
        let mut removed = false;
        for path in [self.blob_path(snapshot_id), self.metadata_path(snapshot_id)] {
            if path.exists() {
                fs::remove_file(path)?;
                removed = true;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_files_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("snaps"), "hnm").unwrap();
        let cluster = Uuid::new_v4();

        let first = store.save(cluster, "a", &[7; 300]).unwrap();
        let second = store.save(cluster, "b", &[]).unwrap();
        assert!(store.blob_path(&first.snapshot_id).exists());

        assert_eq!(store.load(&first.snapshot_id).unwrap(), vec![7; 300]);
        let listed: Vec<String> = store.list().unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(listed.len(), 2);
        assert!(listed.contains(&"a".to_string()));

        assert!(store.delete(&second.snapshot_id).unwrap());
        assert!(!store.delete(&second.snapshot_id).unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_foreign_ids() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path(), "hnm").unwrap();
        assert!(matches!(
            store.load("../../etc/passwd"),
            Err(ServiceError::NotFound { .. })
        ));
        assert!(!store.delete("../x").unwrap());
        assert!(FileSnapshotStore::new(dir.path(), "json").is_err());
    }
}
