// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::traits::{SnapshotInfo, SnapshotStore};
use crate::types::{ServiceError, ServiceResult};
use ahash::AHashMap;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;

/// Keeps snapshots in process memory
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<AHashMap<String, (SnapshotInfo, Vec<u8>)>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn save(&self, cluster_id: Uuid, name: &str, blob: &[u8]) -> ServiceResult<SnapshotInfo> {
        let info = SnapshotInfo {
            snapshot_id: Uuid::new_v4().to_string(),
            cluster_id,
            name: name.to_string(),
            created_at: Utc::now(),
            size_bytes: blob.len() as u64,
        };
        info!(
            target: "hanami-services",
            snapshot = %info.snapshot_id, cluster = %cluster_id, bytes = blob.len(), "Snapshot stored in memory"
        );
        self.snapshots
            .write()
            .insert(info.snapshot_id.clone(), (info.clone(), blob.to_vec()));
        Ok(info)
    }

    fn load(&self, snapshot_id: &str) -> ServiceResult<Vec<u8>> {
        self.snapshots
            .read()
            .get(snapshot_id)
            .map(|(_, blob)| blob.clone())
            .ok_or_else(|| ServiceError::NotFound {
                resource: "Snapshot".to_string(),
                id: snapshot_id.to_string(),
            })
    }

    fn list(&self) -> ServiceResult<Vec<SnapshotInfo>> {
        let mut infos: Vec<SnapshotInfo> = self.snapshots.read().values().map(|(i, _)| i.clone()).collect();
        infos.sort_by_key(|i| i.created_at);
        Ok(infos)
    }

    fn delete(&self, snapshot_id: &str) -> ServiceResult<bool> {
        Ok(self.snapshots.write().remove(snapshot_id).is_some())
    }
}
