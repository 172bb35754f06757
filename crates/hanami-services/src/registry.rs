// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Process-wide set of clusters, addressed by UUID.

use crate::cluster::Cluster;
use crate::options::ClusterOptions;
use crate::runner::{ClusterRunner, SharedCluster};
use crate::traits::{ClusterRecord, MetadataStore, SnapshotStore, StreamSession};
use crate::types::{ServiceError, ServiceResult, TopologyDescription};
use ahash::AHashMap;
use chrono::Utc;
use hanami_state_manager::ClusterStatus;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

struct Entry {
    cluster: SharedCluster,
    status: Arc<ClusterStatus>,
    runner: Option<ClusterRunner>,
}

pub struct ClusterRegistry {
    options: ClusterOptions,
    clusters: RwLock<AHashMap<Uuid, Entry>>,
    metadata: Option<Arc<dyn MetadataStore>>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
}

impl ClusterRegistry {
    pub fn new(options: ClusterOptions) -> Self {
        Self {
            options,
            clusters: RwLock::new(AHashMap::new()),
            metadata: None,
            snapshots: None,
        }
    }

    pub fn with_metadata_store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.metadata = Some(store);
        self
    }

    /// Store handed to every cluster created afterwards
    pub fn with_snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(store);
        self
    }

    /// Build and register a cluster from a topology
    pub fn create(&self, name: &str, topology: &TopologyDescription) -> ServiceResult<Uuid> {
        self.create_with(name, topology, None)
    }

    /// Build a cluster from a stored template
    pub fn create_from_template(&self, name: &str, template: &str) -> ServiceResult<Uuid> {
        let store = self
            .metadata
            .as_ref()
            .ok_or_else(|| ServiceError::InvalidState("registry has no metadata store".into()))?;
        let record = store
            .get_template_by_name(template)
            .ok_or_else(|| ServiceError::NotFound {
                resource: "Template".to_string(),
                id: template.to_string(),
            })?;
        let topology = TopologyDescription::from_value(record.topology)?;
        self.create_with(name, &topology, Some(record.uuid))
    }

    fn create_with(
        &self,
        name: &str,
        topology: &TopologyDescription,
        template_uuid: Option<Uuid>,
    ) -> ServiceResult<Uuid> {
        let mut cluster = Cluster::new(name, topology, self.options.clone())?;
        cluster.set_snapshot_store(self.snapshots.clone());
        let uuid = cluster.uuid();

        if let Some(store) = &self.metadata {
            store.add_cluster(ClusterRecord {
                uuid,
                name: name.to_string(),
                template_uuid,
                created_at: Utc::now(),
            })?;
        }

        let status = cluster.status();
        self.clusters.write().insert(
            uuid,
            Entry {
                cluster: Arc::new(Mutex::new(cluster)),
                status,
                runner: None,
            },
        );
        info!(target: "hanami-services", cluster = %uuid, %name, "Cluster registered");
        Ok(uuid)
    }

    pub fn get(&self, uuid: Uuid) -> Option<SharedCluster> {
        self.clusters.read().get(&uuid).map(|e| Arc::clone(&e.cluster))
    }

    /// Status handle; reading it never takes the cluster lock
    pub fn status(&self, uuid: Uuid) -> Option<Arc<ClusterStatus>> {
        self.clusters.read().get(&uuid).map(|e| Arc::clone(&e.status))
    }

    pub fn list(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.clusters.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.clusters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.read().is_empty()
    }

    /// Start a background runner for the cluster; a no-op if one is running
    pub fn start(&self, uuid: Uuid) -> ServiceResult<()> {
        let mut clusters = self.clusters.write();
        let entry = clusters.get_mut(&uuid).ok_or_else(|| not_found(uuid))?;
        if entry.runner.as_ref().map_or(false, |r| r.is_running()) {
            return Ok(());
        }
        entry.runner = Some(ClusterRunner::spawn(Arc::clone(&entry.cluster))?);
        Ok(())
    }

    /// Stop the cluster's runner; `false` if none was running
    pub fn stop(&self, uuid: Uuid) -> bool {
        let runner = self.clusters.write().get_mut(&uuid).and_then(|e| e.runner.take());
        match runner {
            Some(mut runner) => {
                runner.stop();
                true
            }
            None => false,
        }
    }

    pub fn attach_stream(&self, uuid: Uuid, session: Arc<dyn StreamSession>) -> ServiceResult<()> {
        let cluster = self.get(uuid).ok_or_else(|| not_found(uuid))?;
        cluster.lock().set_stream_session(Some(session));
        Ok(())
    }

    /// Stop and drop a cluster; `false` for unknown UUIDs
    pub fn delete(&self, uuid: Uuid) -> bool {
        let Some(mut entry) = self.clusters.write().remove(&uuid) else {
            return false;
        };
        if let Some(mut runner) = entry.runner.take() {
            runner.stop();
        }
        entry.cluster.lock().shutdown();
        if let Some(store) = &self.metadata {
            store.delete_cluster(uuid);
        }
        info!(target: "hanami-services", cluster = %uuid, "Cluster deleted");
        true
    }
}

impl Drop for ClusterRegistry {
    fn drop(&mut self) {
        for uuid in self.list() {
            self.delete(uuid);
        }
    }
}

fn not_found(uuid: Uuid) -> ServiceError {
    ServiceError::NotFound {
        resource: "Cluster".to_string(),
        id: uuid.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryMetadataStore;

    const PAIR: &str = r#"{
        "segments": [
            { "name": "in", "type": "input", "number_of_nodes": 2,
              "outputs": [ { "side": 2, "target": "hidden" } ] },
            { "name": "hidden", "type": "dynamic",
              "bricks": [
                { "position": [1, 1, 1], "kind": "input", "number_of_nodes": 2, "border_side": 9 },
                { "position": [2, 1, 1], "kind": "output", "number_of_nodes": 1, "border_side": 2 }
              ],
              "outputs": [ { "side": 2, "target": "out" } ] },
            { "name": "out", "type": "output", "number_of_nodes": 1 }
        ]
    }"#;

    fn registry() -> ClusterRegistry {
        ClusterRegistry::new(ClusterOptions::default().inline())
    }

    #[test]
    fn test_create_get_delete() {
        let registry = registry();
        let topology = TopologyDescription::from_json(PAIR).unwrap();
        let uuid = registry.create("a", &topology).unwrap();

        assert_eq!(registry.list(), vec![uuid]);
        assert_eq!(registry.get(uuid).unwrap().lock().name(), "a");
        assert_eq!(registry.status(uuid).unwrap().segment_count(), 3);

        assert!(registry.delete(uuid));
        assert!(!registry.delete(uuid));
        assert!(registry.get(uuid).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_create_from_template_records_cluster() {
        let metadata = Arc::new(InMemoryMetadataStore::new());
        metadata
            .add_template("pair", serde_json::from_str(PAIR).unwrap())
            .unwrap();
        let registry = registry().with_metadata_store(metadata.clone());

        let uuid = registry.create_from_template("b", "pair").unwrap();
        let record = metadata.get_cluster(uuid).unwrap();
        assert_eq!(record.name, "b");
        assert!(record.template_uuid.is_some());

        assert!(matches!(
            registry.create_from_template("c", "missing"),
            Err(ServiceError::NotFound { .. })
        ));

        registry.delete(uuid);
        assert!(metadata.get_cluster(uuid).is_none());
    }

    #[test]
    fn test_template_needs_metadata_store() {
        assert!(matches!(
            registry().create_from_template("x", "pair"),
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[test]
    fn test_start_and_stop_runner() {
        let registry = registry();
        let uuid = registry
            .create("r", &TopologyDescription::from_json(PAIR).unwrap())
            .unwrap();
        registry.start(uuid).unwrap();
        registry.start(uuid).unwrap();
        assert!(registry.stop(uuid));
        assert!(!registry.stop(uuid));
        assert!(registry.start(Uuid::new_v4()).is_err());
    }
}
