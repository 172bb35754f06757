// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::traits::{ClusterRecord, MetadataStore, TemplateRecord};
use crate::types::{ServiceError, ServiceResult, TopologyDescription};
use ahash::AHashMap;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

/// Template and cluster records in process memory
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    templates: RwLock<AHashMap<Uuid, TemplateRecord>>,
    clusters: RwLock<AHashMap<Uuid, ClusterRecord>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for InMemoryMetadataStore {
    /// Templates must parse as a topology and have a unique name
    fn add_template(&self, name: &str, topology: serde_json::Value) -> ServiceResult<TemplateRecord> {
        TopologyDescription::from_value(topology.clone())?.validate()?;
        let mut templates = self.templates.write();
        if templates.values().any(|t| t.name == name) {
            return Err(ServiceError::AlreadyExists {
                resource: "Template".to_string(),
                id: name.to_string(),
            });
        }
        let record = TemplateRecord {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            topology,
            created_at: Utc::now(),
        };
        templates.insert(record.uuid, record.clone());
        Ok(record)
    }

    fn get_template(&self, uuid: Uuid) -> Option<TemplateRecord> {
        self.templates.read().get(&uuid).cloned()
    }

    fn get_template_by_name(&self, name: &str) -> Option<TemplateRecord> {
        self.templates.read().values().find(|t| t.name == name).cloned()
    }

    fn list_templates(&self) -> Vec<TemplateRecord> {
        let mut records: Vec<_> = self.templates.read().values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    fn delete_template(&self, uuid: Uuid) -> bool {
        self.templates.write().remove(&uuid).is_some()
    }

    fn add_cluster(&self, record: ClusterRecord) -> ServiceResult<()> {
        let mut clusters = self.clusters.write();
        if clusters.contains_key(&record.uuid) {
            return Err(ServiceError::AlreadyExists {
                resource: "Cluster".to_string(),
                id: record.uuid.to_string(),
            });
        }
        clusters.insert(record.uuid, record);
        Ok(())
    }

    fn get_cluster(&self, uuid: Uuid) -> Option<ClusterRecord> {
        self.clusters.read().get(&uuid).cloned()
    }

    fn list_clusters(&self) -> Vec<ClusterRecord> {
        let mut records: Vec<_> = self.clusters.read().values().cloned().collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    fn delete_cluster(&self, uuid: Uuid) -> bool {
        self.clusters.write().remove(&uuid).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn topology() -> serde_json::Value {
        json!({
            "segments": [
                { "name": "in", "type": "input", "number_of_nodes": 1,
                  "outputs": [ { "side": 5, "target": "out" } ] },
                { "name": "out", "type": "output", "number_of_nodes": 1 }
            ]
        })
    }

    #[test]
    fn test_templates() {
        let store = InMemoryMetadataStore::new();
        let record = store.add_template("tiny", topology()).unwrap();
        assert_eq!(store.get_template_by_name("tiny").unwrap().uuid, record.uuid);
        assert!(matches!(
            store.add_template("tiny", topology()),
            Err(ServiceError::AlreadyExists { .. })
        ));
        assert!(store.add_template("broken", json!({ "segments": [] })).is_err());
        assert!(store.delete_template(record.uuid));
        assert!(store.get_template(record.uuid).is_none());
    }

    #[test]
    fn test_clusters() {
        let store = InMemoryMetadataStore::new();
        let record = ClusterRecord {
            uuid: Uuid::new_v4(),
            name: "c".into(),
            template_uuid: None,
            created_at: Utc::now(),
        };
        store.add_cluster(record.clone()).unwrap();
        assert!(store.add_cluster(record.clone()).is_err());
        assert_eq!(store.list_clusters().len(), 1);
        assert!(store.delete_cluster(record.uuid));
        assert!(!store.delete_cluster(record.uuid));
    }
}
