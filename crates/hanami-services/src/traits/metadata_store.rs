// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Cluster and template records kept outside the core

use crate::types::ServiceResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Named topology a cluster can be created from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub uuid: Uuid,
    pub name: String,
    /// Topology document (see [`crate::types::TopologyDescription`])
    pub topology: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub uuid: Uuid,
    pub name: String,
    pub template_uuid: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Create/get/list/delete of cluster and template records
pub trait MetadataStore: Send + Sync {
    fn add_template(&self, name: &str, topology: serde_json::Value) -> ServiceResult<TemplateRecord>;

    fn get_template(&self, uuid: Uuid) -> Option<TemplateRecord>;

    fn get_template_by_name(&self, name: &str) -> Option<TemplateRecord>;

    fn list_templates(&self) -> Vec<TemplateRecord>;

    fn delete_template(&self, uuid: Uuid) -> bool;

    fn add_cluster(&self, record: ClusterRecord) -> ServiceResult<()>;

    fn get_cluster(&self, uuid: Uuid) -> Option<ClusterRecord>;

    fn list_clusters(&self) -> Vec<ClusterRecord>;

    fn delete_cluster(&self, uuid: Uuid) -> bool;
}
