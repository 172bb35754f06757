// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Snapshot persistence collaborator
//!
//! Blobs are opaque to the store: a 256-byte cluster header followed by
//! `(segment type, byte size, bytes)` records.

use crate::types::ServiceResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Snapshot metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub snapshot_id: String,
    pub cluster_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Stores cluster snapshot blobs
pub trait SnapshotStore: Send + Sync {
    /// Store `blob` for `cluster_id`, returning the new snapshot's metadata
    fn save(&self, cluster_id: Uuid, name: &str, blob: &[u8]) -> ServiceResult<SnapshotInfo>;

    /// Blob of `snapshot_id`; `ServiceError::NotFound` when unknown
    fn load(&self, snapshot_id: &str) -> ServiceResult<Vec<u8>>;

    /// All snapshots, oldest first
    fn list(&self) -> ServiceResult<Vec<SnapshotInfo>>;

    /// Returns `false` if there was nothing to delete
    fn delete(&self, snapshot_id: &str) -> ServiceResult<bool>;
}
