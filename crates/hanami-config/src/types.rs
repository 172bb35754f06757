// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Each struct maps to a section in `hanami_configuration.toml`. Every
//! section is optional; missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HanamiConfig {
    pub system: SystemConfig,
    pub workers: WorkerConfig,
    pub cluster: ClusterConfig,
    pub learning: LearningConfig,
    pub snapshot: SnapshotConfig,
    pub logging: LoggingConfig,
}

/// System-level configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub debug: bool,
    pub log_level: String,
    pub data_dir: PathBuf,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "info".to_string(),
            data_dir: PathBuf::from("data"),
        }
    }
}

/// Phase scheduler and cluster runner threads
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker threads per cluster; 0 runs phases on the driving thread
    pub worker_count: usize,
    /// Sleep when the segment queue is momentarily empty
    pub idle_sleep_us: u64,
    /// Fail the task after a phase makes no progress for this long
    pub stall_timeout_ms: u64,
    /// Runner sleep when no task is queued
    pub runner_idle_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            idle_sleep_us: 200,
            stall_timeout_ms: 5_000,
            runner_idle_ms: 10,
        }
    }
}

/// Cluster construction
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// "cpu", "parallel" or "auto"
    pub backend: String,
    /// Node count from which "auto" picks the parallel backend
    pub parallel_node_threshold: usize,
    pub random_seed: u64,
    /// Entries in each cluster's random value table
    pub random_table_size: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            backend: "auto".to_string(),
            parallel_node_threshold: 10_000,
            random_seed: 0x5EED_1234,
            random_table_size: 1 << 14,
        }
    }
}

/// Synapse growth and learning parameters of dynamic segments
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LearningConfig {
    pub potential_overflow: f32,
    pub node_border: f32,
    pub input_border_factor: f32,
    pub refraction_time: u8,
    pub sign_negative_probability: f32,
    pub multiplicator_range: u32,
    pub growth_threshold: f32,
    pub learn_rate_hardened: f32,
    pub learn_rate_fresh: f32,
    pub reduction_interval: u32,
    pub reduction_decay: i8,
    /// Size of each brick's growth candidate pool
    pub target_candidate_count: u32,
    pub max_walk_distance: u32,
    pub max_synapse_sections: u32,
    pub section_block_size: u32,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            potential_overflow: 1.0,
            node_border: 0.0,
            input_border_factor: 0.0,
            refraction_time: 0,
            sign_negative_probability: 0.5,
            multiplicator_range: 1,
            growth_threshold: 0.01,
            learn_rate_hardened: 0.2,
            learn_rate_fresh: 0.05,
            reduction_interval: 100,
            reduction_decay: 2,
            target_candidate_count: 1000,
            max_walk_distance: 4,
            max_synapse_sections: 100_000,
            section_block_size: 256,
        }
    }
}

/// File-backed snapshot store
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub output_dir: PathBuf,
    pub file_extension: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output/snapshots"),
            file_extension: "hnm".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub global_log_level: String,
    pub file_logging: bool,
    pub log_dir: PathBuf,
    pub retention_days: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            global_log_level: "info".to_string(),
            file_logging: false,
            log_dir: PathBuf::from("logs"),
            retention_days: 7,
        }
    }
}
