// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Cluster construction options, usually derived from [`HanamiConfig`].
*/

use crate::types::{ServiceError, ServiceResult};
use hanami_config::{HanamiConfig, LearningConfig, WorkerConfig};
use hanami_npu_engine::{BackendConfig, BackendType, SchedulerConfig};
use hanami_npu_neural::SegmentSettings;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClusterOptions {
    pub scheduler: SchedulerConfig,
    pub settings: SegmentSettings,
    pub backend: BackendType,
    pub backend_config: BackendConfig,
    pub random_seed: u64,
    pub random_table_size: usize,
    /// Runner sleep between polls while the cluster has nothing to do
    pub runner_idle: Duration,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self::from_config(&HanamiConfig::default()).unwrap_or_else(|_| Self {
            scheduler: SchedulerConfig::default(),
            settings: SegmentSettings::default(),
            backend: BackendType::Auto,
            backend_config: BackendConfig::default(),
            random_seed: 0,
            random_table_size: 1 << 14,
            runner_idle: Duration::from_millis(10),
        })
    }
}

impl ClusterOptions {
    pub fn from_config(config: &HanamiConfig) -> ServiceResult<Self> {
        let backend = config
            .cluster
            .backend
            .parse::<BackendType>()
            .map_err(ServiceError::from)?;
        Ok(Self {
            scheduler: scheduler_config(&config.workers),
            settings: segment_settings(&config.learning),
            backend,
            backend_config: BackendConfig {
                parallel_node_threshold: config.cluster.parallel_node_threshold,
                force_cpu: false,
            },
            random_seed: config.cluster.random_seed,
            random_table_size: config.cluster.random_table_size,
            runner_idle: Duration::from_millis(config.workers.runner_idle_ms),
        })
    }

    /// Run phases on the driving thread
    pub fn inline(mut self) -> Self {
        self.scheduler.worker_count = 0;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }
}

pub fn scheduler_config(workers: &WorkerConfig) -> SchedulerConfig {
    SchedulerConfig {
        worker_count: workers.worker_count,
        idle_sleep: Duration::from_micros(workers.idle_sleep_us),
        stall_timeout: Duration::from_millis(workers.stall_timeout_ms),
    }
}

pub fn segment_settings(learning: &LearningConfig) -> SegmentSettings {
    SegmentSettings {
        potential_overflow: learning.potential_overflow,
        node_border: learning.node_border,
        input_border_factor: learning.input_border_factor,
        refraction_time: learning.refraction_time,
        sign_negative_probability: learning.sign_negative_probability,
        multiplicator_range: learning.multiplicator_range,
        growth_threshold: learning.growth_threshold,
        learn_rate_hardened: learning.learn_rate_hardened,
        learn_rate_fresh: learning.learn_rate_fresh,
        reduction_interval: learning.reduction_interval,
        reduction_decay: learning.reduction_decay,
        target_candidate_count: learning.target_candidate_count,
        max_walk_distance: learning.max_walk_distance,
        max_synapse_sections: learning.max_synapse_sections,
        section_block_size: learning.section_block_size,
    }
}
