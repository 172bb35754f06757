// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Processing Backend Abstraction
//!
//! The per-brick node kernels sit behind one trait so the phase scheduler
//! never needs to know how they are executed. Growth and chain extension
//! mutate the section arena and therefore always run sequentially inside the
//! segment; backends own the embarrassingly parallel parts:
//!
//! - potential updates of a normal brick
//! - delta and weight-update computation of one brick in the backward pass
//!
//! Every backend must produce bit-identical results to [`CpuBackend`].

mod cpu;
mod parallel;

pub use cpu::CpuBackend;
pub use parallel::ParallelBackend;

use crate::error::{EngineError, Result};
use crate::synapse_processing::{BackwardView, NodeBackward};
use hanami_npu_neural::{Node, SegmentSettings};
use std::ops::Range;
use std::sync::Arc;
use tracing::info;

/// Node kernels used by segment processing
pub trait ProcessingBackend: Send + Sync + std::fmt::Debug {
    /// Backend name for logging
    fn backend_name(&self) -> &str;

    fn backend_type(&self) -> BackendType;

    /// Update the potentials of one normal brick's nodes.
    ///
    /// Returns the number of nodes that became active.
    fn update_potentials(&self, nodes: &mut [Node], settings: &SegmentSettings) -> u64;

    /// Compute backward results for the nodes in `range`.
    ///
    /// Results are returned in node order and are applied by the caller.
    fn compute_backward(&self, range: Range<usize>, view: &BackwardView<'_>) -> Vec<NodeBackward>;
}

/// Backend type for construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendType {
    /// Single-threaded kernels
    Cpu,

    /// Rayon data-parallel kernels
    Parallel,

    /// Select by segment size
    #[default]
    Auto,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Cpu => write!(f, "CPU"),
            BackendType::Parallel => write!(f, "Parallel"),
            BackendType::Auto => write!(f, "Auto"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(BackendType::Cpu),
            "parallel" | "rayon" => Ok(BackendType::Parallel),
            "auto" => Ok(BackendType::Auto),
            _ => Err(EngineError::InvalidBackend(s.to_string())),
        }
    }
}

/// Thresholds for automatic backend selection
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Minimum node count of the largest dynamic segment before the
    /// parallel backend is chosen (default: 10,000)
    pub parallel_node_threshold: usize,

    /// Force the sequential backend
    pub force_cpu: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            parallel_node_threshold: 10_000,
            force_cpu: false,
        }
    }
}

/// Backend selection decision with rationale
#[derive(Debug, Clone)]
pub struct BackendDecision {
    pub backend_type: BackendType,
    pub reason: String,
}

/// Resolve `Auto` to a concrete backend type
pub fn select_backend(requested: BackendType, node_count: usize, config: &BackendConfig) -> BackendDecision {
    match requested {
        BackendType::Cpu => BackendDecision {
            backend_type: BackendType::Cpu,
            reason: "Requested explicitly".to_string(),
        },
        BackendType::Parallel => BackendDecision {
            backend_type: BackendType::Parallel,
            reason: "Requested explicitly".to_string(),
        },
        BackendType::Auto if config.force_cpu => BackendDecision {
            backend_type: BackendType::Cpu,
            reason: "Forced CPU via configuration".to_string(),
        },
        BackendType::Auto if node_count >= config.parallel_node_threshold => BackendDecision {
            backend_type: BackendType::Parallel,
            reason: format!(
                "{node_count} nodes >= threshold {}",
                config.parallel_node_threshold
            ),
        },
        BackendType::Auto => BackendDecision {
            backend_type: BackendType::Cpu,
            reason: format!(
                "{node_count} nodes < threshold {}",
                config.parallel_node_threshold
            ),
        },
    }
}

/// Create a backend, resolving `Auto` by node count
pub fn create_backend(
    requested: BackendType,
    node_count: usize,
    config: &BackendConfig,
) -> Arc<dyn ProcessingBackend> {
    let decision = select_backend(requested, node_count, config);
    info!(
        target: "hanami-npu-engine",
        backend = %decision.backend_type, reason = %decision.reason, "Selected processing backend"
    );
    match decision.backend_type {
        BackendType::Parallel => Arc::new(ParallelBackend::new()),
        BackendType::Cpu | BackendType::Auto => Arc::new(CpuBackend::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_parsing() {
        assert_eq!("CPU".parse::<BackendType>().unwrap(), BackendType::Cpu);
        assert_eq!("rayon".parse::<BackendType>().unwrap(), BackendType::Parallel);
        assert_eq!("auto".parse::<BackendType>().unwrap(), BackendType::Auto);
        assert!("gpu".parse::<BackendType>().is_err());
    }

    #[test]
    fn test_auto_selection_by_size() {
        let config = BackendConfig::default();
        assert_eq!(
            select_backend(BackendType::Auto, 100, &config).backend_type,
            BackendType::Cpu
        );
        assert_eq!(
            select_backend(BackendType::Auto, 50_000, &config).backend_type,
            BackendType::Parallel
        );
        let forced = BackendConfig {
            force_cpu: true,
            ..Default::default()
        };
        assert_eq!(
            select_backend(BackendType::Auto, 50_000, &forced).backend_type,
            BackendType::Cpu
        );
    }

    #[test]
    fn test_create_backend_reports_type() {
        let backend = create_backend(BackendType::Parallel, 0, &BackendConfig::default());
        assert_eq!(backend.backend_type(), BackendType::Parallel);
    }
}
