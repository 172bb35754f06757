// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # CPU Backend
//!
//! Sequential reference implementation of the node kernels.

use super::{BackendType, ProcessingBackend};
use crate::node_processing::update_node_potential;
use crate::synapse_processing::{compute_node_backward, BackwardView, NodeBackward};
use hanami_npu_neural::{Node, SegmentSettings};
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct CpuBackend {
    name: String,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self {
            name: "CPU (sequential)".to_string(),
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingBackend for CpuBackend {
    fn backend_name(&self) -> &str {
        &self.name
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Cpu
    }

    fn update_potentials(&self, nodes: &mut [Node], settings: &SegmentSettings) -> u64 {
        nodes
            .iter_mut()
            .map(|node| update_node_potential(node, settings) as u64)
            .sum()
    }

    fn compute_backward(&self, range: Range<usize>, view: &BackwardView<'_>) -> Vec<NodeBackward> {
        range.map(|idx| compute_node_backward(idx, view)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_backend_counts_active_nodes() {
        let backend = CpuBackend::new();
        let settings = SegmentSettings::default();
        let mut nodes = vec![Node::new(0.5); 4];
        nodes[0].input = 1.0;
        nodes[2].input = 0.6;
        assert_eq!(backend.update_potentials(&mut nodes, &settings), 2);
        assert_eq!(backend.backend_name(), "CPU (sequential)");
    }
}
