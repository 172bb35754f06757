// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Parallel Backend
//!
//! Rayon data-parallel kernels. Nodes of one brick never target each other,
//! so their backward results can be computed independently and applied in
//! node order afterwards, matching [`super::CpuBackend`] exactly.

use super::{BackendType, ProcessingBackend};
use crate::node_processing::update_node_potential;
use crate::synapse_processing::{compute_node_backward, BackwardView, NodeBackward};
use hanami_npu_neural::{Node, SegmentSettings};
use rayon::prelude::*;
use std::ops::Range;

/// Below this many nodes a brick is processed on the calling thread
const MIN_PARALLEL_NODES: usize = 256;

#[derive(Debug, Clone)]
pub struct ParallelBackend {
    name: String,
}

impl ParallelBackend {
    pub fn new() -> Self {
        Self {
            name: format!("Parallel (rayon, {} threads)", rayon::current_num_threads()),
        }
    }
}

impl Default for ParallelBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingBackend for ParallelBackend {
    fn backend_name(&self) -> &str {
        &self.name
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Parallel
    }

    fn update_potentials(&self, nodes: &mut [Node], settings: &SegmentSettings) -> u64 {
        nodes
            .par_iter_mut()
            .with_min_len(MIN_PARALLEL_NODES)
            .map(|node| update_node_potential(node, settings) as u64)
            .sum()
    }

    fn compute_backward(&self, range: Range<usize>, view: &BackwardView<'_>) -> Vec<NodeBackward> {
        range
            .into_par_iter()
            .with_min_len(MIN_PARALLEL_NODES)
            .map(|idx| compute_node_backward(idx, view))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;

    #[test]
    fn test_potentials_match_cpu() {
        let settings = SegmentSettings::default();
        let mut a: Vec<Node> = (0..2000)
            .map(|i| {
                let mut node = Node::new(0.3);
                node.input = (i % 7) as f32 * 0.1;
                node
            })
            .collect();
        let mut b = a.clone();

        let active_cpu = CpuBackend::new().update_potentials(&mut a, &settings);
        let active_par = ParallelBackend::new().update_potentials(&mut b, &settings);

        assert_eq!(active_cpu, active_par);
        assert_eq!(a, b);
    }
}
