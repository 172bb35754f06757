// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Explicit per-cycle context handed to every processing call.

use ahash::AHashMap;
use hanami_npu_neural::{FlowDirection, RandomValues, SegmentId};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Ordered processing phases of one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    InputMapping,
    Forward,
    Backward,
    Finalize,
}

impl Phase {
    /// Side direction whose `input_ready` flags gate this phase
    pub fn receiving_direction(self) -> Option<FlowDirection> {
        match self {
            Phase::Forward => Some(FlowDirection::Input),
            Phase::Backward => Some(FlowDirection::Output),
            Phase::InputMapping | Phase::Finalize => None,
        }
    }

    /// Side direction this phase sends border data on
    pub fn sending_direction(self) -> Option<FlowDirection> {
        self.receiving_direction().map(FlowDirection::reversed)
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::InputMapping => write!(f, "input-mapping"),
            Phase::Forward => write!(f, "forward"),
            Phase::Backward => write!(f, "backward"),
            Phase::Finalize => write!(f, "finalize"),
        }
    }
}

/// External values applied during input mapping
#[derive(Debug, Clone, Default)]
pub struct CycleBatch {
    /// Values for input segments
    pub inputs: AHashMap<SegmentId, Vec<f32>>,
    /// Expected values for output segments (learning only)
    pub expected: AHashMap<SegmentId, Vec<f32>>,
}

impl CycleBatch {
    pub fn with_inputs(mut self, segment: SegmentId, values: Vec<f32>) -> Self {
        self.inputs.insert(segment, values);
        self
    }

    pub fn with_expected(mut self, segment: SegmentId, values: Vec<f32>) -> Self {
        self.expected.insert(segment, values);
        self
    }
}

#[derive(Debug, Clone)]
pub struct CycleContext {
    /// Cluster-wide cycle counter
    pub cycle: u64,
    /// Growth, backward pass and hardening are enabled
    pub learning: bool,
    pub random: Arc<RandomValues>,
    pub batch: Arc<CycleBatch>,
}

impl CycleContext {
    pub fn new(cycle: u64, learning: bool, random: Arc<RandomValues>, batch: CycleBatch) -> Self {
        Self {
            cycle,
            learning,
            random,
            batch: Arc::new(batch),
        }
    }

    /// Phases run for this cycle, in order
    pub fn phases(&self) -> &'static [Phase] {
        if self.learning {
            &[Phase::InputMapping, Phase::Forward, Phase::Backward, Phase::Finalize]
        } else {
            &[Phase::InputMapping, Phase::Forward, Phase::Finalize]
        }
    }
}
