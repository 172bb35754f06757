// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Node types for the three segment kinds
//!
//! Dynamic segments use [`Node`]; input and output segments only need the
//! value that crosses their border, so they carry slimmer node types.

use super::ids::SectionId;

/// Node of a dynamic segment
///
/// Mutated every cycle by the worker that owns the segment, never shared
/// across segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    /// Accumulated synaptic input for the current cycle (reset when consumed)
    pub input: f32,
    pub potential: f32,
    /// Activation threshold
    pub border: f32,
    /// Error term of the last backward pass
    pub delta: f32,
    /// Head of this node's synapse section chain
    pub target_section_id: Option<SectionId>,
    /// Remaining cycles during which the node cannot become active
    pub refraction_time: u8,
    pub active: bool,
    /// Input-brick nodes derive their border once, from the first nonzero input
    pub border_initialized: bool,
}

impl Node {
    pub fn new(border: f32) -> Self {
        Self {
            input: 0.0,
            potential: 0.0,
            border,
            delta: 0.0,
            target_section_id: None,
            refraction_time: 0,
            active: false,
            border_initialized: false,
        }
    }

    /// Clear the per-cycle state while keeping the border and the synapse chain
    pub fn reset_cycle_state(&mut self) {
        self.input = 0.0;
        self.potential = 0.0;
        self.delta = 0.0;
        self.active = false;
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Node of an input segment: the externally supplied value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputNode {
    pub value: f32,
    /// Delta received back from the network (informational)
    pub delta: f32,
}

/// Node of an output segment
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OutputNode {
    /// Value received from the network in the last forward pass
    pub output: f32,
    /// Expected value while learning
    pub should: f32,
    /// Error term sent back during the backward pass
    pub delta: f32,
}

impl OutputNode {
    /// Output-layer delta for a sigmoid output: `(out - should) * out * (1 - out)`
    #[inline]
    pub fn compute_delta(&self) -> f32 {
        (self.output - self.should) * self.output * (1.0 - self.output)
    }
}
