// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-segment processing parameters
//!
//! Values are supplied by the configuration layer; the defaults are the ones
//! the engine tests are written against.

/// Tunable parameters of a dynamic segment
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SegmentSettings {
    /// Multiplier applied to a node's input when computing its potential
    pub potential_overflow: f32,
    /// Initial activation border of normal and output nodes
    pub node_border: f32,
    /// Input-brick border = `|first nonzero input| * input_border_factor`
    pub input_border_factor: f32,
    /// Cycles a node stays inactive after firing
    pub refraction_time: u8,
    /// Probability that a new synapse gets a negative weight
    pub sign_negative_probability: f32,
    /// New weights are multiplied by a value in `1..=multiplicator_range`
    pub multiplicator_range: u32,
    /// Remaining energy above which a full section chains into the next one
    pub growth_threshold: f32,
    /// Learn rate for synapses below the hardening boundary
    pub learn_rate_hardened: f32,
    /// Learn rate for synapses at or after the hardening boundary
    pub learn_rate_fresh: f32,
    /// Cycles between reduction passes (0 disables reduction)
    pub reduction_interval: u32,
    /// Amount removed from `active_counter` by each reduction pass
    pub reduction_decay: i8,
    /// Size of each brick's target candidate pool
    pub target_candidate_count: u32,
    /// Maximum number of steps of the random walk that picks candidates
    pub max_walk_distance: u32,
    /// Upper bound of synapse sections in the segment's item buffer
    pub max_synapse_sections: u32,
    /// Sections allocated per item buffer growth step
    pub section_block_size: u32,
}

impl Default for SegmentSettings {
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

impl SegmentSettings {
    /// Learn rate for the synapse at `pos` of a section hardened up to `hardening`
    #[inline]
    pub fn learn_rate(&self, pos: usize, hardening: u16) -> f32 {
        if pos < hardening as usize {
            self.learn_rate_hardened
        } else {
            self.learn_rate_fresh
        }
    }
}
