// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Synapses and synapse sections
//!
//! A node owns a chain of fixed-capacity sections linked through `next`.
//! Sections live in the segment's item buffer and are addressed by
//! [`SectionId`], so deleting one never moves another.

use super::ids::SectionId;

/// Fixed capacity of one synapse section
pub const SYNAPSES_PER_SECTION: usize = 30;

/// `border = weight * BORDER_SCALE + 1` when a synapse is created
pub const BORDER_SCALE: f32 = 255.0;

/// Energy consumed per unit of synapse border
pub const BORDER_STEP: f32 = 1.0 / BORDER_SCALE;

/// Saturation value of [`Synapse::active_counter`]
pub const ACTIVE_COUNTER_MAX: i8 = 126;

/// One learned connection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Synapse {
    pub weight: f32,
    /// Energy cost of traversal, in units of [`BORDER_STEP`]
    pub border: f32,
    /// Target node inside the same segment; `None` marks a free slot
    pub target_node_id: Option<u16>,
    /// Usage counter, raised on traversal and decayed by reduction
    pub active_counter: i8,
}

impl Synapse {
    pub const EMPTY: Synapse = Synapse {
        weight: 0.0,
        border: 0.0,
        target_node_id: None,
        active_counter: 0,
    };

    #[inline]
    pub fn is_populated(&self) -> bool {
        self.target_node_id.is_some()
    }

    /// Energy consumed when a signal crosses this synapse
    #[inline]
    pub fn energy_cost(&self) -> f32 {
        self.border * BORDER_STEP
    }

    /// Saturating usage increment
    #[inline]
    pub fn mark_active(&mut self) {
        if self.active_counter < ACTIVE_COUNTER_MAX {
            self.active_counter += 1;
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        *self = Self::EMPTY;
    }
}

impl Default for Synapse {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Bounded block of synapses, chainable through `next`
#[derive(Debug, Clone, PartialEq)]
pub struct SynapseSection {
    pub synapses: [Synapse; SYNAPSES_PER_SECTION],
    /// Slots below this index are stable and exempt from reduction
    pub hardening: u16,
    pub next: Option<SectionId>,
    /// Cursor into the segment's random table
    pub random_pos: u32,
    /// Cursor into the source brick's target candidate pool
    pub brick_buffer_pos: u32,
}

impl SynapseSection {
    pub fn new(random_pos: u32, brick_buffer_pos: u32) -> Self {
        Self {
            synapses: [Synapse::EMPTY; SYNAPSES_PER_SECTION],
            hardening: 0,
            next: None,
            random_pos,
            brick_buffer_pos,
        }
    }

    /// Number of populated slots
    pub fn populated_count(&self) -> usize {
        self.synapses.iter().filter(|s| s.is_populated()).count()
    }

    /// True when no slot holds a synapse
    pub fn is_empty(&self) -> bool {
        self.synapses.iter().all(|s| !s.is_populated())
    }

    /// True when the last slot of the block is occupied (growth condition)
    #[inline]
    pub fn last_slot_occupied(&self) -> bool {
        self.synapses[SYNAPSES_PER_SECTION - 1].is_populated()
    }

    /// Raise the hardening boundary; never lowers it and never exceeds the capacity
    pub fn raise_hardening(&mut self, consumed: usize) -> bool {
        let consumed = consumed.min(SYNAPSES_PER_SECTION) as u16;
        if consumed > self.hardening {
            self.hardening = consumed;
            true
        } else {
            false
        }
    }

    /// Move the populated non-hardened synapses toward `hardening`, keeping
    /// their order, and clear the freed tail. Returns the number of live
    /// synapses past the boundary.
    pub fn compact_unhardened(&mut self) -> usize {
        let start = self.hardening as usize;
        let mut write = start;
        for read in start..SYNAPSES_PER_SECTION {
            if self.synapses[read].is_populated() {
                if read != write {
                    self.synapses[write] = self.synapses[read];
                    self.synapses[read].clear();
                }
                write += 1;
            }
        }
        write - start
    }
}

impl Default for SynapseSection {
    fn default() -> Self {
        Self::new(0, 0)
    }
}
