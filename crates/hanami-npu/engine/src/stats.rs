// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use std::ops::AddAssign;

/// Counters collected while processing segments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub segments_processed: u64,
    pub nodes_active: u64,
    pub synapses_traversed: u64,
    pub synapses_created: u64,
    pub synapses_removed: u64,
    pub sections_allocated: u64,
    pub sections_freed: u64,
    /// Growth steps skipped because the section arena was full
    pub arena_full_events: u64,
    pub weights_updated: u64,
    pub sections_hardened: u64,
}

impl AddAssign for CycleStats {
    fn add_assign(&mut self, other: Self) {
        self.segments_processed += other.segments_processed;
        self.nodes_active += other.nodes_active;
        self.synapses_traversed += other.synapses_traversed;
        self.synapses_created += other.synapses_created;
        self.synapses_removed += other.synapses_removed;
        self.sections_allocated += other.sections_allocated;
        self.sections_freed += other.sections_freed;
        self.arena_full_events += other.arena_full_events;
        self.weights_updated += other.weights_updated;
        self.sections_hardened += other.sections_hardened;
    }
}

impl CycleStats {
    /// Net change in live synapses
    pub fn synapse_delta(&self) -> i64 {
        self.synapses_created as i64 - self.synapses_removed as i64
    }
}
