// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Synapse Lifecycle
//!
//! Every node owns at most one chain of synapse sections. A chain is walked
//! with an energy budget `net_h` that starts at the node potential; each
//! traversed synapse consumes `border * BORDER_STEP`.
//!
//! - **Forward** ([`process_node_chain`]): traverse, create synapses in empty
//!   slots past the hardening boundary, extend the chain when a section is
//!   full and budget remains. Growth only happens while learning.
//! - **Backward** ([`compute_node_backward`]): re-walk the same synapses,
//!   accumulate the node delta and compute new weights.
//! - **Hardening** ([`harden_chain`]): raise each section's boundary to the
//!   deepest slot consumed this cycle.
//! - **Reduction** ([`reduce_chain`]): decay unhardened synapses, drop the
//!   unused ones, compact, and release empty tail sections.
//!
//! A synapse whose cost exceeds `net_h + BORDER_STEP` ends the walk, so the
//! energy consumed by one chain never exceeds `potential + BORDER_STEP`.

use crate::stats::CycleStats;
use hanami_npu_neural::{
    sigmoid, Brick, BrickKind, ItemBuffer, Node, RandomValues, SectionId, SegmentSettings, Synapse,
    SynapseSection, BORDER_SCALE, BORDER_STEP, SYNAPSES_PER_SECTION,
};
use tracing::{debug, warn};

pub type SectionBuffer = ItemBuffer<SynapseSection>;

/// Read-only inputs for synapse creation
#[derive(Debug, Clone, Copy)]
pub struct GrowthContext<'a> {
    pub settings: &'a SegmentSettings,
    pub random: &'a RandomValues,
    pub bricks: &'a [Brick],
    pub learning: bool,
}

/// New weight for one traversed synapse
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightUpdate {
    pub section: SectionId,
    pub pos: u8,
    pub weight: f32,
}

/// Backward result for one node, computed without mutating the segment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeBackward {
    pub node: usize,
    pub delta: f32,
    pub updates: Vec<WeightUpdate>,
}

/// Immutable view of a dynamic segment during the backward pass
#[derive(Debug, Clone, Copy)]
pub struct BackwardView<'a> {
    pub nodes: &'a [Node],
    pub node_kinds: &'a [BrickKind],
    pub sections: &'a SectionBuffer,
    pub settings: &'a SegmentSettings,
}

fn allocate_section(
    sections: &mut SectionBuffer,
    random_pos: u32,
    brick_buffer_pos: u32,
    stats: &mut CycleStats,
) -> Option<SectionId> {
    match sections.add_new_item(SynapseSection::new(random_pos, brick_buffer_pos)) {
        Some(id) => {
            stats.sections_allocated += 1;
            Some(SectionId(id))
        }
        None => {
            stats.arena_full_events += 1;
            debug!(
                target: "hanami-npu-engine",
                capacity = sections.max_items(),
                "Synapse section buffer full, skipping growth"
            );
            None
        }
    }
}

/// Fill `section.synapses[pos]` with a new synapse drawn from the section's
/// random cursor. Returns `false` when no valid target exists.
fn create_synapse(
    section: &mut SynapseSection,
    pos: usize,
    net_h: f32,
    source: &Brick,
    growth: &GrowthContext<'_>,
) -> bool {
    let pool = &source.possible_targets;
    if pool.is_empty() {
        return false;
    }
    let random = growth.random;
    let settings = growth.settings;
    let mut cursor = section.random_pos;

    let buffer_pos = (section.brick_buffer_pos as usize + random.next(&mut cursor) as usize) % pool.len();
    section.brick_buffer_pos = buffer_pos as u32;
    let target_brick = match growth.bricks.get(pool[buffer_pos].0 as usize) {
        Some(brick) if brick.number_of_nodes > 0 => brick,
        _ => {
            section.random_pos = cursor;
            return false;
        }
    };
    let target = target_brick.node_pos + random.next(&mut cursor) % target_brick.number_of_nodes;
    let Ok(target) = u16::try_from(target) else {
        section.random_pos = cursor;
        return false;
    };

    let mut weight = net_h * random.next_fraction(&mut cursor);
    let border = weight * BORDER_SCALE + 1.0;
    let negative =
        ((random.next(&mut cursor) % 1000) as f32) < settings.sign_negative_probability * 1000.0;
    let multiplier = (random.next(&mut cursor) % settings.multiplicator_range.max(1) + 1) as f32;
    weight *= if negative { -multiplier } else { multiplier };

    section.random_pos = cursor;
    section.synapses[pos] = Synapse {
        weight,
        border,
        target_node_id: Some(target),
        active_counter: 0,
    };
    true
}

/// Forward traversal of one active node's chain, growing it while learning
pub fn process_node_chain(
    node_index: usize,
    source_brick: &Brick,
    nodes: &mut [Node],
    sections: &mut SectionBuffer,
    growth: &GrowthContext<'_>,
    stats: &mut CycleStats,
) {
    let potential = nodes[node_index].potential;
    if potential <= 0.0 {
        return;
    }
    let settings = growth.settings;
    let can_grow = growth.learning && !source_brick.possible_targets.is_empty();

    let mut current = nodes[node_index].target_section_id;
    if current.is_none() {
        if !can_grow || potential <= settings.growth_threshold {
            return;
        }
        let random_pos = growth.random.get(node_index as u32) % growth.random.len() as u32;
        let brick_buffer_pos = growth.random.get(random_pos) % source_brick.possible_targets.len() as u32;
        current = allocate_section(sections, random_pos, brick_buffer_pos, stats);
        nodes[node_index].target_section_id = current;
    }

    let signal = sigmoid(potential);
    let mut net_h = potential;
    let mut hops = 0usize;

    while let Some(section_id) = current {
        let Some(section) = sections.get_mut(section_id.0) else {
            break;
        };

        let mut exhausted = false;
        for pos in 0..SYNAPSES_PER_SECTION {
            if net_h <= 0.0 {
                exhausted = true;
                break;
            }
            if !section.synapses[pos].is_populated() {
                if !can_grow || pos < section.hardening as usize {
                    continue;
                }
                if !create_synapse(section, pos, net_h, source_brick, growth) {
                    continue;
                }
                stats.synapses_created += 1;
            }

            let synapse = &mut section.synapses[pos];
            let cost = synapse.energy_cost();
            if cost > net_h + BORDER_STEP {
                exhausted = true;
                break;
            }
            net_h -= cost;
            synapse.mark_active();
            stats.synapses_traversed += 1;

            if let Some(target) = synapse.target_node_id.and_then(|t| nodes.get_mut(t as usize)) {
                target.input += signal * synapse.weight;
            }
        }

        if exhausted || net_h <= settings.growth_threshold || !section.last_slot_occupied() {
            break;
        }

        let next = section.next;
        let cursor = (section.random_pos, section.brick_buffer_pos);
        hops += 1;
        if hops > sections.allocated() {
            warn!(target: "hanami-npu-engine", node = node_index, hops, "Section chain does not terminate");
            break;
        }
        current = match next {
            Some(next) => Some(next),
            None if can_grow => {
                let grown = allocate_section(sections, cursor.0, cursor.1, stats);
                if let (Some(id), Some(prev)) = (grown, sections.get_mut(section_id.0)) {
                    prev.next = Some(id);
                }
                grown
            }
            None => None,
        };
    }
}

/// Visit the synapses a forward pass with `potential` traverses, in order.
///
/// Performs no growth; unpopulated slots are skipped.
pub fn walk_chain<F>(
    head: Option<SectionId>,
    potential: f32,
    growth_threshold: f32,
    sections: &SectionBuffer,
    mut visit: F,
) where
    F: FnMut(SectionId, &SynapseSection, usize),
{
    if potential <= 0.0 {
        return;
    }
    let mut net_h = potential;
    let mut current = head;
    let mut hops = 0usize;

    while let Some(section_id) = current {
        let Some(section) = sections.get(section_id.0) else {
            return;
        };
        for pos in 0..SYNAPSES_PER_SECTION {
            if net_h <= 0.0 {
                return;
            }
            let synapse = &section.synapses[pos];
            if !synapse.is_populated() {
                continue;
            }
            let cost = synapse.energy_cost();
            if cost > net_h + BORDER_STEP {
                return;
            }
            net_h -= cost;
            visit(section_id, section, pos);
        }
        if net_h <= growth_threshold || !section.last_slot_occupied() {
            return;
        }
        hops += 1;
        if hops > sections.allocated() {
            return;
        }
        current = section.next;
    }
}

/// Total energy one forward pass with `potential` consumes on a chain
pub fn consumed_energy(head: Option<SectionId>, potential: f32, growth_threshold: f32, sections: &SectionBuffer) -> f32 {
    let mut consumed = 0.0;
    walk_chain(head, potential, growth_threshold, sections, |_, section, pos| {
        consumed += section.synapses[pos].energy_cost();
    });
    consumed
}

/// Delta and weight updates for one node; reads only
pub fn compute_node_backward(node_index: usize, view: &BackwardView<'_>) -> NodeBackward {
    let node = &view.nodes[node_index];
    let mut result = NodeBackward {
        node: node_index,
        delta: 0.0,
        updates: Vec::new(),
    };
    if !node.active {
        return result;
    }

    let source_signal = sigmoid(node.potential);
    walk_chain(
        node.target_section_id,
        node.potential,
        view.settings.growth_threshold,
        view.sections,
        |section_id, section, pos| {
            let synapse = &section.synapses[pos];
            let Some(target) = synapse.target_node_id.map(usize::from) else {
                return;
            };
            let Some(target_delta) = view.nodes.get(target).map(|t| t.delta) else {
                return;
            };

            result.delta += target_delta * synapse.weight;

            let rate = view.settings.learn_rate(pos, section.hardening);
            let mut weight = synapse.weight - rate * target_delta * source_signal;

            // Fresh synapses onto output nodes must not push against the error
            let fresh = synapse.active_counter == 1;
            if fresh
                && view.node_kinds.get(target) == Some(&BrickKind::Output)
                && weight * target_delta > 0.0
            {
                weight = -weight;
            }

            if weight != synapse.weight {
                result.updates.push(WeightUpdate {
                    section: section_id,
                    pos: pos as u8,
                    weight,
                });
            }
        },
    );
    result
}

/// Write backward results into the segment
pub fn apply_backward(
    results: Vec<NodeBackward>,
    nodes: &mut [Node],
    sections: &mut SectionBuffer,
    stats: &mut CycleStats,
) {
    for result in results {
        if let Some(node) = nodes.get_mut(result.node) {
            node.delta = result.delta;
        }
        for update in result.updates {
            if let Some(section) = sections.get_mut(update.section.0) {
                section.synapses[update.pos as usize].weight = update.weight;
                stats.weights_updated += 1;
            }
        }
    }
}

/// Raise hardening on every section of the chain to the deepest consumed slot
pub fn harden_chain(node: &Node, sections: &mut SectionBuffer, growth_threshold: f32, stats: &mut CycleStats) {
    let mut deepest: Vec<(SectionId, usize)> = Vec::new();
    walk_chain(
        node.target_section_id,
        node.potential,
        growth_threshold,
        sections,
        |section_id, _, pos| match deepest.last_mut() {
            Some((last, depth)) if *last == section_id => *depth = pos,
            _ => deepest.push((section_id, pos)),
        },
    );

    for (section_id, pos) in deepest {
        if let Some(section) = sections.get_mut(section_id.0) {
            if section.raise_hardening(pos + 1) {
                stats.sections_hardened += 1;
            }
        }
    }
}

/// Periodic pruning of one chain.
///
/// Unhardened synapses lose `decay` from their activity counter and are
/// deleted at zero; survivors move toward the hardening boundary in order.
/// Trailing sections left empty are released and unlinked.
pub fn reduce_chain(head: &mut Option<SectionId>, sections: &mut SectionBuffer, decay: i8, stats: &mut CycleStats) {
    let mut chain: Vec<SectionId> = Vec::new();
    let mut current = *head;

    while let Some(section_id) = current {
        if chain.len() > sections.allocated() {
            break;
        }
        let Some(section) = sections.get_mut(section_id.0) else {
            break;
        };
        for synapse in section.synapses[section.hardening as usize..].iter_mut() {
            if !synapse.is_populated() {
                continue;
            }
            synapse.active_counter = synapse.active_counter.saturating_sub(decay);
            if synapse.active_counter <= 0 {
                synapse.clear();
                stats.synapses_removed += 1;
            }
        }
        section.compact_unhardened();
        chain.push(section_id);
        current = section.next;
    }

    while let Some(&last) = chain.last() {
        let releasable = sections
            .get(last.0)
            .map(|s| s.is_empty() && s.next.is_none())
            .unwrap_or(false);
        if !releasable {
            break;
        }
        sections.delete_item(last.0);
        stats.sections_freed += 1;
        chain.pop();
        match chain.last() {
            Some(prev) => {
                if let Some(prev) = sections.get_mut(prev.0) {
                    prev.next = None;
                }
            }
            None => *head = None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hanami_npu_neural::{BrickId, Position};

    struct Fixture {
        bricks: Vec<Brick>,
        nodes: Vec<Node>,
        sections: SectionBuffer,
        settings: SegmentSettings,
        random: RandomValues,
    }

    /// One normal brick with a single node feeding a 4-node output brick
    fn fixture() -> Fixture {
        let mut source = Brick::new(BrickId(0), Position::new(0, 0, 0), BrickKind::Normal, 1);
        source.possible_targets = vec![BrickId(1)];
        let mut output = Brick::new(BrickId(1), Position::new(1, 0, 0), BrickKind::Output, 4);
        output.node_pos = 1;

        let settings = SegmentSettings::default();
        Fixture {
            bricks: vec![source, output],
            nodes: vec![Node::default(); 5],
            sections: SectionBuffer::new(8, 64),
            settings,
            random: RandomValues::generate(3, 1024),
        }
    }

    fn run_forward(f: &mut Fixture, potential: f32, learning: bool) -> CycleStats {
        let mut stats = CycleStats::default();
        f.nodes[0].potential = potential;
        f.nodes[0].active = true;
        for node in f.nodes[1..].iter_mut() {
            node.input = 0.0;
        }
        let growth = GrowthContext {
            settings: &f.settings,
            random: &f.random,
            bricks: &f.bricks,
            learning,
        };
        let source = f.bricks[0].clone();
        process_node_chain(0, &source, &mut f.nodes, &mut f.sections, &growth, &mut stats);
        stats
    }

    fn synapse(target: u16, weight: f32, counter: i8) -> Synapse {
        Synapse {
            weight,
            border: weight.abs() * BORDER_SCALE + 1.0,
            target_node_id: Some(target),
            active_counter: counter,
        }
    }

    #[test]
    fn test_growth_creates_synapses_onto_candidate_targets() {
        let mut f = fixture();
        let stats = run_forward(&mut f, 2.0, true);

        assert!(stats.synapses_created > 0);
        assert_eq!(stats.sections_allocated, 1);
        let head = f.nodes[0].target_section_id.unwrap();
        let section = f.sections.get(head.0).unwrap();
        for synapse in section.synapses.iter().filter(|s| s.is_populated()) {
            let target = synapse.target_node_id.unwrap();
            assert!((1..5).contains(&target));
            assert_eq!(synapse.active_counter, 1);
        }
        assert!(f.nodes[1..].iter().any(|n| n.input != 0.0));
    }

    #[test]
    fn test_no_growth_without_learning() {
        let mut f = fixture();
        let stats = run_forward(&mut f, 2.0, false);
        assert_eq!(stats.synapses_created, 0);
        assert_eq!(f.sections.number_of_items(), 0);
        assert!(f.nodes[0].target_section_id.is_none());
    }

    #[test]
    fn test_energy_bound_holds_across_cycles() {
        let mut f = fixture();
        for (cycle, potential) in [0.3f32, 2.0, 0.05, 5.0, 1.0, 0.7].iter().enumerate() {
            run_forward(&mut f, *potential, cycle % 2 == 0);
            let consumed = consumed_energy(
                f.nodes[0].target_section_id,
                *potential,
                f.settings.growth_threshold,
                &f.sections,
            );
            assert!(
                consumed <= potential + BORDER_STEP + 1e-5,
                "consumed {consumed} with potential {potential}"
            );
        }
    }

    #[test]
    fn test_full_section_chains_into_next() {
        let mut f = fixture();
        let head = f.sections.add_new_item(SynapseSection::new(0, 0)).unwrap();
        for slot in f.sections.get_mut(head).unwrap().synapses.iter_mut() {
            *slot = synapse(1, 0.01, 1);
        }
        f.nodes[0].target_section_id = Some(SectionId(head));

        let stats = run_forward(&mut f, 1.0, true);

        let section = f.sections.get(head).unwrap();
        assert_eq!(section.populated_count(), SYNAPSES_PER_SECTION);
        let next = section.next.expect("chain should extend");
        assert!(f.sections.get(next.0).unwrap().populated_count() > 0);
        assert_eq!(stats.sections_allocated, 1);
    }

    #[test]
    fn test_cyclic_chain_stops_after_bounded_hops() {
        let mut f = fixture();
        let head = f.sections.add_new_item(SynapseSection::new(0, 0)).unwrap();
        {
            let section = f.sections.get_mut(head).unwrap();
            for slot in section.synapses.iter_mut() {
                *slot = Synapse {
                    weight: 0.1,
                    border: 0.0,
                    target_node_id: Some(1),
                    active_counter: 1,
                };
            }
            section.next = Some(SectionId(head));
        }
        f.nodes[0].target_section_id = Some(SectionId(head));

        let stats = run_forward(&mut f, 1.0, false);

        let bound = (f.sections.allocated() + 1) * SYNAPSES_PER_SECTION;
        assert!(stats.synapses_traversed as usize <= bound);
        assert!(stats.synapses_traversed as usize >= SYNAPSES_PER_SECTION);
    }

    #[test]
    fn test_partial_section_does_not_chain() {
        let mut f = fixture();
        let head = f.sections.add_new_item(SynapseSection::new(0, 0)).unwrap();
        {
            let section = f.sections.get_mut(head).unwrap();
            section.synapses[0] = synapse(1, 0.01, 1);
            section.hardening = SYNAPSES_PER_SECTION as u16;
        }
        f.nodes[0].target_section_id = Some(SectionId(head));

        run_forward(&mut f, 1.0, true);

        assert!(f.sections.get(head).unwrap().next.is_none());
        assert_eq!(f.sections.number_of_items(), 1);
    }

    #[test]
    fn test_arena_full_degrades() {
        let mut f = fixture();
        f.sections = SectionBuffer::new(1, 0);
        let stats = run_forward(&mut f, 2.0, true);
        assert_eq!(stats.arena_full_events, 1);
        assert_eq!(stats.synapses_created, 0);
        assert!(f.nodes[0].target_section_id.is_none());
    }

    #[test]
    fn test_hardening_is_monotonic_across_cycles() {
        let mut f = fixture();
        let mut previous: Vec<u16> = Vec::new();
        for potential in [2.0f32, 0.2, 3.0, 0.01, 1.5] {
            run_forward(&mut f, potential, true);
            let mut stats = CycleStats::default();
            let node = f.nodes[0];
            harden_chain(&node, &mut f.sections, f.settings.growth_threshold, &mut stats);

            let current: Vec<u16> = f.sections.iter_active().map(|(_, s)| s.hardening).collect();
            for (before, after) in previous.iter().zip(current.iter()) {
                assert!(after >= before);
            }
            for (_, section) in f.sections.iter_active() {
                assert!(section.hardening as usize <= SYNAPSES_PER_SECTION);
            }
            previous = current;
        }
        assert!(previous.iter().any(|h| *h > 0));
    }

    #[test]
    fn test_backward_moves_weights_against_error() {
        let mut f = fixture();
        let head = f.sections.add_new_item(SynapseSection::new(0, 0)).unwrap();
        f.sections.get_mut(head).unwrap().synapses[0] = synapse(1, 0.2, 5);
        f.nodes[0].target_section_id = Some(SectionId(head));
        f.nodes[0].potential = 1.0;
        f.nodes[0].active = true;
        f.nodes[1].delta = 0.5;

        let kinds = vec![BrickKind::Normal, BrickKind::Output, BrickKind::Output, BrickKind::Output, BrickKind::Output];
        let view = BackwardView {
            nodes: &f.nodes,
            node_kinds: &kinds,
            sections: &f.sections,
            settings: &f.settings,
        };
        let result = compute_node_backward(0, &view);

        assert!((result.delta - 0.1).abs() < 1e-6);
        assert_eq!(result.updates.len(), 1);
        assert!(result.updates[0].weight < 0.2);

        let mut stats = CycleStats::default();
        apply_backward(vec![result], &mut f.nodes, &mut f.sections, &mut stats);
        assert_eq!(stats.weights_updated, 1);
        assert!(f.sections.get(head).unwrap().synapses[0].weight < 0.2);
        assert!((f.nodes[0].delta - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_fresh_output_synapse_flips_sign() {
        let mut f = fixture();
        let head = f.sections.add_new_item(SynapseSection::new(0, 0)).unwrap();
        f.sections.get_mut(head).unwrap().synapses[0] = synapse(1, 0.3, 1);
        f.nodes[0].target_section_id = Some(SectionId(head));
        f.nodes[0].potential = 1.0;
        f.nodes[0].active = true;
        f.nodes[1].delta = 0.01;

        let kinds = vec![BrickKind::Normal, BrickKind::Output, BrickKind::Output, BrickKind::Output, BrickKind::Output];
        let view = BackwardView {
            nodes: &f.nodes,
            node_kinds: &kinds,
            sections: &f.sections,
            settings: &f.settings,
        };
        let result = compute_node_backward(0, &view);
        assert!(result.updates[0].weight < 0.0);
    }

    #[test]
    fn test_inactive_node_has_no_backward_effect() {
        let f = fixture();
        let kinds = vec![BrickKind::Normal; 5];
        let view = BackwardView {
            nodes: &f.nodes,
            node_kinds: &kinds,
            sections: &f.sections,
            settings: &f.settings,
        };
        assert_eq!(compute_node_backward(0, &view), NodeBackward::default());
    }

    #[test]
    fn test_reduction_prunes_unhardened_and_releases_tail() {
        let mut sections = SectionBuffer::new(4, 16);
        let head = sections.add_new_item(SynapseSection::new(0, 0)).unwrap();
        let tail = sections.add_new_item(SynapseSection::new(0, 0)).unwrap();
        {
            let section = sections.get_mut(head).unwrap();
            section.synapses[0] = synapse(1, 0.1, 1);
            section.synapses[1] = synapse(2, 0.1, 1);
            section.synapses[2] = synapse(3, 0.1, 9);
            section.synapses[3] = synapse(4, 0.1, 1);
            section.hardening = 1;
            section.next = Some(SectionId(tail));
        }
        sections.get_mut(tail).unwrap().synapses[5] = synapse(1, 0.1, 2);

        let mut chain_head = Some(SectionId(head));
        let mut stats = CycleStats::default();
        reduce_chain(&mut chain_head, &mut sections, 2, &mut stats);

        assert_eq!(stats.synapses_removed, 3);
        assert_eq!(stats.sections_freed, 1);
        assert!(!sections.is_active(tail));
        let section = sections.get(head).unwrap();
        assert!(section.next.is_none());
        assert_eq!(section.synapses[0].target_node_id, Some(1));
        assert_eq!(section.synapses[1].target_node_id, Some(3));
        assert_eq!(section.synapses[1].active_counter, 7);
        assert_eq!(section.populated_count(), 2);
        assert_eq!(chain_head, Some(SectionId(head)));
    }

    #[test]
    fn test_reduction_releases_empty_head() {
        let mut sections = SectionBuffer::new(4, 16);
        let head = sections.add_new_item(SynapseSection::new(0, 0)).unwrap();
        sections.get_mut(head).unwrap().synapses[0] = synapse(1, 0.1, 1);

        let mut chain_head = Some(SectionId(head));
        let mut stats = CycleStats::default();
        reduce_chain(&mut chain_head, &mut sections, 2, &mut stats);

        assert_eq!(chain_head, None);
        assert_eq!(sections.number_of_items(), 0);
    }
}
