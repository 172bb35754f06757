// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Dynamic Segment
//!
//! Bricks of nodes plus the synapse-section arena they grow into.
//!
//! Forward walks bricks in declaration order:
//! - input bricks take their values from the border slot they are bound to
//! - normal bricks consume accumulated input through the backend kernel
//! - output bricks squash their potential and write it to their border slot
//!
//! Active input and normal nodes then traverse (and, while learning, grow)
//! their synapse chains. Backward walks bricks in reverse; output bricks take
//! the received deltas, the rest accumulate them over their synapses.

use super::{BorderInput, Segment, SegmentKind};
use crate::backend::ProcessingBackend;
use crate::context::CycleContext;
use crate::error::{EngineError, Result};
use crate::node_processing::apply_input_value;
use crate::stats::CycleStats;
use crate::synapse_processing::{
    apply_backward, harden_chain, process_node_chain, reduce_chain, BackwardView, GrowthContext,
    SectionBuffer,
};
use crate::topology::{assign_node_positions, build_candidate_pools, link_bricks};
use hanami_npu_neural::{
    decode_optional_id, encode_optional_id, sigmoid, Brick, BrickId, BrickKind, FlowDirection, Node,
    Position, SectionId, SegmentId, SegmentNeighborList, SegmentSettings, Synapse, SynapseSection,
    SYNAPSES_PER_SECTION,
};
use hanami_serialization::{ByteReader, ByteWriter, SerializationError};
use std::any::Any;
use tracing::trace;

const NO_BORDER_SIDE: u8 = u8::MAX;

#[derive(Debug, Clone)]
pub struct DynamicSegment {
    segment_id: SegmentId,
    settings: SegmentSettings,
    bricks: Vec<Brick>,
    nodes: Vec<Node>,
    node_kinds: Vec<BrickKind>,
    sections: SectionBuffer,
    output_transfers: Vec<f32>,
}

impl DynamicSegment {
    /// Build a segment from declared bricks.
    ///
    /// Brick ids are reassigned to declaration order; node ranges, neighbor
    /// links and growth candidate pools are derived here.
    pub fn new(
        segment_id: SegmentId,
        settings: SegmentSettings,
        mut bricks: Vec<Brick>,
        transfer_size: usize,
        seed: u64,
    ) -> Result<Self> {
        for (idx, brick) in bricks.iter_mut().enumerate() {
            brick.id = BrickId(idx as u32);
        }
        let total = assign_node_positions(&mut bricks)?;
        link_bricks(&mut bricks)?;
        build_candidate_pools(&mut bricks, &settings, seed ^ segment_id.0 as u64);

        let nodes = vec![Node::new(settings.node_border); total as usize];
        let sections = SectionBuffer::new(
            settings.section_block_size as usize,
            settings.max_synapse_sections as usize,
        );
        Ok(Self::assemble(segment_id, settings, bricks, nodes, sections, transfer_size))
    }

    fn assemble(
        segment_id: SegmentId,
        settings: SegmentSettings,
        bricks: Vec<Brick>,
        nodes: Vec<Node>,
        sections: SectionBuffer,
        transfer_size: usize,
    ) -> Self {
        let mut node_kinds = vec![BrickKind::Normal; nodes.len()];
        for brick in &bricks {
            for idx in brick.node_range() {
                if let Some(kind) = node_kinds.get_mut(idx) {
                    *kind = brick.kind;
                }
            }
        }
        Self {
            segment_id,
            settings,
            bricks,
            nodes,
            node_kinds,
            sections,
            output_transfers: vec![0.0; transfer_size],
        }
    }

    pub fn segment_id(&self) -> SegmentId {
        self.segment_id
    }

    pub fn settings(&self) -> &SegmentSettings {
        &self.settings
    }

    pub fn bricks(&self) -> &[Brick] {
        &self.bricks
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn sections(&self) -> &SectionBuffer {
        &self.sections
    }

    pub fn section_count(&self) -> usize {
        self.sections.number_of_items()
    }

    pub fn synapse_count(&self) -> usize {
        self.sections
            .iter_active()
            .map(|(_, section)| section.populated_count())
            .sum()
    }

    /// Check that every bound brick fits a side of the right direction
    pub fn validate_border(&self, neighbors: &SegmentNeighborList) -> Result<()> {
        for brick in &self.bricks {
            let Some(side) = brick.border_side else {
                if brick.kind != BrickKind::Normal {
                    return Err(EngineError::InvalidTopology(format!(
                        "{} is an {:?} brick without a border side",
                        brick.id, brick.kind
                    )));
                }
                continue;
            };
            let expected = match brick.kind {
                BrickKind::Input => FlowDirection::Input,
                BrickKind::Output => FlowDirection::Output,
                BrickKind::Normal => {
                    return Err(EngineError::InvalidTopology(format!(
                        "{} is a normal brick bound to side {side}",
                        brick.id
                    )))
                }
            };
            let neighbor = neighbors.get(side as usize).ok_or_else(|| {
                EngineError::InvalidTopology(format!("{} bound to invalid side {side}", brick.id))
            })?;
            if !neighbor.in_use || neighbor.direction != expected {
                return Err(EngineError::InvalidTopology(format!(
                    "{} needs an {:?} side, side {side} is not one",
                    brick.id, expected
                )));
            }
            if brick.border_offset + brick.number_of_nodes > neighbor.size {
                return Err(EngineError::InvalidTopology(format!(
                    "{} overflows side {side} ({} + {} > {})",
                    brick.id, brick.border_offset, brick.number_of_nodes, neighbor.size
                )));
            }
        }
        Ok(())
    }

    /// Start of a brick's slots in the transfer buffers
    fn border_base(neighbors: &SegmentNeighborList, brick: &Brick) -> Option<usize> {
        let neighbor = neighbors.get(brick.border_side? as usize)?;
        if !neighbor.in_use {
            return None;
        }
        Some(neighbor.input_transfer_buffer_pos as usize + brick.border_offset as usize)
    }

    pub(crate) fn decode_body(
        segment_id: SegmentId,
        reader: &mut ByteReader<'_>,
        transfer_size: usize,
    ) -> Result<Self> {
        let settings = decode_settings(reader)?;

        let brick_count = reader.read_u32()? as usize;
        let mut bricks = Vec::with_capacity(brick_count.min(reader.remaining()));
        for idx in 0..brick_count {
            let position = Position::new(reader.read_i32()?, reader.read_i32()?, reader.read_i32()?);
            let raw_kind = reader.read_u8()?;
            let kind = BrickKind::from_u8(raw_kind).ok_or(SerializationError::InvalidValue {
                field: "brick kind",
                value: raw_kind as u64,
            })?;
            let mut brick = Brick::new(BrickId(idx as u32), position, kind, reader.read_u32()?);
            let side = reader.read_u8()?;
            brick.border_side = (side != NO_BORDER_SIDE).then_some(side);
            brick.border_offset = reader.read_u32()?;
            let target_count = reader.read_u32()? as usize;
            let mut targets = Vec::with_capacity(target_count.min(reader.remaining() / 4));
            for _ in 0..target_count {
                targets.push(BrickId(reader.read_u32()?));
            }
            brick.possible_targets = targets;
            bricks.push(brick);
        }
        let total = assign_node_positions(&mut bricks)?;
        link_bricks(&mut bricks)?;

        let node_count = reader.read_u32()? as usize;
        if node_count != total as usize {
            return Err(EngineError::Serialization(SerializationError::Decode(format!(
                "dynamic segment declares {node_count} nodes, bricks hold {total}"
            ))));
        }
        let mut nodes = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            let mut node = Node::new(reader.read_f32()?);
            node.target_section_id = decode_optional_id(reader.read_u32()?).map(SectionId);
            node.refraction_time = reader.read_u8()?;
            node.border_initialized = reader.read_bool()?;
            nodes.push(node);
        }

        let block_size = reader.read_u32()? as usize;
        let max_items = reader.read_u32()? as usize;
        let slot_count = reader.read_u32()? as usize;
        let mut slots = Vec::with_capacity(slot_count.min(reader.remaining()));
        for _ in 0..slot_count {
            if !reader.read_bool()? {
                slots.push(None);
                continue;
            }
            let mut section = SynapseSection::new(0, 0);
            section.hardening = reader.read_u16()?.min(SYNAPSES_PER_SECTION as u16);
            section.next = decode_optional_id(reader.read_u32()?).map(SectionId);
            section.random_pos = reader.read_u32()?;
            section.brick_buffer_pos = reader.read_u32()?;
            for synapse in section.synapses.iter_mut() {
                let weight = reader.read_f32()?;
                let border = reader.read_f32()?;
                let target = decode_optional_id(reader.read_u32()?);
                let active_counter = reader.read_i8()?;
                *synapse = Synapse {
                    weight,
                    border,
                    target_node_id: target.and_then(|t| u16::try_from(t).ok()),
                    active_counter,
                };
            }
            slots.push(Some(section));
        }
        let sections = SectionBuffer::from_slots(block_size, max_items, slots);

        Ok(Self::assemble(segment_id, settings, bricks, nodes, sections, transfer_size))
    }
}

impl Segment for DynamicSegment {
    fn kind(&self) -> SegmentKind {
        SegmentKind::Dynamic
    }

    fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn forward(
        &mut self,
        border: &BorderInput,
        ctx: &CycleContext,
        backend: &dyn ProcessingBackend,
    ) -> CycleStats {
        let mut stats = CycleStats {
            segments_processed: 1,
            ..Default::default()
        };
        let Self {
            settings,
            bricks,
            nodes,
            sections,
            output_transfers,
            ..
        } = self;
        let growth = GrowthContext {
            settings: &*settings,
            random: ctx.random.as_ref(),
            bricks: bricks.as_slice(),
            learning: ctx.learning,
        };

        for brick in bricks.iter() {
            let range = brick.node_range();
            let base = Self::border_base(&border.neighbors, brick);
            match brick.kind {
                BrickKind::Input => {
                    for (k, idx) in range.clone().enumerate() {
                        let value = base
                            .and_then(|b| border.transfers.get(b + k))
                            .copied()
                            .unwrap_or(0.0);
                        if apply_input_value(&mut nodes[idx], value, settings) {
                            stats.nodes_active += 1;
                        }
                    }
                }
                BrickKind::Normal => {
                    stats.nodes_active += backend.update_potentials(&mut nodes[range.clone()], settings);
                }
                BrickKind::Output => {
                    for (k, idx) in range.clone().enumerate() {
                        let node = &mut nodes[idx];
                        node.potential = settings.potential_overflow * node.input;
                        node.input = 0.0;
                        node.delta = 0.0;
                        node.active = false;
                        if let Some(slot) = base.and_then(|b| output_transfers.get_mut(b + k)) {
                            *slot = sigmoid(node.potential);
                        }
                    }
                    continue;
                }
            }

            for idx in range {
                if nodes[idx].active {
                    process_node_chain(idx, brick, nodes, sections, &growth, &mut stats);
                }
            }
        }

        trace!(
            target: "hanami-npu-engine",
            segment = %self.segment_id, active = stats.nodes_active,
            created = stats.synapses_created, "Dynamic forward"
        );
        stats
    }

    fn backward(
        &mut self,
        border: &BorderInput,
        _ctx: &CycleContext,
        backend: &dyn ProcessingBackend,
    ) -> CycleStats {
        let mut stats = CycleStats {
            segments_processed: 1,
            ..Default::default()
        };
        let Self {
            settings,
            bricks,
            nodes,
            node_kinds,
            sections,
            output_transfers,
            ..
        } = self;

        for brick in bricks.iter().rev() {
            let range = brick.node_range();
            let base = Self::border_base(&border.neighbors, brick);

            if brick.kind == BrickKind::Output {
                for (k, idx) in range.enumerate() {
                    nodes[idx].delta = base
                        .and_then(|b| border.transfers.get(b + k))
                        .copied()
                        .unwrap_or(0.0);
                }
                continue;
            }

            let results = {
                let view = BackwardView {
                    nodes: nodes.as_slice(),
                    node_kinds: node_kinds.as_slice(),
                    sections: &*sections,
                    settings: &*settings,
                };
                backend.compute_backward(range.clone(), &view)
            };
            apply_backward(results, nodes, sections, &mut stats);

            if brick.kind == BrickKind::Input {
                for (k, idx) in range.enumerate() {
                    if let Some(slot) = base.and_then(|b| output_transfers.get_mut(b + k)) {
                        *slot = nodes[idx].delta;
                    }
                }
            }
        }
        stats
    }

    fn finalize(&mut self, ctx: &CycleContext) -> CycleStats {
        let mut stats = CycleStats {
            segments_processed: 1,
            ..Default::default()
        };
        if !ctx.learning {
            return stats;
        }
        let threshold = self.settings.growth_threshold;
        for node in self.nodes.iter().filter(|n| n.active) {
            harden_chain(node, &mut self.sections, threshold, &mut stats);
        }

        let interval = self.settings.reduction_interval as u64;
        if interval > 0 && ctx.cycle > 0 && ctx.cycle % interval == 0 {
            let decay = self.settings.reduction_decay;
            for node in self.nodes.iter_mut() {
                reduce_chain(&mut node.target_section_id, &mut self.sections, decay, &mut stats);
            }
        }
        stats
    }

    fn output_transfers_mut(&mut self) -> &mut [f32] {
        &mut self.output_transfers
    }

    fn encode_body(&self, writer: &mut ByteWriter) {
        encode_settings(&self.settings, writer);

        writer.write_u32(self.bricks.len() as u32);
        for brick in &self.bricks {
            writer.write_i32(brick.position.x);
            writer.write_i32(brick.position.y);
            writer.write_i32(brick.position.z);
            writer.write_u8(brick.kind.to_u8());
            writer.write_u32(brick.number_of_nodes);
            writer.write_u8(brick.border_side.unwrap_or(NO_BORDER_SIDE));
            writer.write_u32(brick.border_offset);
            writer.write_u32(brick.possible_targets.len() as u32);
            for target in &brick.possible_targets {
                writer.write_u32(target.0);
            }
        }

        writer.write_u32(self.nodes.len() as u32);
        for node in &self.nodes {
            writer.write_f32(node.border);
            writer.write_u32(encode_optional_id(node.target_section_id.map(|s| s.0)));
            writer.write_u8(node.refraction_time);
            writer.write_bool(node.border_initialized);
        }

        writer.write_u32(self.sections.block_size() as u32);
        writer.write_u32(self.sections.max_items() as u32);
        writer.write_u32(self.sections.allocated() as u32);
        for slot in self.sections.slots() {
            let Some(section) = slot else {
                writer.write_bool(false);
                continue;
            };
            writer.write_bool(true);
            writer.write_u16(section.hardening);
            writer.write_u32(encode_optional_id(section.next.map(|s| s.0)));
            writer.write_u32(section.random_pos);
            writer.write_u32(section.brick_buffer_pos);
            for synapse in &section.synapses {
                writer.write_f32(synapse.weight);
                writer.write_f32(synapse.border);
                writer.write_u32(encode_optional_id(synapse.target_node_id.map(u32::from)));
                writer.write_i8(synapse.active_counter);
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn encode_settings(settings: &SegmentSettings, writer: &mut ByteWriter) {
    writer.write_f32(settings.potential_overflow);
    writer.write_f32(settings.node_border);
    writer.write_f32(settings.input_border_factor);
    writer.write_u8(settings.refraction_time);
    writer.write_f32(settings.sign_negative_probability);
    writer.write_u32(settings.multiplicator_range);
    writer.write_f32(settings.growth_threshold);
    writer.write_f32(settings.learn_rate_hardened);
    writer.write_f32(settings.learn_rate_fresh);
    writer.write_u32(settings.reduction_interval);
    writer.write_i8(settings.reduction_decay);
    writer.write_u32(settings.target_candidate_count);
    writer.write_u32(settings.max_walk_distance);
    writer.write_u32(settings.max_synapse_sections);
    writer.write_u32(settings.section_block_size);
}

fn decode_settings(reader: &mut ByteReader<'_>) -> Result<SegmentSettings> {
    Ok(SegmentSettings {
        potential_overflow: reader.read_f32()?,
        node_border: reader.read_f32()?,
        input_border_factor: reader.read_f32()?,
        refraction_time: reader.read_u8()?,
        sign_negative_probability: reader.read_f32()?,
        multiplicator_range: reader.read_u32()?,
        growth_threshold: reader.read_f32()?,
        learn_rate_hardened: reader.read_f32()?,
        learn_rate_fresh: reader.read_f32()?,
        reduction_interval: reader.read_u32()?,
        reduction_decay: reader.read_i8()?,
        target_candidate_count: reader.read_u32()?,
        max_walk_distance: reader.read_u32()?,
        max_synapse_sections: reader.read_u32()?,
        section_block_size: reader.read_u32()?,
    })
}
