// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Border Exchange
//!
//! Each segment lives in a [`SegmentCell`] with two independent locks:
//!
//! - `border`: neighbor list (with `input_ready` flags) and the input
//!   transfer buffer. Written by *other* segments during exchange.
//! - `body`: the segment itself. Held only by the worker processing it.
//!
//! [`finish_segment`] is the only cross-segment mutation. It copies one side
//! of the source's output buffer into the matching side of the destination's
//! input buffer, zeroes the source slice and sets the destination's ready
//! flag, all under the destination border lock. A worker never holds two
//! border locks at once, and never waits on a body lock while holding a
//! border lock.

use crate::backend::ProcessingBackend;
use crate::context::{CycleContext, Phase};
use crate::error::{EngineError, Result};
use crate::segment::{BorderInput, Segment, SegmentKind};
use crate::stats::CycleStats;
use ahash::AHashMap;
use hanami_npu_neural::{
    layout_transfer_buffers, opposite_side, FlowDirection, SegmentId, SegmentNeighborList, NUMBER_OF_SIDES,
};
use parking_lot::Mutex;
use tracing::trace;

/// Border-facing half of a segment
#[derive(Debug, Clone, Default)]
pub struct BorderState {
    pub neighbors: SegmentNeighborList,
    pub input_transfers: Vec<f32>,
}

impl BorderState {
    /// Lay out the transfer buffers for `neighbors`
    pub fn new(mut neighbors: SegmentNeighborList) -> Self {
        let total = layout_transfer_buffers(&mut neighbors) as usize;
        for neighbor in neighbors.iter_mut() {
            neighbor.input_ready = false;
        }
        Self {
            neighbors,
            input_transfers: vec![0.0; total],
        }
    }

    pub fn transfer_size(&self) -> usize {
        self.input_transfers.len()
    }

    /// Every in-use side receiving in `direction` has fresh data
    pub fn is_ready(&self, direction: FlowDirection) -> bool {
        self.neighbors
            .iter()
            .filter(|n| n.in_use && n.direction == direction)
            .all(|n| n.input_ready)
    }

    /// Copy out the inputs for one phase and clear the consumed flags
    pub fn take_inputs(&mut self, direction: FlowDirection) -> BorderInput {
        let input = BorderInput {
            neighbors: self.neighbors,
            transfers: self.input_transfers.clone(),
        };
        for neighbor in self.neighbors.iter_mut() {
            if neighbor.in_use && neighbor.direction == direction {
                neighbor.input_ready = false;
            }
        }
        input
    }

    /// Drop all in-flight border data
    pub fn reset(&mut self) {
        self.input_transfers.iter_mut().for_each(|v| *v = 0.0);
        for neighbor in self.neighbors.iter_mut() {
            neighbor.input_ready = false;
        }
    }
}

pub struct SegmentCell {
    id: SegmentId,
    name: String,
    kind: SegmentKind,
    border: Mutex<BorderState>,
    body: Mutex<Box<dyn Segment>>,
}

impl SegmentCell {
    pub fn new(id: SegmentId, name: impl Into<String>, border: BorderState, body: Box<dyn Segment>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: body.kind(),
            border: Mutex::new(border),
            body: Mutex::new(body),
        }
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    pub fn border(&self) -> &Mutex<BorderState> {
        &self.border
    }

    pub fn body(&self) -> &Mutex<Box<dyn Segment>> {
        &self.body
    }

    pub fn neighbors(&self) -> SegmentNeighborList {
        self.border.lock().neighbors
    }

    pub fn is_ready(&self, phase: Phase) -> bool {
        match phase.receiving_direction() {
            Some(direction) => self.border.lock().is_ready(direction),
            None => true,
        }
    }

    /// Run `f` on the segment downcast to `T`
    pub fn with_segment<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let body = self.body.lock();
        body.as_any().downcast_ref::<T>().map(f)
    }

    pub fn with_segment_mut<T: 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut body = self.body.lock();
        body.as_any_mut().downcast_mut::<T>().map(f)
    }
}

impl std::fmt::Debug for SegmentCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentCell")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// All segments of one cluster, indexed by [`SegmentId`]
#[derive(Debug, Default)]
pub struct SegmentGraph {
    cells: Vec<SegmentCell>,
    by_name: AHashMap<String, SegmentId>,
}

impl SegmentGraph {
    /// Build a graph and check that every link is mirrored by its target.
    ///
    /// Cell `i` must carry `SegmentId(i)`.
    pub fn new(cells: Vec<SegmentCell>) -> Result<Self> {
        let mut by_name = AHashMap::with_capacity(cells.len());
        for (idx, cell) in cells.iter().enumerate() {
            if cell.id.0 as usize != idx {
                return Err(EngineError::InvalidTopology(format!(
                    "segment '{}' has id {} at position {idx}",
                    cell.name, cell.id
                )));
            }
            if by_name.insert(cell.name.clone(), cell.id).is_some() {
                return Err(EngineError::InvalidTopology(format!(
                    "duplicate segment name '{}'",
                    cell.name
                )));
            }
        }
        let graph = Self { cells, by_name };
        graph.validate_links()?;
        Ok(graph)
    }

    fn validate_links(&self) -> Result<()> {
        for cell in &self.cells {
            let neighbors = cell.neighbors();
            for (side, neighbor) in neighbors.iter().enumerate().filter(|(_, n)| n.in_use) {
                let target_id = neighbor.target_segment_id.ok_or_else(|| {
                    EngineError::InvalidTopology(format!("'{}' side {side} has no target", cell.name))
                })?;
                let target = self.cell(target_id).ok_or_else(|| {
                    EngineError::InvalidTopology(format!(
                        "'{}' side {side} targets unknown {target_id}",
                        cell.name
                    ))
                })?;
                let back = target
                    .neighbors()
                    .get(neighbor.target_side as usize)
                    .copied()
                    .unwrap_or_default();
                let mirrored = back.in_use
                    && back.target_segment_id == Some(cell.id)
                    && back.target_side as usize == side
                    && back.size == neighbor.size
                    && back.direction == neighbor.direction.reversed();
                if !mirrored {
                    return Err(EngineError::InvalidTopology(format!(
                        "'{}' side {side} is not mirrored by '{}' side {}",
                        cell.name, target.name, neighbor.target_side
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, id: SegmentId) -> Option<&SegmentCell> {
        self.cells.get(id.0 as usize)
    }

    pub fn cells(&self) -> &[SegmentCell] {
        &self.cells
    }

    pub fn find(&self, name: &str) -> Option<SegmentId> {
        self.by_name.get(name).copied()
    }

    pub fn ids_of_kind(&self, kind: SegmentKind) -> Vec<SegmentId> {
        self.cells
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.id)
            .collect()
    }

    pub fn total_nodes(&self) -> usize {
        self.cells.iter().map(|c| c.body.lock().number_of_nodes()).sum()
    }

    /// Clear all border flags and buffers, e.g. after an aborted cycle
    pub fn reset_borders(&self) {
        for cell in &self.cells {
            cell.border.lock().reset();
            let mut body = cell.body.lock();
            body.output_transfers_mut().iter_mut().for_each(|v| *v = 0.0);
        }
    }
}

/// Hand the source segment's border output to its neighbors.
///
/// Sends every in-use side whose direction equals `flow`; returns the number
/// of sides sent.
pub fn finish_segment(
    graph: &SegmentGraph,
    source: SegmentId,
    output_transfers: &mut [f32],
    flow: FlowDirection,
) -> Result<usize> {
    let neighbors = graph
        .cell(source)
        .ok_or(EngineError::SegmentNotFound(source))?
        .neighbors();

    let mut sent = 0;
    for (side, neighbor) in neighbors.iter().enumerate() {
        if !neighbor.in_use || neighbor.direction != flow {
            continue;
        }
        let Some(target_id) = neighbor.target_segment_id else {
            continue;
        };
        let target = graph.cell(target_id).ok_or(EngineError::SegmentNotFound(target_id))?;
        let source_range = neighbor.output_range();
        if source_range.end > output_transfers.len() {
            return Err(EngineError::InvalidTopology(format!(
                "{source} side {side} exceeds its output buffer"
            )));
        }

        {
            let mut border = target.border.lock();
            let target_side = neighbor.target_side as usize;
            debug_assert!(target_side < NUMBER_OF_SIDES);
            let target_range = border.neighbors[target_side].input_range();
            if target_range.len() != source_range.len() || target_range.end > border.input_transfers.len() {
                return Err(EngineError::InvalidTopology(format!(
                    "{source} side {side} does not fit {target_id} side {target_side}"
                )));
            }
            border.input_transfers[target_range].copy_from_slice(&output_transfers[source_range.clone()]);
            border.neighbors[target_side].input_ready = true;
        }
        output_transfers[source_range].iter_mut().for_each(|v| *v = 0.0);
        sent += 1;
    }
    Ok(sent)
}

/// Process one segment for one phase.
///
/// Returns `Ok(None)` when the segment's inputs for this phase are not all
/// present yet; the caller re-queues it.
pub fn process_segment(
    graph: &SegmentGraph,
    id: SegmentId,
    phase: Phase,
    ctx: &CycleContext,
    backend: &dyn ProcessingBackend,
) -> Result<Option<CycleStats>> {
    let cell = graph.cell(id).ok_or(EngineError::SegmentNotFound(id))?;

    let (receiving, sending) = match (phase.receiving_direction(), phase.sending_direction()) {
        (Some(receiving), Some(sending)) => (receiving, sending),
        _ => {
            let mut body = cell.body.lock();
            let stats = match phase {
                Phase::InputMapping => body.map_inputs(ctx),
                _ => body.finalize(ctx),
            };
            return Ok(Some(stats));
        }
    };

    let input = {
        let mut border = cell.border.lock();
        if !border.is_ready(receiving) {
            return Ok(None);
        }
        border.take_inputs(receiving)
    };

    let mut body = cell.body.lock();
    let stats = match phase {
        Phase::Backward => body.backward(&input, ctx, backend),
        _ => body.forward(&input, ctx, backend),
    };
    let sent = finish_segment(graph, id, body.output_transfers_mut(), sending)?;
    trace!(
        target: "hanami-npu-engine",
        segment = %id, %phase, sides = sent, "Segment processed"
    );
    Ok(Some(stats))
}

/// Mirror-consistent link between two segments, used when wiring graphs
pub fn link_segments(
    a: &mut SegmentNeighborList,
    a_id: SegmentId,
    side: usize,
    b: &mut SegmentNeighborList,
    b_id: SegmentId,
    size: u32,
    a_direction: FlowDirection,
) {
    let back = opposite_side(side);
    a[side].in_use = true;
    a[side].size = size;
    a[side].target_segment_id = Some(b_id);
    a[side].target_side = back as u8;
    a[side].direction = a_direction;

    b[back].in_use = true;
    b[back].size = size;
    b[back].target_segment_id = Some(a_id);
    b[back].target_side = side as u8;
    b[back].direction = a_direction.reversed();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{InputSegment, OutputSegment};

    fn pair() -> SegmentGraph {
        let mut a = SegmentNeighborList::default();
        let mut b = SegmentNeighborList::default();
        link_segments(&mut a, SegmentId(0), 2, &mut b, SegmentId(1), 3, FlowDirection::Output);

        let border_a = BorderState::new(a);
        let border_b = BorderState::new(b);
        let cells = vec![
            SegmentCell::new(
                SegmentId(0),
                "in",
                border_a.clone(),
                Box::new(InputSegment::new(SegmentId(0), 3, border_a.transfer_size())),
            ),
            SegmentCell::new(
                SegmentId(1),
                "out",
                border_b.clone(),
                Box::new(OutputSegment::new(SegmentId(1), 3, border_b.transfer_size())),
            ),
        ];
        SegmentGraph::new(cells).unwrap()
    }

    #[test]
    fn test_border_round_trip() {
        let graph = pair();
        let mut outputs = vec![0.1, 0.2, 0.3];
        let before = outputs.clone();

        assert!(!graph.cell(SegmentId(1)).unwrap().is_ready(Phase::Forward));
        let sent = finish_segment(&graph, SegmentId(0), &mut outputs, FlowDirection::Output).unwrap();

        assert_eq!(sent, 1);
        assert_eq!(outputs, vec![0.0; 3]);
        let target = graph.cell(SegmentId(1)).unwrap();
        let border = target.border().lock();
        let side = opposite_side(2);
        assert_eq!(&border.input_transfers[border.neighbors[side].input_range()], before.as_slice());
        assert!(border.neighbors[side].input_ready);
        drop(border);
        assert!(target.is_ready(Phase::Forward));
    }

    #[test]
    fn test_wrong_flow_sends_nothing() {
        let graph = pair();
        let mut outputs = vec![0.1, 0.2, 0.3];
        let sent = finish_segment(&graph, SegmentId(0), &mut outputs, FlowDirection::Input).unwrap();
        assert_eq!(sent, 0);
        assert_eq!(outputs, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_take_inputs_clears_flags() {
        let graph = pair();
        let mut outputs = vec![1.0, 1.0, 1.0];
        finish_segment(&graph, SegmentId(0), &mut outputs, FlowDirection::Output).unwrap();

        let cell = graph.cell(SegmentId(1)).unwrap();
        let input = cell.border().lock().take_inputs(FlowDirection::Input);
        assert_eq!(input.transfers, vec![1.0, 1.0, 1.0]);
        assert!(!cell.is_ready(Phase::Forward));
    }

    #[test]
    fn test_unmirrored_link_rejected() {
        let mut a = SegmentNeighborList::default();
        let mut b = SegmentNeighborList::default();
        link_segments(&mut a, SegmentId(0), 2, &mut b, SegmentId(1), 3, FlowDirection::Output);
        b[opposite_side(2)].size = 4;

        let border_a = BorderState::new(a);
        let border_b = BorderState::new(b);
        let cells = vec![
            SegmentCell::new(SegmentId(0), "in", border_a, Box::new(InputSegment::new(SegmentId(0), 3, 3))),
            SegmentCell::new(SegmentId(1), "out", border_b, Box::new(OutputSegment::new(SegmentId(1), 3, 4))),
        ];
        assert!(matches!(SegmentGraph::new(cells), Err(EngineError::InvalidTopology(_))));
    }

    #[test]
    fn test_lookup_failures_are_none() {
        let graph = pair();
        assert!(graph.cell(SegmentId(9)).is_none());
        assert!(graph.find("missing").is_none());
        assert_eq!(graph.find("out"), Some(SegmentId(1)));
    }
}
