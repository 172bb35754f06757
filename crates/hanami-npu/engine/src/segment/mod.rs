// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Segments
//!
//! A segment is the unit the phase scheduler hands to a worker. All three
//! kinds share one interface:
//!
//! | kind    | input mapping        | forward                        | backward                          |
//! |---------|----------------------|--------------------------------|-----------------------------------|
//! | input   | takes external values| sends values downstream        | receives deltas                   |
//! | dynamic | -                    | node + synapse processing      | learning, sends deltas upstream   |
//! | output  | takes expected values| receives values                | computes and sends output deltas  |
//!
//! Border data arrives as a [`BorderInput`] copied out of the segment's
//! border state; results leave through the segment's output transfer buffer.

mod dynamic;
mod input;
mod output;

pub use dynamic::DynamicSegment;
pub use input::InputSegment;
pub use output::OutputSegment;

use crate::backend::ProcessingBackend;
use crate::context::CycleContext;
use crate::stats::CycleStats;
use hanami_npu_neural::{FlowDirection, SegmentNeighborList};
use hanami_serialization::{ByteWriter, SegmentRecordType};
use std::any::Any;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Input,
    Dynamic,
    Output,
}

impl SegmentKind {
    pub fn record_type(self) -> SegmentRecordType {
        match self {
            SegmentKind::Input => SegmentRecordType::Input,
            SegmentKind::Dynamic => SegmentRecordType::Dynamic,
            SegmentKind::Output => SegmentRecordType::Output,
        }
    }

    pub fn from_record_type(record_type: SegmentRecordType) -> Self {
        match record_type {
            SegmentRecordType::Input => SegmentKind::Input,
            SegmentRecordType::Dynamic => SegmentKind::Dynamic,
            SegmentRecordType::Output => SegmentKind::Output,
        }
    }
}

impl Display for SegmentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.record_type())
    }
}

/// Border data a segment consumes in one phase
#[derive(Debug, Clone, Default)]
pub struct BorderInput {
    pub neighbors: SegmentNeighborList,
    pub transfers: Vec<f32>,
}

impl BorderInput {
    /// Concatenated slots of every in-use side with `direction`, in side order
    pub fn slots(&self, direction: FlowDirection) -> impl Iterator<Item = f32> + '_ {
        self.neighbors
            .iter()
            .filter(move |n| n.in_use && n.direction == direction)
            .flat_map(move |n| self.transfers[n.input_range()].iter().copied())
    }
}

/// Write `values` into the output slots of every in-use side with
/// `direction`, in side order. Missing values are written as zero.
pub(crate) fn write_side_slots(
    neighbors: &SegmentNeighborList,
    direction: FlowDirection,
    output_transfers: &mut [f32],
    values: impl IntoIterator<Item = f32>,
) {
    let mut values = values.into_iter();
    for neighbor in neighbors.iter().filter(|n| n.in_use && n.direction == direction) {
        for slot in &mut output_transfers[neighbor.output_range()] {
            *slot = values.next().unwrap_or(0.0);
        }
    }
}

/// Common interface of input, dynamic and output segments
pub trait Segment: Send + std::fmt::Debug {
    fn kind(&self) -> SegmentKind;

    fn number_of_nodes(&self) -> usize;

    /// Apply external values for this cycle
    fn map_inputs(&mut self, _ctx: &CycleContext) -> CycleStats {
        CycleStats::default()
    }

    fn forward(
        &mut self,
        border: &BorderInput,
        ctx: &CycleContext,
        backend: &dyn ProcessingBackend,
    ) -> CycleStats;

    fn backward(
        &mut self,
        border: &BorderInput,
        ctx: &CycleContext,
        backend: &dyn ProcessingBackend,
    ) -> CycleStats;

    /// End-of-cycle bookkeeping (hardening, reduction)
    fn finalize(&mut self, _ctx: &CycleContext) -> CycleStats {
        CycleStats::default()
    }

    /// Buffer drained by border exchange after forward/backward
    fn output_transfers_mut(&mut self) -> &mut [f32];

    /// Kind-specific persisted body
    fn encode_body(&self, writer: &mut ByteWriter);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neighbors() -> SegmentNeighborList {
        let mut list = SegmentNeighborList::default();
        list[1].in_use = true;
        list[1].size = 2;
        list[1].direction = FlowDirection::Output;
        list[7].in_use = true;
        list[7].size = 3;
        list[7].direction = FlowDirection::Output;
        list[4].in_use = true;
        list[4].size = 1;
        list[4].direction = FlowDirection::Input;
        hanami_npu_neural::layout_transfer_buffers(&mut list);
        list
    }

    #[test]
    fn test_side_slots_follow_side_order() {
        let neighbors = neighbors();
        let mut out = vec![0.0; 6];
        write_side_slots(&neighbors, FlowDirection::Output, &mut out, [1.0, 2.0, 3.0, 4.0]);
        // side 1 -> 0..2, side 4 -> 2..3 (input), side 7 -> 3..6
        assert_eq!(out, vec![1.0, 2.0, 0.0, 3.0, 4.0, 0.0]);

        let border = BorderInput {
            neighbors,
            transfers: vec![9.0, 8.0, 7.0, 6.0, 5.0, 4.0],
        };
        let inputs: Vec<f32> = border.slots(FlowDirection::Input).collect();
        assert_eq!(inputs, vec![7.0]);
    }

    #[test]
    fn test_kind_record_mapping() {
        for kind in [SegmentKind::Input, SegmentKind::Dynamic, SegmentKind::Output] {
            assert_eq!(SegmentKind::from_record_type(kind.record_type()), kind);
        }
        assert_eq!(SegmentKind::Dynamic.to_string(), "dynamic");
    }
}
