// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use super::{write_side_slots, BorderInput, Segment, SegmentKind};
use crate::backend::ProcessingBackend;
use crate::context::CycleContext;
use crate::error::Result;
use crate::stats::CycleStats;
use hanami_npu_neural::{FlowDirection, InputNode, SegmentId};
use hanami_serialization::{ByteReader, ByteWriter};
use std::any::Any;

/// Entry point for external values; sends them downstream unchanged
#[derive(Debug, Clone)]
pub struct InputSegment {
    segment_id: SegmentId,
    nodes: Vec<InputNode>,
    output_transfers: Vec<f32>,
}

impl InputSegment {
    pub fn new(segment_id: SegmentId, number_of_nodes: usize, transfer_size: usize) -> Self {
        Self {
            segment_id,
            nodes: vec![InputNode::default(); number_of_nodes],
            output_transfers: vec![0.0; transfer_size],
        }
    }

    pub fn nodes(&self) -> &[InputNode] {
        &self.nodes
    }

    /// Overwrite node values; missing values become zero
    pub fn set_values(&mut self, values: &[f32]) {
        for (idx, node) in self.nodes.iter_mut().enumerate() {
            node.value = values.get(idx).copied().unwrap_or(0.0);
        }
    }

    pub(crate) fn decode_body(
        segment_id: SegmentId,
        reader: &mut ByteReader<'_>,
        transfer_size: usize,
    ) -> Result<Self> {
        let values = reader.read_f32_vec()?;
        let mut segment = Self::new(segment_id, values.len(), transfer_size);
        segment.set_values(&values);
        Ok(segment)
    }
}

impl Segment for InputSegment {
    fn kind(&self) -> SegmentKind {
        SegmentKind::Input
    }

    fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn map_inputs(&mut self, ctx: &CycleContext) -> CycleStats {
        if let Some(values) = ctx.batch.inputs.get(&self.segment_id) {
            self.set_values(values);
        }
        CycleStats {
            segments_processed: 1,
            ..Default::default()
        }
    }

    fn forward(
        &mut self,
        border: &BorderInput,
        _ctx: &CycleContext,
        _backend: &dyn ProcessingBackend,
    ) -> CycleStats {
        write_side_slots(
            &border.neighbors,
            FlowDirection::Output,
            &mut self.output_transfers,
            self.nodes.iter().map(|n| n.value),
        );
        CycleStats {
            segments_processed: 1,
            nodes_active: self.nodes.iter().filter(|n| n.value != 0.0).count() as u64,
            ..Default::default()
        }
    }

    fn backward(
        &mut self,
        border: &BorderInput,
        _ctx: &CycleContext,
        _backend: &dyn ProcessingBackend,
    ) -> CycleStats {
        let mut deltas = border.slots(FlowDirection::Output);
        for node in self.nodes.iter_mut() {
            node.delta = deltas.next().unwrap_or(0.0);
        }
        CycleStats {
            segments_processed: 1,
            ..Default::default()
        }
    }

    fn output_transfers_mut(&mut self) -> &mut [f32] {
        &mut self.output_transfers
    }

    fn encode_body(&self, writer: &mut ByteWriter) {
        let values: Vec<f32> = self.nodes.iter().map(|n| n.value).collect();
        writer.write_f32_slice(&values);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::context::CycleBatch;
    use hanami_npu_neural::{layout_transfer_buffers, RandomValues, SegmentNeighborList};
    use std::sync::Arc;

    #[test]
    fn test_values_flow_to_output_sides() {
        let mut neighbors = SegmentNeighborList::default();
        neighbors[9].in_use = true;
        neighbors[9].size = 3;
        neighbors[9].direction = FlowDirection::Output;
        let total = layout_transfer_buffers(&mut neighbors) as usize;

        let mut segment = InputSegment::new(SegmentId(0), 3, total);
        let batch = CycleBatch::default().with_inputs(SegmentId(0), vec![0.5, 0.0, 1.0]);
        let ctx = CycleContext::new(0, false, Arc::new(RandomValues::generate(0, 4)), batch);
        segment.map_inputs(&ctx);

        let border = BorderInput {
            neighbors,
            transfers: vec![0.0; total],
        };
        let stats = segment.forward(&border, &ctx, &CpuBackend::new());

        assert_eq!(segment.output_transfers_mut(), &[0.5, 0.0, 1.0]);
        assert_eq!(stats.nodes_active, 2);
    }
}
