// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use super::{write_side_slots, BorderInput, Segment, SegmentKind};
use crate::backend::ProcessingBackend;
use crate::context::CycleContext;
use crate::error::Result;
use crate::stats::CycleStats;
use hanami_npu_neural::{FlowDirection, OutputNode, SegmentId};
use hanami_serialization::{ByteReader, ByteWriter};
use std::any::Any;

/// Collects network outputs and, while learning, turns expected values
/// into deltas that flow back upstream
#[derive(Debug, Clone)]
pub struct OutputSegment {
    segment_id: SegmentId,
    nodes: Vec<OutputNode>,
    output_transfers: Vec<f32>,
}

impl OutputSegment {
    pub fn new(segment_id: SegmentId, number_of_nodes: usize, transfer_size: usize) -> Self {
        Self {
            segment_id,
            nodes: vec![OutputNode::default(); number_of_nodes],
            output_transfers: vec![0.0; transfer_size],
        }
    }

    pub fn nodes(&self) -> &[OutputNode] {
        &self.nodes
    }

    pub fn outputs(&self) -> Vec<f32> {
        self.nodes.iter().map(|n| n.output).collect()
    }

    pub fn set_expected(&mut self, values: &[f32]) {
        for (idx, node) in self.nodes.iter_mut().enumerate() {
            node.should = values.get(idx).copied().unwrap_or(0.0);
        }
    }

    pub(crate) fn decode_body(
        segment_id: SegmentId,
        reader: &mut ByteReader<'_>,
        transfer_size: usize,
    ) -> Result<Self> {
        let count = reader.read_u32()? as usize;
        let mut segment = Self::new(segment_id, 0, transfer_size);
        segment.nodes.reserve(count);
        for _ in 0..count {
            segment.nodes.push(OutputNode {
                output: reader.read_f32()?,
                should: reader.read_f32()?,
                delta: 0.0,
            });
        }
        Ok(segment)
    }
}

impl Segment for OutputSegment {
    fn kind(&self) -> SegmentKind {
        SegmentKind::Output
    }

    fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn map_inputs(&mut self, ctx: &CycleContext) -> CycleStats {
        if let Some(values) = ctx.batch.expected.get(&self.segment_id) {
            self.set_expected(values);
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
        let mut values = border.slots(FlowDirection::Input);
        for node in self.nodes.iter_mut() {
            node.output = values.next().unwrap_or(0.0);
            node.delta = 0.0;
        }
        CycleStats {
            segments_processed: 1,
            nodes_active: self.nodes.iter().filter(|n| n.output != 0.0).count() as u64,
            ..Default::default()
        }
    }

    fn backward(
        &mut self,
        border: &BorderInput,
        _ctx: &CycleContext,
        _backend: &dyn ProcessingBackend,
    ) -> CycleStats {
        for node in self.nodes.iter_mut() {
            node.delta = node.compute_delta();
        }
        write_side_slots(
            &border.neighbors,
            FlowDirection::Input,
            &mut self.output_transfers,
            self.nodes.iter().map(|n| n.delta),
        );
        CycleStats {
            segments_processed: 1,
            ..Default::default()
        }
    }

    fn output_transfers_mut(&mut self) -> &mut [f32] {
        &mut self.output_transfers
    }

    fn encode_body(&self, writer: &mut ByteWriter) {
        writer.write_u32(self.nodes.len() as u32);
        for node in &self.nodes {
            writer.write_f32(node.output);
            writer.write_f32(node.should);
        }
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
    fn test_deltas_flow_back_on_input_sides() {
        let mut neighbors = SegmentNeighborList::default();
        neighbors[2].in_use = true;
        neighbors[2].size = 2;
        neighbors[2].direction = FlowDirection::Input;
        let total = layout_transfer_buffers(&mut neighbors) as usize;

        let mut segment = OutputSegment::new(SegmentId(4), 2, total);
        let batch = CycleBatch::default().with_expected(SegmentId(4), vec![1.0, 0.0]);
        let ctx = CycleContext::new(0, true, Arc::new(RandomValues::generate(0, 4)), batch);
        let backend = CpuBackend::new();
        segment.map_inputs(&ctx);

        let border = BorderInput {
            neighbors,
            transfers: vec![0.25, 0.75],
        };
        segment.forward(&border, &ctx, &backend);
        assert_eq!(segment.outputs(), vec![0.25, 0.75]);

        segment.backward(&border, &ctx, &backend);
        let deltas: Vec<f32> = segment.nodes().iter().map(|n| n.delta).collect();
        assert!(deltas[0] < 0.0);
        assert!(deltas[1] > 0.0);
        assert_eq!(segment.output_transfers_mut(), deltas.as_slice());
    }
}
