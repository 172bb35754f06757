// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Segment neighbor slots: one per side, describing a border connection

use super::brick::NUMBER_OF_SIDES;
use super::ids::SegmentId;

/// Direction in which forward data crosses a border side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FlowDirection {
    /// Forward values arrive through this side
    #[default]
    Input,
    /// Forward values leave through this side
    Output,
}

impl FlowDirection {
    pub fn to_u8(self) -> u8 {
        match self {
            FlowDirection::Input => 0,
            FlowDirection::Output => 1,
        }
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(FlowDirection::Input),
            1 => Some(FlowDirection::Output),
            _ => None,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            FlowDirection::Input => FlowDirection::Output,
            FlowDirection::Output => FlowDirection::Input,
        }
    }
}

/// Border connection of one segment side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentNeighbor {
    pub in_use: bool,
    /// Number of floats exchanged through this side
    pub size: u32,
    pub target_segment_id: Option<SegmentId>,
    /// Side of the target segment this side is wired to
    pub target_side: u8,
    pub direction: FlowDirection,
    /// Offset of this side's slice in the input transfer buffer
    pub input_transfer_buffer_pos: u32,
    /// Offset of this side's slice in the output transfer buffer
    pub output_transfer_buffer_pos: u32,
    /// Set by the producing segment, cleared by the consuming segment
    pub input_ready: bool,
}

impl SegmentNeighbor {
    /// Input slice range of this side
    #[inline]
    pub fn input_range(&self) -> core::ops::Range<usize> {
        let start = self.input_transfer_buffer_pos as usize;
        start..start + self.size as usize
    }

    /// Output slice range of this side
    #[inline]
    pub fn output_range(&self) -> core::ops::Range<usize> {
        let start = self.output_transfer_buffer_pos as usize;
        start..start + self.size as usize
    }
}

/// The 12 neighbor slots of a segment
pub type SegmentNeighborList = [SegmentNeighbor; NUMBER_OF_SIDES];

/// Assign contiguous transfer buffer positions to every in-use side and
/// return the total border size
pub fn layout_transfer_buffers(neighbors: &mut SegmentNeighborList) -> u32 {
    let mut pos = 0u32;
    for neighbor in neighbors.iter_mut() {
        if !neighbor.in_use {
            continue;
        }
        neighbor.input_transfer_buffer_pos = pos;
        neighbor.output_transfer_buffer_pos = pos;
        pos += neighbor.size;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_contiguous() {
        let mut neighbors = SegmentNeighborList::default();
        neighbors[2].in_use = true;
        neighbors[2].size = 4;
        neighbors[9].in_use = true;
        neighbors[9].size = 2;

        let total = layout_transfer_buffers(&mut neighbors);

        assert_eq!(total, 6);
        assert_eq!(neighbors[2].input_range(), 0..4);
        assert_eq!(neighbors[9].output_range(), 4..6);
    }

    #[test]
    fn test_direction_codes() {
        assert_eq!(FlowDirection::from_u8(FlowDirection::Output.to_u8()), Some(FlowDirection::Output));
        assert_eq!(FlowDirection::Input.reversed(), FlowDirection::Output);
        assert_eq!(FlowDirection::from_u8(3), None);
    }
}
