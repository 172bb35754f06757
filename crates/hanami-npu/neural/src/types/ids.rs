// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Identity types for nodes, bricks, synapse sections and segments
//!
//! All ids are segment-local indices except [`SegmentId`], which is
//! cluster-local. Persisted layouts encode an absent id as `u32::MAX`.

use core::fmt;

/// Sentinel used by fixed-layout encodings for "no id"
pub const UNSET_ID: u32 = u32::MAX;

/// Node index inside one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// Brick index inside one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BrickId(pub u32);

impl fmt::Display for BrickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Brick({})", self.0)
    }
}

/// Slot index of a synapse section inside the segment's item buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectionId(pub u32);

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Section({})", self.0)
    }
}

/// Segment index inside one cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentId(pub u32);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Segment({})", self.0)
    }
}

/// Encode an optional id for fixed-layout storage
#[inline]
pub fn encode_optional_id(id: Option<u32>) -> u32 {
    id.unwrap_or(UNSET_ID)
}

/// Decode a fixed-layout id, mapping the sentinel back to `None`
#[inline]
pub fn decode_optional_id(raw: u32) -> Option<u32> {
    if raw == UNSET_ID {
        None
    } else {
        Some(raw)
    }
}
