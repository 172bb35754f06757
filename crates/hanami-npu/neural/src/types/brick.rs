// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bricks: positioned groups of nodes inside a segment
//!
//! Each brick (and each segment) has 12 sides. Side `s` faces side `11 - s`,
//! which is what makes border exchange symmetric.

use super::ids::BrickId;

/// Number of directional sides of a brick or segment
pub const NUMBER_OF_SIDES: usize = 12;

/// Grid offset reached through each side; `SIDE_OFFSETS[11 - s] == -SIDE_OFFSETS[s]`
pub const SIDE_OFFSETS: [Position; NUMBER_OF_SIDES] = [
    Position::new(0, 1, -1),
    Position::new(1, 0, -1),
    Position::new(0, 0, -1),
    Position::new(-1, 1, 0),
    Position::new(0, 1, 0),
    Position::new(1, 0, 0),
    Position::new(-1, 0, 0),
    Position::new(0, -1, 0),
    Position::new(1, -1, 0),
    Position::new(0, 0, 1),
    Position::new(-1, 0, 1),
    Position::new(0, -1, 1),
];

/// Side facing `side`
#[inline]
pub const fn opposite_side(side: usize) -> usize {
    NUMBER_OF_SIDES - 1 - side
}

/// 3D grid position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Position reached by stepping through `side`
    #[inline]
    pub fn neighbor(&self, side: usize) -> Position {
        let offset = SIDE_OFFSETS[side];
        Position::new(self.x + offset.x, self.y + offset.y, self.z + offset.z)
    }
}

/// Role of a brick inside its segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BrickKind {
    /// Reads the segment's input transfer buffer
    Input,
    #[default]
    Normal,
    /// Writes the segment's output transfer buffer
    Output,
}

impl BrickKind {
    pub fn to_u8(self) -> u8 {
        match self {
            BrickKind::Input => 1,
            BrickKind::Normal => 0,
            BrickKind::Output => 2,
        }
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(BrickKind::Normal),
            1 => Some(BrickKind::Input),
            2 => Some(BrickKind::Output),
            _ => None,
        }
    }
}

/// Positioned group of nodes with directional links to neighboring bricks
#[derive(Debug, Clone, PartialEq)]
pub struct Brick {
    pub id: BrickId,
    pub position: Position,
    pub kind: BrickKind,
    /// Segment-local neighbor per side, set while linking the segment
    pub neighbors: [Option<BrickId>; NUMBER_OF_SIDES],
    /// First node of this brick in the segment's node array
    pub node_pos: u32,
    pub number_of_nodes: u32,
    /// Segment side whose transfer buffer an input/output brick is mapped to
    pub border_side: Option<u8>,
    /// Offset of this brick's nodes inside that side's transfer slice
    pub border_offset: u32,
    /// Candidate target bricks for synapse growth
    pub possible_targets: Vec<BrickId>,
}

impl Brick {
    pub fn new(id: BrickId, position: Position, kind: BrickKind, number_of_nodes: u32) -> Self {
        Self {
            id,
            position,
            kind,
            neighbors: [None; NUMBER_OF_SIDES],
            node_pos: 0,
            number_of_nodes,
            border_side: None,
            border_offset: 0,
            possible_targets: Vec::new(),
        }
    }

    #[inline]
    pub fn is_input(&self) -> bool {
        self.kind == BrickKind::Input
    }

    #[inline]
    pub fn is_output(&self) -> bool {
        self.kind == BrickKind::Output
    }

    /// Node index range covered by this brick
    #[inline]
    pub fn node_range(&self) -> core::ops::Range<usize> {
        let start = self.node_pos as usize;
        start..start + self.number_of_nodes as usize
    }

    /// Whether a synapse from this brick may land in `target`
    pub fn accepts_target(&self, target: &Brick) -> bool {
        if target.id == self.id || target.is_input() {
            return false;
        }
        !(self.is_input() && target.is_output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_offsets_are_antisymmetric() {
        for side in 0..NUMBER_OF_SIDES {
            let a = SIDE_OFFSETS[side];
            let b = SIDE_OFFSETS[opposite_side(side)];
            assert_eq!((a.x + b.x, a.y + b.y, a.z + b.z), (0, 0, 0), "side {side}");
        }
    }

    #[test]
    fn test_neighbor_round_trip() {
        let p = Position::new(3, -2, 5);
        for side in 0..NUMBER_OF_SIDES {
            assert_eq!(p.neighbor(side).neighbor(opposite_side(side)), p);
        }
    }

    #[test]
    fn test_target_rules() {
        let input = Brick::new(BrickId(0), Position::new(0, 0, 0), BrickKind::Input, 4);
        let normal = Brick::new(BrickId(1), Position::new(1, 0, 0), BrickKind::Normal, 4);
        let output = Brick::new(BrickId(2), Position::new(2, 0, 0), BrickKind::Output, 2);

        assert!(input.accepts_target(&normal));
        assert!(!input.accepts_target(&output));
        assert!(!normal.accepts_target(&input));
        assert!(!normal.accepts_target(&normal));
        assert!(normal.accepts_target(&output));
    }

    #[test]
    fn test_kind_codes() {
        for kind in [BrickKind::Input, BrickKind::Normal, BrickKind::Output] {
            assert_eq!(BrickKind::from_u8(kind.to_u8()), Some(kind));
        }
        assert_eq!(BrickKind::from_u8(9), None);
    }
}
