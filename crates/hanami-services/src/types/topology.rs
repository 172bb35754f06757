// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Declarative cluster topology.

A topology document lists segments in declaration order. Links are declared
on the sending segment: side `s` of the sender is wired to side `11 - s` of
the target. Border sizes are derived from the nodes on each end unless given
explicitly, and both ends must agree.

```json
{
  "segments": [
    { "name": "in", "type": "input", "number_of_nodes": 4,
      "outputs": [ { "side": 2, "target": "hidden" } ] },
    { "name": "hidden", "type": "dynamic",
      "bricks": [
        { "position": [1, 1, 1], "kind": "input", "number_of_nodes": 4, "border_side": 9 },
        { "position": [2, 1, 1], "number_of_nodes": 4 },
        { "position": [3, 1, 1], "kind": "output", "number_of_nodes": 2, "border_side": 2 }
      ],
      "outputs": [ { "side": 2, "target": "out" } ] },
    { "name": "out", "type": "output", "number_of_nodes": 2 }
  ]
}
```
*/

use crate::types::errors::{ServiceError, ServiceResult};
use ahash::{AHashMap, AHashSet};
use hanami_npu_engine::{
    link_segments, BorderState, DynamicSegment, InputSegment, OutputSegment, Segment, SegmentCell,
    SegmentGraph, SegmentKind,
};
use hanami_npu_neural::{
    opposite_side, Brick, BrickId, BrickKind, FlowDirection, Position, SegmentId, SegmentNeighborList,
    SegmentSettings, NUMBER_OF_SIDES,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Largest node count a single segment may declare
pub const MAX_SEGMENT_NODES: u32 = u16::MAX as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentType {
    Input,
    Dynamic,
    Output,
}

impl From<SegmentType> for SegmentKind {
    fn from(value: SegmentType) -> Self {
        match value {
            SegmentType::Input => SegmentKind::Input,
            SegmentType::Dynamic => SegmentKind::Dynamic,
            SegmentType::Output => SegmentKind::Output,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrickDescription {
    pub position: [i32; 3],
    #[serde(default)]
    pub kind: BrickKind,
    pub number_of_nodes: u32,
    /// Segment side an input or output brick exchanges values through
    #[serde(default)]
    pub border_side: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDescription {
    pub side: u8,
    pub target: String,
    /// Border size; derived from the sending end when absent
    #[serde(default)]
    pub size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub segment_type: SegmentType,
    /// Grid position; when both ends of a link have one they must be adjacent
    #[serde(default)]
    pub position: Option<[i32; 3]>,
    /// Node count of input and output segments
    #[serde(default)]
    pub number_of_nodes: u32,
    /// Bricks of a dynamic segment, in processing order
    #[serde(default)]
    pub bricks: Vec<BrickDescription>,
    #[serde(default)]
    pub outputs: Vec<LinkDescription>,
}

impl SegmentDescription {
    pub fn node_count(&self) -> u64 {
        match self.segment_type {
            SegmentType::Dynamic => self.bricks.iter().map(|b| b.number_of_nodes as u64).sum(),
            SegmentType::Input | SegmentType::Output => self.number_of_nodes as u64,
        }
    }

    /// Nodes of bricks of `kind` bound to `side`
    fn bound_nodes(&self, kind: BrickKind, side: usize) -> u32 {
        self.bricks
            .iter()
            .filter(|b| b.kind == kind && b.border_side == Some(side as u8))
            .map(|b| b.number_of_nodes)
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyDescription {
    #[serde(default)]
    pub name: Option<String>,
    pub segments: Vec<SegmentDescription>,
}

/// A validated link between two segments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResolvedLink {
    source: usize,
    side: usize,
    target: usize,
    size: u32,
}

fn invalid(msg: impl Into<String>) -> ServiceError {
    ServiceError::InvalidTopology(msg.into())
}

impl TopologyDescription {
    pub fn from_json(json: &str) -> ServiceResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_value(value: serde_json::Value) -> ServiceResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> ServiceResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ServiceError::Internal(e.to_string()))
    }

    /// Check the document without building anything
    pub fn validate(&self) -> ServiceResult<()> {
        self.resolve().map(|_| ())
    }

    fn resolve(&self) -> ServiceResult<Vec<ResolvedLink>> {
        if self.segments.is_empty() {
            return Err(invalid("topology declares no segments"));
        }

        let mut index: AHashMap<&str, usize> = AHashMap::with_capacity(self.segments.len());
        for (idx, segment) in self.segments.iter().enumerate() {
            if index.insert(segment.name.as_str(), idx).is_some() {
                return Err(invalid(format!("duplicate segment name '{}'", segment.name)));
            }
            self.check_segment(segment)?;
        }

        let mut used_sides: AHashSet<(usize, usize)> = AHashSet::new();
        let mut links = Vec::new();
        for (source, segment) in self.segments.iter().enumerate() {
            for link in &segment.outputs {
                let resolved = self.resolve_link(source, segment, link, &index)?;
                let back = opposite_side(resolved.side);
                if !used_sides.insert((source, resolved.side)) {
                    return Err(invalid(format!(
                        "side {} of '{}' is linked twice",
                        resolved.side, segment.name
                    )));
                }
                if !used_sides.insert((resolved.target, back)) {
                    return Err(invalid(format!(
                        "side {back} of '{}' is linked twice",
                        self.segments[resolved.target].name
                    )));
                }
                links.push(resolved);
            }
        }

        self.check_border_totals(&links)?;
        self.check_acyclic(&links)?;
        Ok(links)
    }

    fn check_segment(&self, segment: &SegmentDescription) -> ServiceResult<()> {
        let nodes = segment.node_count();
        if nodes == 0 {
            return Err(invalid(format!("segment '{}' has no nodes", segment.name)));
        }
        if nodes > MAX_SEGMENT_NODES as u64 {
            return Err(invalid(format!(
                "segment '{}' declares {nodes} nodes, at most {MAX_SEGMENT_NODES} are allowed",
                segment.name
            )));
        }
        match segment.segment_type {
            SegmentType::Dynamic => {
                for brick in &segment.bricks {
                    match (brick.kind, brick.border_side) {
                        (BrickKind::Normal, Some(side)) => {
                            return Err(invalid(format!(
                                "normal brick of '{}' is bound to side {side}",
                                segment.name
                            )))
                        }
                        (BrickKind::Input | BrickKind::Output, None) => {
                            return Err(invalid(format!(
                                "{:?} brick of '{}' has no border side",
                                brick.kind, segment.name
                            )))
                        }
                        (_, Some(side)) if side as usize >= NUMBER_OF_SIDES => {
                            return Err(invalid(format!(
                                "brick of '{}' is bound to invalid side {side}",
                                segment.name
                            )))
                        }
                        _ => {}
                    }
                }
            }
            SegmentType::Input | SegmentType::Output => {
                if !segment.bricks.is_empty() {
                    return Err(invalid(format!(
                        "only dynamic segments declare bricks, '{}' is {:?}",
                        segment.name, segment.segment_type
                    )));
                }
            }
        }
        if segment.segment_type == SegmentType::Output && !segment.outputs.is_empty() {
            return Err(invalid(format!("output segment '{}' cannot send", segment.name)));
        }
        Ok(())
    }

    fn resolve_link(
        &self,
        source: usize,
        segment: &SegmentDescription,
        link: &LinkDescription,
        index: &AHashMap<&str, usize>,
    ) -> ServiceResult<ResolvedLink> {
        let side = link.side as usize;
        if side >= NUMBER_OF_SIDES {
            return Err(invalid(format!("'{}' links through invalid side {side}", segment.name)));
        }
        let target = *index.get(link.target.as_str()).ok_or_else(|| {
            invalid(format!("'{}' links to unknown segment '{}'", segment.name, link.target))
        })?;
        if target == source {
            return Err(invalid(format!("'{}' links to itself", segment.name)));
        }
        let receiver = &self.segments[target];
        if receiver.segment_type == SegmentType::Input {
            return Err(invalid(format!(
                "'{}' links into input segment '{}'",
                segment.name, receiver.name
            )));
        }

        if let (Some(a), Some(b)) = (segment.position, receiver.position) {
            let expected = Position::new(a[0], a[1], a[2]).neighbor(side);
            if expected != Position::new(b[0], b[1], b[2]) {
                return Err(invalid(format!(
                    "'{}' is not adjacent to '{}' through side {side}",
                    receiver.name, segment.name
                )));
            }
        }

        let sent = match segment.segment_type {
            SegmentType::Input => segment.number_of_nodes,
            SegmentType::Dynamic => segment.bound_nodes(BrickKind::Output, side),
            SegmentType::Output => 0,
        };
        let size = link.size.unwrap_or(sent);
        if size == 0 {
            return Err(invalid(format!(
                "side {side} of '{}' sends nothing; bind an output brick to it",
                segment.name
            )));
        }
        if segment.segment_type == SegmentType::Dynamic && sent != size {
            return Err(invalid(format!(
                "size mismatch on side {side} of '{}': link size {size}, output bricks hold {sent}",
                segment.name
            )));
        }
        if receiver.segment_type == SegmentType::Dynamic {
            let received = receiver.bound_nodes(BrickKind::Input, opposite_side(side));
            if received != size {
                return Err(invalid(format!(
                    "size mismatch on side {} of '{}': link size {size}, input bricks hold {received}",
                    opposite_side(side),
                    receiver.name
                )));
            }
        }

        Ok(ResolvedLink {
            source,
            side,
            target,
            size,
        })
    }

    /// Input segments send all their nodes; output segments receive exactly theirs
    fn check_border_totals(&self, links: &[ResolvedLink]) -> ServiceResult<()> {
        for (idx, segment) in self.segments.iter().enumerate() {
            let (total, what) = match segment.segment_type {
                SegmentType::Input => (
                    links.iter().filter(|l| l.source == idx).map(|l| l.size).sum::<u32>(),
                    "send",
                ),
                SegmentType::Output => (
                    links.iter().filter(|l| l.target == idx).map(|l| l.size).sum::<u32>(),
                    "receive",
                ),
                SegmentType::Dynamic => continue,
            };
            if total != segment.number_of_nodes {
                return Err(invalid(format!(
                    "size mismatch: '{}' has {} nodes but its links {what} {total}",
                    segment.name, segment.number_of_nodes
                )));
            }
        }
        Ok(())
    }

    fn check_acyclic(&self, links: &[ResolvedLink]) -> ServiceResult<()> {
        let count = self.segments.len();
        let mut incoming = vec![0usize; count];
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); count];
        for link in links {
            incoming[link.target] += 1;
            outgoing[link.source].push(link.target);
        }

        let mut ready: VecDeque<usize> = (0..count).filter(|idx| incoming[*idx] == 0).collect();
        let mut visited = 0;
        while let Some(idx) = ready.pop_front() {
            visited += 1;
            for &next in &outgoing[idx] {
                incoming[next] -= 1;
                if incoming[next] == 0 {
                    ready.push_back(next);
                }
            }
        }

        if visited != count {
            let cyclic: Vec<&str> = (0..count)
                .filter(|idx| incoming[*idx] > 0)
                .map(|idx| self.segments[idx].name.as_str())
                .collect();
            return Err(invalid(format!("segment links form a cycle through {cyclic:?}")));
        }
        Ok(())
    }

    /// Validate and build the segment graph. Segment ids follow declaration order.
    pub fn build_graph(&self, settings: &SegmentSettings, seed: u64) -> ServiceResult<SegmentGraph> {
        let links = self.resolve()?;

        let mut neighbors = vec![SegmentNeighborList::default(); self.segments.len()];
        for link in &links {
            let mut a = neighbors[link.source];
            let mut b = neighbors[link.target];
            link_segments(
                &mut a,
                SegmentId(link.source as u32),
                link.side,
                &mut b,
                SegmentId(link.target as u32),
                link.size,
                FlowDirection::Output,
            );
            neighbors[link.source] = a;
            neighbors[link.target] = b;
        }

        let mut cells = Vec::with_capacity(self.segments.len());
        for ((idx, segment), neighbors) in self.segments.iter().enumerate().zip(neighbors) {
            let id = SegmentId(idx as u32);
            let border = BorderState::new(neighbors);
            let transfer_size = border.transfer_size();
            let body: Box<dyn Segment> = match segment.segment_type {
                SegmentType::Input => Box::new(InputSegment::new(
                    id,
                    segment.number_of_nodes as usize,
                    transfer_size,
                )),
                SegmentType::Output => Box::new(OutputSegment::new(
                    id,
                    segment.number_of_nodes as usize,
                    transfer_size,
                )),
                SegmentType::Dynamic => {
                    let body = DynamicSegment::new(
                        id,
                        settings.clone(),
                        build_bricks(&segment.bricks),
                        transfer_size,
                        seed,
                    )?;
                    body.validate_border(&border.neighbors)?;
                    Box::new(body)
                }
            };
            cells.push(SegmentCell::new(id, segment.name.clone(), border, body));
        }

        Ok(SegmentGraph::new(cells)?)
    }
}

/// Bricks with border offsets packed per side in declaration order
fn build_bricks(descriptions: &[BrickDescription]) -> Vec<Brick> {
    let mut offsets = [0u32; NUMBER_OF_SIDES];
    descriptions
        .iter()
        .enumerate()
        .map(|(idx, desc)| {
            let [x, y, z] = desc.position;
            let mut brick = Brick::new(
                BrickId(idx as u32),
                Position::new(x, y, z),
                desc.kind,
                desc.number_of_nodes,
            );
            if let Some(side) = desc.border_side {
                let offset = &mut offsets[side as usize];
                brick.border_side = Some(side);
                brick.border_offset = *offset;
                *offset += desc.number_of_nodes;
            }
            brick
        })
        .collect()
}
