// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Brick Topology
//!
//! Within-segment wiring of a dynamic segment:
//!
//! 1. node ranges are laid out contiguously in brick declaration order
//! 2. bricks sharing a face (one of 12 side offsets) are linked both ways
//! 3. every brick gets a bounded pool of growth-target bricks, collected by
//!    short random walks over the neighbor links
//!
//! Pools never contain input bricks or the source brick itself, never let an
//! input brick reach an output brick directly, and only hold bricks declared
//! after the source so that a single ordered pass sees every signal.

use crate::error::{EngineError, Result};
use ahash::AHashMap;
use hanami_npu_neural::{Brick, BrickId, Position, SegmentSettings, NUMBER_OF_SIDES};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

const BRICK_SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Lay out node ranges contiguously; returns the total node count
pub fn assign_node_positions(bricks: &mut [Brick]) -> Result<u32> {
    let mut pos: u64 = 0;
    for brick in bricks.iter_mut() {
        brick.node_pos = pos as u32;
        pos += brick.number_of_nodes as u64;
    }
    if pos > u16::MAX as u64 + 1 {
        return Err(EngineError::InvalidTopology(format!(
            "segment holds {pos} nodes, at most {} are addressable",
            u16::MAX as u32 + 1
        )));
    }
    Ok(pos as u32)
}

/// Link bricks whose positions differ by one side offset
pub fn link_bricks(bricks: &mut [Brick]) -> Result<()> {
    let mut by_position: AHashMap<Position, usize> = AHashMap::with_capacity(bricks.len());
    for (idx, brick) in bricks.iter().enumerate() {
        if by_position.insert(brick.position, idx).is_some() {
            return Err(EngineError::InvalidTopology(format!(
                "two bricks share position ({}, {}, {})",
                brick.position.x, brick.position.y, brick.position.z
            )));
        }
    }

    for brick in bricks.iter_mut() {
        for side in 0..NUMBER_OF_SIDES {
            brick.neighbors[side] = by_position
                .get(&brick.position.neighbor(side))
                .map(|idx| BrickId(*idx as u32));
        }
    }
    Ok(())
}

/// Fill `possible_targets` for every non-output brick.
///
/// Each brick draws from its own generator seeded from `seed` and its index,
/// so the pools are identical regardless of thread scheduling.
pub fn build_candidate_pools(bricks: &mut [Brick], settings: &SegmentSettings, seed: u64) {
    let snapshot: &[Brick] = bricks;
    let pools: Vec<Vec<BrickId>> = (0..snapshot.len())
        .into_par_iter()
        .map(|idx| {
            if snapshot[idx].is_output() {
                return Vec::new();
            }
            let brick_seed = seed ^ (idx as u64 + 1).wrapping_mul(BRICK_SEED_STRIDE);
            let mut rng = StdRng::seed_from_u64(brick_seed);
            collect_candidates(snapshot, idx, settings, &mut rng)
        })
        .collect();

    for (brick, pool) in bricks.iter_mut().zip(pools) {
        debug!(
            target: "hanami-npu-engine",
            brick = brick.id.0, candidates = pool.len(), "Built growth candidate pool"
        );
        brick.possible_targets = pool;
    }
}

fn collect_candidates(
    bricks: &[Brick],
    source_idx: usize,
    settings: &SegmentSettings,
    rng: &mut StdRng,
) -> Vec<BrickId> {
    let source = &bricks[source_idx];
    let max_steps = settings.max_walk_distance.max(1);
    let mut pool = Vec::with_capacity(settings.target_candidate_count as usize);

    for _ in 0..settings.target_candidate_count {
        let mut current = source_idx;
        let steps = 1 + rng.gen_range(0..max_steps);
        for _ in 0..steps {
            let linked: Vec<usize> = bricks[current]
                .neighbors
                .iter()
                .flatten()
                .map(|id| id.0 as usize)
                .collect();
            if linked.is_empty() {
                break;
            }
            current = linked[rng.gen_range(0..linked.len())];
        }

        if current > source_idx && source.accepts_target(&bricks[current]) {
            pool.push(BrickId(current as u32));
        }
    }
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use hanami_npu_neural::BrickKind;

    fn row(kinds: &[BrickKind]) -> Vec<Brick> {
        kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| Brick::new(BrickId(i as u32), Position::new(i as i32, 0, 0), *kind, 3))
            .collect()
    }

    #[test]
    fn test_node_positions_are_contiguous() {
        let mut bricks = row(&[BrickKind::Input, BrickKind::Normal, BrickKind::Output]);
        bricks[1].number_of_nodes = 5;
        let total = assign_node_positions(&mut bricks).unwrap();
        assert_eq!(total, 11);
        assert_eq!(bricks[1].node_range(), 3..8);
        assert_eq!(bricks[2].node_range(), 8..11);
    }

    #[test]
    fn test_too_many_nodes_rejected() {
        let mut bricks = row(&[BrickKind::Normal, BrickKind::Normal]);
        bricks[0].number_of_nodes = 40_000;
        bricks[1].number_of_nodes = 40_000;
        assert!(assign_node_positions(&mut bricks).is_err());
    }

    #[test]
    fn test_linking_is_symmetric() {
        let mut bricks = row(&[BrickKind::Input, BrickKind::Normal, BrickKind::Output]);
        link_bricks(&mut bricks).unwrap();
        // (1, 0, 0) is side 5, (-1, 0, 0) is side 6
        assert_eq!(bricks[0].neighbors[5], Some(BrickId(1)));
        assert_eq!(bricks[1].neighbors[6], Some(BrickId(0)));
        assert_eq!(bricks[1].neighbors[5], Some(BrickId(2)));
        assert_eq!(bricks[0].neighbors[6], None);
    }

    #[test]
    fn test_duplicate_position_rejected() {
        let mut bricks = row(&[BrickKind::Normal, BrickKind::Normal]);
        bricks[1].position = bricks[0].position;
        assert!(link_bricks(&mut bricks).is_err());
    }

    #[test]
    fn test_pools_respect_target_rules() {
        let mut bricks = row(&[BrickKind::Input, BrickKind::Normal, BrickKind::Normal, BrickKind::Output]);
        link_bricks(&mut bricks).unwrap();
        let settings = SegmentSettings {
            target_candidate_count: 200,
            ..Default::default()
        };
        build_candidate_pools(&mut bricks, &settings, 11);

        assert!(!bricks[0].possible_targets.is_empty());
        for id in &bricks[0].possible_targets {
            assert!(id.0 == 1 || id.0 == 2, "input brick reached {id}");
        }
        for (idx, brick) in bricks.iter().enumerate() {
            for id in &brick.possible_targets {
                assert!(id.0 as usize > idx);
            }
        }
        assert!(bricks[3].possible_targets.is_empty());
    }

    #[test]
    fn test_pools_are_deterministic() {
        let build = || {
            let mut bricks = row(&[BrickKind::Input, BrickKind::Normal, BrickKind::Output]);
            link_bricks(&mut bricks).unwrap();
            build_candidate_pools(&mut bricks, &SegmentSettings::default(), 5);
            bricks
        };
        assert_eq!(build(), build());
    }
}
