// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Deterministic random table
//!
//! Growth decisions read from a table generated once per cluster from a seed.
//! Every synapse section keeps its own cursor into the table, so the values a
//! section sees do not depend on which worker thread processes it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default length of the random table
pub const NUMBER_OF_RAND_VALUES: usize = 1 << 14;

/// Seeded table of random `u32` values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomValues {
    seed: u64,
    values: Vec<u32>,
}

impl RandomValues {
    /// Generate `count` values from `seed`
    pub fn generate(seed: u64, count: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let values = (0..count.max(1)).map(|_| rng.gen::<u32>()).collect();
        Self { seed, values }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::generate(seed, NUMBER_OF_RAND_VALUES)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `pos`, wrapping around the table
    #[inline]
    pub fn get(&self, pos: u32) -> u32 {
        self.values[pos as usize % self.values.len()]
    }

    /// Advance `cursor` and return the value it now points at
    #[inline]
    pub fn next(&self, cursor: &mut u32) -> u32 {
        *cursor = ((*cursor as usize + 1) % self.values.len()) as u32;
        self.values[*cursor as usize]
    }

    /// Advance `cursor` and map the value into `[0, 1)` with 1/1024 resolution
    #[inline]
    pub fn next_fraction(&self, cursor: &mut u32) -> f32 {
        (self.next(cursor) % 1024) as f32 / 1024.0
    }
}
