// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Hanami Neural Data Model
//!
//! Everything a segment is made of, with no processing logic attached:
//! - **Types**: nodes, synapses, synapse sections, bricks, segment neighbors
//! - **Item buffer**: block-allocated arena with stable slot ids and a free list
//! - **Random**: seeded lookup table consumed through per-section cursors
//! - **Activation**: the saturating nonlinearity shared by forward and backward passes
//!
//! Processing lives in `hanami-npu-engine`; this crate only defines the layout
//! and the invariants of the data it processes.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod activation;
pub mod item_buffer;
pub mod random;
pub mod types;

pub use activation::{sigmoid, sigmoid_derivative};
pub use item_buffer::ItemBuffer;
pub use random::{RandomValues, NUMBER_OF_RAND_VALUES};
pub use types::*;
