// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Neural Types Module
//!
//! Core type definitions for segment processing.

pub mod brick;
pub mod error;
pub mod ids;
pub mod neighbor;
pub mod node;
pub mod settings;
pub mod synapse;

pub use brick::{opposite_side, Brick, BrickKind, Position, NUMBER_OF_SIDES, SIDE_OFFSETS};
pub use error::{Error, NeuralError, Result};
pub use ids::{decode_optional_id, encode_optional_id, BrickId, NodeId, SectionId, SegmentId, UNSET_ID};
pub use neighbor::{layout_transfer_buffers, FlowDirection, SegmentNeighbor, SegmentNeighborList};
pub use node::{InputNode, Node, OutputNode};
pub use settings::SegmentSettings;
pub use synapse::{
    Synapse, SynapseSection, ACTIVE_COUNTER_MAX, BORDER_SCALE, BORDER_STEP, SYNAPSES_PER_SECTION,
};
