// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Hanami Segment Engine
//!
//! Processing for a cluster of input, dynamic and output segments.
//!
//! ## Architecture
//! - **Segments** behind one trait; dynamic segments own bricks, nodes and a
//!   synapse-section arena
//! - **Synapse lifecycle**: growth during forward, hardening at cycle end,
//!   periodic reduction
//! - **Border exchange** between segments through per-side transfer buffers
//! - **Phase scheduler**: worker pool with a lock-free segment queue and
//!   start/end barriers per phase
//! - **Backends**: sequential CPU or rayon-parallel node kernels, selected per
//!   cluster
//!
//! No global state: every call receives a [`CycleContext`].

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod backend;
pub mod border;
pub mod codec;
pub mod context;
pub mod error;
pub mod node_processing;
pub mod scheduler;
pub mod segment;
pub mod stats;
pub mod synapse_processing;
pub mod topology;

pub use backend::{
    create_backend, select_backend, BackendConfig, BackendDecision, BackendType, CpuBackend,
    ParallelBackend, ProcessingBackend,
};
pub use border::{finish_segment, link_segments, process_segment, BorderState, SegmentCell, SegmentGraph};
pub use codec::{decode_segment, encode_segment};
pub use context::{CycleBatch, CycleContext, Phase};
pub use error::{EngineError, Result};
pub use scheduler::{CycleReport, PhaseReport, SchedulerConfig, WorkerPool};
pub use segment::{BorderInput, DynamicSegment, InputSegment, OutputSegment, Segment, SegmentKind};
pub use stats::CycleStats;
