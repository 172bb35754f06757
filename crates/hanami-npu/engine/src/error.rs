// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::context::Phase;
use hanami_npu_neural::{NeuralError, SegmentId};
use hanami_serialization::SerializationError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Neural(#[from] NeuralError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Invalid backend: {0}")]
    InvalidBackend(String),

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    #[error("Segment not found: {0}")]
    SegmentNotFound(SegmentId),

    #[error("Phase {phase} stalled with {pending} segment(s) pending")]
    PhaseStalled { phase: Phase, pending: usize },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
