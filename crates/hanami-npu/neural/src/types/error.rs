// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for neural data operations

use thiserror::Error;

/// Error types for neural data operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NeuralError {
    #[error("Invalid node ID: {0}")]
    InvalidNodeId(u32),

    #[error("Invalid brick ID: {0}")]
    InvalidBrickId(u32),

    #[error("Invalid synapse section ID: {0}")]
    InvalidSectionId(u32),

    #[error("Invalid side: {0} (expected 0..12)")]
    InvalidSide(usize),

    #[error("Array size mismatch: expected {expected}, got {actual}")]
    ArraySizeMismatch { expected: usize, actual: usize },

    #[error("Item buffer exhausted: {0}")]
    BufferExhausted(String),

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    #[error("Computation error: {0}")]
    ComputationError(String),
}

pub type Result<T> = core::result::Result<T, NeuralError>;
pub type Error = NeuralError;
