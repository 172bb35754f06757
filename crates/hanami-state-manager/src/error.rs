// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! State manager error types

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// No transition for `event` from the current state or, for bubbling
    /// events, any of its ancestors
    #[error("Invalid transition: no '{event}' from '{state}'")]
    InvalidTransition { state: String, event: String },

    #[error("Unknown state: {0}")]
    UnknownState(String),

    /// The transition table failed validation at construction
    #[error("Invalid state machine definition: {0}")]
    InvalidDefinition(String),
}

pub type Result<T> = std::result::Result<T, StateError>;
