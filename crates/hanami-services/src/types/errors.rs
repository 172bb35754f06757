// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Service layer error types.

Lower crates report through their own error enums; everything crossing the
cluster boundary is translated into [`ServiceError`].
*/

use hanami_config::ConfigError;
use hanami_npu_engine::EngineError;
use hanami_npu_neural::NeuralError;
use hanami_serialization::SerializationError;
use hanami_state_manager::StateError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Unknown cluster, task, template or snapshot
    #[error("Not found: {resource} with id '{id}'")]
    NotFound { resource: String, id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Already exists: {resource} with id '{id}'")]
    AlreadyExists { resource: String, id: String },

    /// Rejected state machine transition
    #[error("State error: {0}")]
    StateError(String),

    /// Operation not allowed in the current mode (e.g. direct input while in task mode)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    /// Engine or data model failure
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

// ============================================================================
// ERROR CONVERSIONS FROM LOWER CRATES
// ============================================================================

impl From<EngineError> for ServiceError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidTopology(msg) => ServiceError::InvalidTopology(msg),
            EngineError::InvalidBackend(msg) => ServiceError::Config(format!("unknown backend '{msg}'")),
            EngineError::SegmentNotFound(id) => ServiceError::NotFound {
                resource: "Segment".to_string(),
                id: id.to_string(),
            },
            EngineError::Serialization(e) => ServiceError::Snapshot(e.to_string()),
            EngineError::Neural(NeuralError::InvalidTopology(msg)) => ServiceError::InvalidTopology(msg),
            _ => ServiceError::Backend(err.to_string()),
        }
    }
}

impl From<NeuralError> for ServiceError {
    fn from(err: NeuralError) -> Self {
        match err {
            NeuralError::InvalidTopology(msg) => ServiceError::InvalidTopology(msg),
            _ => ServiceError::Backend(err.to_string()),
        }
    }
}

impl From<StateError> for ServiceError {
    fn from(err: StateError) -> Self {
        ServiceError::StateError(err.to_string())
    }
}

impl From<SerializationError> for ServiceError {
    fn from(err: SerializationError) -> Self {
        ServiceError::Snapshot(err.to_string())
    }
}

impl From<ConfigError> for ServiceError {
    fn from(err: ConfigError) -> Self {
        ServiceError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::InvalidInput(format!("malformed JSON: {err}"))
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hanami_npu_engine::Phase;
    use hanami_npu_neural::SegmentId;

    #[test]
    fn test_engine_errors_translate() {
        let err: ServiceError = EngineError::InvalidTopology("loop".into()).into();
        assert_eq!(err, ServiceError::InvalidTopology("loop".into()));

        let err: ServiceError = EngineError::SegmentNotFound(SegmentId(3)).into();
        assert!(matches!(err, ServiceError::NotFound { ref resource, .. } if resource == "Segment"));

        let err: ServiceError = EngineError::PhaseStalled {
            phase: Phase::Forward,
            pending: 2,
        }
        .into();
        assert!(matches!(err, ServiceError::Backend(ref msg) if msg.contains("stalled")));
    }

    #[test]
    fn test_state_error_translates() {
        let err: ServiceError = StateError::UnknownState("X".into()).into();
        assert!(matches!(err, ServiceError::StateError(_)));
    }
}
