// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Collects every problem instead of stopping at the first one.

use crate::{ConfigError, ConfigResult, HanamiConfig};

const BACKENDS: [&str; 4] = ["cpu", "parallel", "rayon", "auto"];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const MAX_WORKERS: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => write!(f, "Missing required configuration: {}", field),
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every failed check
pub fn validate_config(config: &HanamiConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_required_fields(config, &mut errors);
    validate_workers(config, &mut errors);
    validate_cluster(config, &mut errors);
    validate_learning(config, &mut errors);

    if errors.is_empty() {
        return Ok(());
    }
    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");
    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

fn invalid(errors: &mut Vec<ConfigValidationError>, field: &str, reason: impl Into<String>) {
    errors.push(ConfigValidationError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    });
}

fn validate_required_fields(config: &HanamiConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.snapshot.output_dir.as_os_str().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "snapshot.output_dir".to_string(),
        });
    }
    if config.snapshot.file_extension.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "snapshot.file_extension".to_string(),
        });
    }
    for (field, level) in [
        ("system.log_level", &config.system.log_level),
        ("logging.global_log_level", &config.logging.global_log_level),
    ] {
        if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
            invalid(errors, field, format!("'{level}' is not one of {LOG_LEVELS:?}"));
        }
    }
}

fn validate_workers(config: &HanamiConfig, errors: &mut Vec<ConfigValidationError>) {
    let workers = &config.workers;
    if workers.worker_count > MAX_WORKERS {
        invalid(errors, "workers.worker_count", format!("must be at most {MAX_WORKERS}"));
    }
    if workers.stall_timeout_ms == 0 {
        invalid(errors, "workers.stall_timeout_ms", "must be greater than 0");
    }
    if workers.idle_sleep_us >= workers.stall_timeout_ms.saturating_mul(1000) {
        invalid(errors, "workers.idle_sleep_us", "must be shorter than the stall timeout");
    }
}

fn validate_cluster(config: &HanamiConfig, errors: &mut Vec<ConfigValidationError>) {
    let cluster = &config.cluster;
    if !BACKENDS.contains(&cluster.backend.to_lowercase().as_str()) {
        invalid(
            errors,
            "cluster.backend",
            format!("'{}' is not one of {BACKENDS:?}", cluster.backend),
        );
    }
    if cluster.random_table_size == 0 {
        invalid(errors, "cluster.random_table_size", "must be greater than 0");
    }
}

fn validate_learning(config: &HanamiConfig, errors: &mut Vec<ConfigValidationError>) {
    let learning = &config.learning;
    for (field, value) in [
        ("learning.potential_overflow", learning.potential_overflow),
        ("learning.node_border", learning.node_border),
        ("learning.input_border_factor", learning.input_border_factor),
        ("learning.growth_threshold", learning.growth_threshold),
        ("learning.learn_rate_hardened", learning.learn_rate_hardened),
        ("learning.learn_rate_fresh", learning.learn_rate_fresh),
    ] {
        if !value.is_finite() || value < 0.0 {
            invalid(errors, field, "must be a finite, non-negative number");
        }
    }
    if !(0.0..=1.0).contains(&learning.sign_negative_probability) {
        invalid(errors, "learning.sign_negative_probability", "must be within 0.0..=1.0");
    }
    if learning.multiplicator_range == 0 {
        invalid(errors, "learning.multiplicator_range", "must be at least 1");
    }
    if learning.reduction_decay < 0 {
        invalid(errors, "learning.reduction_decay", "must not be negative");
    }
    if learning.target_candidate_count == 0 {
        invalid(errors, "learning.target_candidate_count", "must be greater than 0");
    }
    if learning.max_walk_distance == 0 {
        invalid(errors, "learning.max_walk_distance", "must be greater than 0");
    }
    if learning.section_block_size == 0 {
        invalid(errors, "learning.section_block_size", "must be greater than 0");
    }
    if learning.max_synapse_sections < learning.section_block_size {
        invalid(
            errors,
            "learning.max_synapse_sections",
            "must be at least learning.section_block_size",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_all_errors() {
        let mut config = HanamiConfig::default();
        config.cluster.backend = "gpu".to_string();
        config.workers.stall_timeout_ms = 0;
        config.learning.sign_negative_probability = 1.5;

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("cluster.backend"));
        assert!(err.contains("workers.stall_timeout_ms"));
        assert!(err.contains("learning.sign_negative_probability"));
    }

    #[test]
    fn test_log_level_is_case_insensitive() {
        let mut config = HanamiConfig::default();
        config.system.log_level = "DEBUG".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_nan_learn_rate_rejected() {
        let mut config = HanamiConfig::default();
        config.learning.learn_rate_fresh = f32::NAN;
        assert!(validate_config(&config).is_err());
    }
}
