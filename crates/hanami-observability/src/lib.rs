// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # hanami-observability
//!
//! Logging setup shared by every Hanami binary, with per-crate debug flag
//! support.
//!
//! ## Features
//! - `file-logging`: per-run log folders with daily rotation and retention

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Log targets of the Hanami crates, usable with `--debug-<name>`
pub const KNOWN_CRATES: &[&str] = &[
    "hanami-npu-engine",
    "hanami-serialization",
    "hanami-state-manager",
    "hanami-services",
    "hanami-config",
];
