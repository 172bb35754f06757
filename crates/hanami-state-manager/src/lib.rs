// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Hanami State Manager
//!
//! Cluster orchestration state.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   ClusterStatus                     │  ← Lock-free atomic reads
//! │   (64-byte cache-line aligned)      │
//! └─────────────────────────────────────┘
//!           ↑ published by
//! ┌─────────────────────────────────────┐
//! │   ClusterStateMachine               │  ← Owned by the cluster driver
//! │   (declarative table + state stack) │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use hanami_state_manager::{build_cluster_state_machine, ClusterEvent, ClusterState};
//!
//! let mut machine = build_cluster_state_machine()?;
//! machine.fire(ClusterEvent::Learn)?;
//! assert_eq!(machine.fire(ClusterEvent::Image)?, ClusterState::LearnImageForward);
//! assert_eq!(machine.fire(ClusterEvent::FinishTask)?, ClusterState::Task);
//! # Ok::<(), hanami_state_manager::StateError>(())
//! ```

pub mod cluster;
pub mod error;
pub mod machine;
pub mod status;

pub use cluster::{build_cluster_state_machine, ClusterEvent, ClusterState, ClusterStateMachine};
pub use error::{Result, StateError};
pub use machine::{MachineSymbol, StateMachine, StateMachineBuilder};
pub use status::{ClusterMode, ClusterStatus, ClusterStatusSnapshot};
