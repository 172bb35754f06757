// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Lock-free cluster status with atomic fields

use crate::cluster::ClusterState;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

/// Cluster operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ClusterMode {
    Task = 0,
    Direct = 1,
}

/// Status readable without taking the cluster lock (64 bytes, cache-line aligned)
#[repr(C, align(64))]
pub struct ClusterStatus {
    state: AtomicU8,
    mode: AtomicU8,
    task_active: AtomicBool,
    _reserved: AtomicU8,
    segment_count: AtomicU32,

    // Counters
    cycle_count: AtomicU64,
    tasks_finished: AtomicU64,
    tasks_failed: AtomicU64,
    synapse_count: AtomicU64,
}

impl ClusterStatus {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ClusterState::Task.to_u8()),
            mode: AtomicU8::new(ClusterMode::Task as u8),
            task_active: AtomicBool::new(false),
            _reserved: AtomicU8::new(0),
            segment_count: AtomicU32::new(0),
            cycle_count: AtomicU64::new(0),
            tasks_finished: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            synapse_count: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> ClusterState {
        ClusterState::from_u8(self.state.load(Ordering::Acquire)).unwrap_or(ClusterState::Task)
    }

    pub fn set_state(&self, state: ClusterState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }

    pub fn mode(&self) -> ClusterMode {
        if self.mode.load(Ordering::Acquire) == ClusterMode::Direct as u8 {
            ClusterMode::Direct
        } else {
            ClusterMode::Task
        }
    }

    pub fn set_mode(&self, mode: ClusterMode) {
        self.mode.store(mode as u8, Ordering::Release);
    }

    pub fn is_task_active(&self) -> bool {
        self.task_active.load(Ordering::Acquire)
    }

    pub fn set_task_active(&self, active: bool) {
        self.task_active.store(active, Ordering::Release);
    }

    pub fn segment_count(&self) -> u32 {
        self.segment_count.load(Ordering::Relaxed)
    }

    pub fn set_segment_count(&self, count: u32) {
        self.segment_count.store(count, Ordering::Relaxed);
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count.load(Ordering::Relaxed)
    }

    pub fn set_cycle_count(&self, cycles: u64) {
        self.cycle_count.store(cycles, Ordering::Relaxed);
    }

    /// Returns the new cycle count
    pub fn increment_cycle(&self) -> u64 {
        self.cycle_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn tasks_finished(&self) -> u64 {
        self.tasks_finished.load(Ordering::Relaxed)
    }

    pub fn record_task_finished(&self) {
        self.tasks_finished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tasks_failed(&self) -> u64 {
        self.tasks_failed.load(Ordering::Relaxed)
    }

    pub fn record_task_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn synapse_count(&self) -> u64 {
        self.synapse_count.load(Ordering::Relaxed)
    }

    pub fn set_synapse_count(&self, count: u64) {
        self.synapse_count.store(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ClusterStatusSnapshot {
        ClusterStatusSnapshot {
            state: self.state(),
            mode: self.mode(),
            task_active: self.is_task_active(),
            segment_count: self.segment_count(),
            cycle_count: self.cycle_count(),
            tasks_finished: self.tasks_finished(),
            tasks_failed: self.tasks_failed(),
            synapse_count: self.synapse_count(),
        }
    }
}

impl Default for ClusterStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ClusterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.snapshot().fmt(f)
    }
}

/// Plain copy of [`ClusterStatus`] for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatusSnapshot {
    pub state: ClusterState,
    pub mode: ClusterMode,
    pub task_active: bool,
    pub segment_count: u32,
    pub cycle_count: u64,
    pub tasks_finished: u64,
    pub tasks_failed: u64,
    pub synapse_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_status_size() {
        assert_eq!(std::mem::size_of::<ClusterStatus>(), 64);
        assert_eq!(std::mem::align_of::<ClusterStatus>(), 64);
    }

    #[test]
    fn test_concurrent_cycle_counter() {
        let status = Arc::new(ClusterStatus::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let status = Arc::clone(&status);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        status.increment_cycle();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(status.cycle_count(), 4000);
    }

    #[test]
    fn test_snapshot_reflects_updates() {
        let status = ClusterStatus::new();
        status.set_state(ClusterState::LearnImageBackward);
        status.set_mode(ClusterMode::Direct);
        status.set_task_active(true);
        let snap = status.snapshot();
        assert_eq!(snap.state, ClusterState::LearnImageBackward);
        assert_eq!(snap.mode, ClusterMode::Direct);
        assert!(snap.task_active);
    }
}
