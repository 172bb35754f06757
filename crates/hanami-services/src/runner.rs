// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Background thread that keeps a cluster stepping.
//!
//! The runner only holds the cluster lock for one step at a time, so callers
//! can add tasks, read results or switch modes between steps.

use crate::cluster::{Cluster, StepOutcome};
use crate::types::{ServiceError, ServiceResult};
use hanami_state_manager::ClusterState;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

pub type SharedCluster = Arc<Mutex<Cluster>>;

/// Drives a shared cluster until stopped
///
/// # Design
/// - Dedicated thread calls [`Cluster::step`] in a loop
/// - Sleeps `idle` whenever there is nothing to do
/// - Polls the stream session while the cluster is in direct mode
/// - Stops via an atomic flag and joins on drop
pub struct ClusterRunner {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    name: String,
}

impl ClusterRunner {
    /// Spawn a runner using the cluster's configured idle sleep
    pub fn spawn(cluster: SharedCluster) -> ServiceResult<Self> {
        let idle = cluster.lock().options().runner_idle;
        Self::spawn_with_idle(cluster, idle)
    }

    pub fn spawn_with_idle(cluster: SharedCluster, idle: Duration) -> ServiceResult<Self> {
        let name = {
            let guard = cluster.lock();
            format!("hanami-cluster-{}", &guard.uuid().simple().to_string()[..8])
        };
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_loop(cluster, flag, idle))
            .map_err(|e| ServiceError::Internal(format!("failed to spawn runner thread: {e}")))?;

        info!(target: "hanami-services", runner = %name, "Cluster runner started");
        Ok(Self {
            handle: Some(handle),
            shutdown,
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signal the runner to stop and wait for it to finish
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(target: "hanami-services", runner = %self.name, "Runner thread panicked");
            } else {
                info!(target: "hanami-services", runner = %self.name, "Cluster runner stopped");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Relaxed)
            && self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }
}

impl Drop for ClusterRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(cluster: SharedCluster, shutdown: Arc<AtomicBool>, idle: Duration) {
    while !shutdown.load(Ordering::Relaxed) {
        let busy = {
            let mut cluster = cluster.lock();
            if cluster.state() == ClusterState::Direct {
                cluster.poll_stream() > 0
            } else {
                match cluster.step() {
                    StepOutcome::Idle => false,
                    outcome => {
                        debug!(target: "hanami-services", ?outcome, "Runner step");
                        true
                    }
                }
            }
        };
        if !busy {
            thread::sleep(idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ClusterOptions;
    use crate::types::{Sample, Task, TaskPayload, TaskState};
    use std::time::Instant;

    const PAIR: &str = r#"{
        "segments": [
            { "name": "in", "type": "input", "number_of_nodes": 1,
              "outputs": [ { "side": 2, "target": "hidden" } ] },
            { "name": "hidden", "type": "dynamic",
              "bricks": [
                { "position": [1, 1, 1], "kind": "input", "number_of_nodes": 1, "border_side": 9 },
                { "position": [2, 1, 1], "kind": "output", "number_of_nodes": 1, "border_side": 2 }
              ],
              "outputs": [ { "side": 2, "target": "out" } ] },
            { "name": "out", "type": "output", "number_of_nodes": 1 }
        ]
    }"#;

    fn wait_for(cluster: &SharedCluster, uuid: uuid::Uuid, state: TaskState) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cluster.lock().task(uuid).map(|t| t.state()) == Some(state) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_runner_processes_queued_task() {
        let cluster = Cluster::from_json("pair", PAIR, ClusterOptions::default().inline()).unwrap();
        let shared: SharedCluster = Arc::new(Mutex::new(cluster));
        let mut runner = ClusterRunner::spawn_with_idle(Arc::clone(&shared), Duration::from_millis(1)).unwrap();
        assert!(runner.is_running());
        assert!(runner.name().starts_with("hanami-cluster-"));

        let uuid = shared.lock().add_task(Task::request(
            "r",
            TaskPayload::Image {
                samples: vec![Sample::new().with_input("in", vec![1.0])],
            },
        ));
        assert!(wait_for(&shared, uuid, TaskState::Finished));

        runner.stop();
        assert!(!runner.is_running());
    }
}
