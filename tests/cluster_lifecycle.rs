// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end cluster lifecycle through the umbrella crate:
//! registry, background runner with worker threads, and a file-backed
//! snapshot moved between two clusters.

use hanami::prelude::*;
use hanami::services::{FileSnapshotStore, SnapshotStore};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

const CHAIN: &str = include_str!("../topologies/chain.json");

fn threaded_options() -> ClusterOptions {
    let mut options = ClusterOptions::default().with_seed(21);
    options.scheduler.worker_count = 2;
    options.runner_idle = Duration::from_millis(1);
    options
}

fn learn_samples(count: usize) -> TaskPayload {
    TaskPayload::Image {
        samples: (0..count)
            .map(|i| {
                let v = (i % 4) as f32 / 4.0;
                Sample::new()
                    .with_input("in", vec![v, 1.0 - v, 0.5, 1.0])
                    .with_expected("out", vec![v, 1.0 - v])
            })
            .collect(),
    }
}

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn test_registry_runner_processes_tasks() {
    let registry = ClusterRegistry::new(threaded_options());
    let topology = TopologyDescription::from_json(CHAIN).unwrap();
    let uuid = registry.create("lifecycle", &topology).unwrap();
    registry.start(uuid).unwrap();

    let cluster = registry.get(uuid).unwrap();
    let status = registry.status(uuid).unwrap();
    let learn = cluster.lock().add_task(Task::learn("learn", learn_samples(8)));
    let request = cluster.lock().add_task(Task::request(
        "request",
        TaskPayload::Image {
            samples: vec![Sample::new().with_input("in", vec![0.25, 0.75, 0.5, 1.0])],
        },
    ));

    assert!(wait_until(|| status.tasks_finished() == 2));

    // status is published before the runner releases the lock
    let guard = cluster.lock();
    assert_eq!(status.cycle_count(), 9);
    assert_eq!(status.state(), ClusterState::Task);
    assert!(status.synapse_count() > 0);
    assert_eq!(guard.task(learn).unwrap().state(), TaskState::Finished);
    match guard.task_result(request) {
        Some(TaskResult::Outputs { cycles }) => assert_eq!(cycles[0]["out"].len(), 2),
        other => panic!("unexpected result {other:?}"),
    }
    drop(guard);

    assert!(registry.stop(uuid));
    assert!(registry.delete(uuid));
}

#[test]
fn test_file_snapshot_moves_between_clusters() {
    let dir = tempdir().unwrap();
    let store: Arc<dyn SnapshotStore> = Arc::new(FileSnapshotStore::new(dir.path(), "hnm").unwrap());
    let registry = ClusterRegistry::new(ClusterOptions::default().inline()).with_snapshot_store(Arc::clone(&store));
    let topology = TopologyDescription::from_json(CHAIN).unwrap();

    let source = registry.create("source", &topology).unwrap();
    let target = registry.create("target", &topology).unwrap();

    let trained = registry.get(source).unwrap();
    let save = {
        let mut cluster = trained.lock();
        cluster.add_task(Task::learn("learn", learn_samples(4)));
        let save = cluster.add_task(Task::snapshot_save("trained"));
        cluster.run_until_idle(1_000);
        save
    };
    let (snapshot_id, synapses) = {
        let cluster = trained.lock();
        match cluster.task_result(save) {
            Some(TaskResult::SnapshotStored { snapshot_id, .. }) => (snapshot_id.clone(), cluster.total_synapses()),
            other => panic!("unexpected result {other:?}"),
        }
    };
    assert!(dir.path().join(format!("{snapshot_id}.hnm")).exists());
    assert_eq!(store.list().unwrap()[0].name, "trained");

    let fresh = registry.get(target).unwrap();
    let mut cluster = fresh.lock();
    assert_eq!(cluster.total_synapses(), 0);
    let restore = cluster.add_task(Task::snapshot_restore(snapshot_id));
    cluster.run_until_idle(100);

    assert_eq!(cluster.task(restore).unwrap().state(), TaskState::Finished);
    assert_eq!(cluster.total_synapses(), synapses);
    assert_eq!(cluster.cycle(), 4);
}
