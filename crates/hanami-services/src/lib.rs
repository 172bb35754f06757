// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# Hanami Cluster Layer

Everything between a segment graph and the outside world: topology documents,
the task queue, the cluster driver and the collaborator boundaries for
snapshots, metadata and streaming.

## Architecture

```text
┌─────────────────────────────────────────────────────────────────┐
│                    OUTER SURFACES                                │
│  CLI tools, transports, persistence backends                     │
└────────────────────────────┬────────────────────────────────────┘
                             ↓
┌─────────────────────────────────────────────────────────────────┐
│              CLUSTER LAYER (This Crate)                          │
│  • ClusterRegistry  - create/get/list/delete clusters            │
│  • Cluster          - task queue + state machine + phases        │
│  • ClusterRunner    - background stepping thread                 │
│  • SnapshotStore / MetadataStore / StreamSession traits          │
└────────────────────────────┬────────────────────────────────────┘
                             ↓
┌─────────────────────────────────────────────────────────────────┐
│                   ENGINE LAYER                                   │
│  hanami-npu-engine, hanami-state-manager, hanami-serialization   │
└─────────────────────────────────────────────────────────────────┘
```

## Usage

```no_run
use hanami_services::{Cluster, ClusterOptions, Sample, Task, TaskPayload};

let json = std::fs::read_to_string("topologies/chain.json")?;
let mut cluster = Cluster::from_json("demo", &json, ClusterOptions::default())?;
let task = cluster.add_task(Task::request(
    "probe",
    TaskPayload::Image { samples: vec![Sample::new().with_input("in", vec![0.0; 4])] },
));
cluster.run_until_idle(1_000);
println!("{:?}", cluster.task_result(task));
# Ok::<(), Box<dyn std::error::Error>>(())
```

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

pub mod cluster;
pub mod direct;
pub mod impls;
pub mod options;
pub mod registry;
pub mod runner;
pub mod task_queue;
pub mod traits;
pub mod types;

pub use cluster::{Cluster, StepOutcome};
pub use direct::{decode_frame, encode_frame};
pub use options::ClusterOptions;
pub use registry::ClusterRegistry;
pub use runner::{ClusterRunner, SharedCluster};
pub use task_queue::TaskQueue;

pub use traits::{
    ClusterRecord, MetadataStore, SnapshotInfo, SnapshotStore, StreamSession, TemplateRecord,
};

pub use types::{
    // Tasks
    CycleOutputs, GraphSeries, Sample, Task, TaskPayload, TaskProgress, TaskResult, TaskState,
    TaskType,
    // Topology documents
    BrickDescription, LinkDescription, SegmentDescription, SegmentType, TopologyDescription,
    // Errors
    ServiceError, ServiceResult,
};

pub use impls::{
    ChannelStreamSession, FileSnapshotStore, InMemoryMetadataStore, InMemorySnapshotStore,
    StreamPeer,
};
