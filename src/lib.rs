//! # Hanami - growable spiking neural network clusters
//!
//! A cluster is a graph of segments: input segments take values, dynamic
//! segments grow, harden and prune synapses while they learn, and output
//! segments report values. Tasks (learn, request, snapshot) are queued per
//! cluster and executed phase by phase by a worker pool.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! hanami = "0.1"
//! ```
//!
//! ```no_run
//! use hanami::prelude::*;
//!
//! let topology = TopologyDescription::from_json(include_str!("../topologies/chain.json"))?;
//! let mut cluster = Cluster::new("demo", &topology, ClusterOptions::default())?;
//! let task = cluster.add_task(Task::learn(
//!     "teach",
//!     TaskPayload::Image {
//!         samples: vec![Sample::new()
//!             .with_input("in", vec![0.9, 0.4, 0.7, 1.0])
//!             .with_expected("out", vec![1.0, 0.0])],
//!     },
//! ));
//! cluster.run_until_idle(1_000);
//! assert_eq!(cluster.task(task).map(|t| t.state()), Some(TaskState::Finished));
//! # Ok::<(), hanami::services::ServiceError>(())
//! ```
//!
//! ## Crates
//!
//! - **`neural`**: bricks, nodes, synapses, random tables
//! - **`engine`**: segments, processing backends, phase scheduler
//! - **`state`**: cluster state machine and shared status
//! - **`serialization`**: snapshot container format
//! - **`config`**: `hanami_configuration.toml` loader
//! - **`observability`**: logging setup
//! - **`services`**: task queue, cluster driver, stores and streams

pub use hanami_config as config;
pub use hanami_npu_engine as engine;
pub use hanami_npu_neural as neural;
pub use hanami_observability as observability;
pub use hanami_serialization as serialization;
pub use hanami_services as services;
pub use hanami_state_manager as state;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenient imports for building and driving clusters
pub mod prelude {
    pub use hanami_npu_engine::{BackendType, SegmentKind};
    pub use hanami_services::{
        Cluster, ClusterOptions, ClusterRegistry, ClusterRunner, GraphSeries, Sample, ServiceError,
        ServiceResult, StepOutcome, Task, TaskPayload, TaskResult, TaskState, TopologyDescription,
    };
    pub use hanami_state_manager::{ClusterMode, ClusterState};
}
