// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Task records owned by a cluster's task queue.
*/

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Learn,
    Request,
    SnapshotSave,
    SnapshotRestore,
}

impl Display for TaskType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::Learn => write!(f, "learn"),
            TaskType::Request => write!(f, "request"),
            TaskType::SnapshotSave => write!(f, "snapshot-save"),
            TaskType::SnapshotRestore => write!(f, "snapshot-restore"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Active,
    Finished,
    /// Removed while active; finalized at the next phase boundary
    Aborted,
    /// Task-scoped error, see `TaskProgress::failure`
    Failed,
}

impl TaskState {
    /// No further transitions happen from this state
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Finished | TaskState::Aborted | TaskState::Failed)
    }
}

/// Values for one cycle, keyed by segment name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub inputs: BTreeMap<String, Vec<f32>>,
    /// Labels for output segments; ignored by request tasks
    #[serde(default)]
    pub expected: BTreeMap<String, Vec<f32>>,
}

impl Sample {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, segment: impl Into<String>, values: Vec<f32>) -> Self {
        self.inputs.insert(segment.into(), values);
        self
    }

    pub fn with_expected(mut self, segment: impl Into<String>, values: Vec<f32>) -> Self {
        self.expected.insert(segment.into(), values);
        self
    }
}

/// Time series fed through a sliding window
///
/// Each cycle takes as many consecutive values as the input segment has
/// nodes; the values right after the window are the labels of the output
/// segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSeries {
    pub input_segment: String,
    pub output_segment: String,
    pub values: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    /// Independent samples, one cycle each
    Image { samples: Vec<Sample> },
    Graph { series: GraphSeries },
    SnapshotSave { name: String },
    SnapshotRestore { snapshot_id: String },
}

impl TaskPayload {
    pub fn is_graph(&self) -> bool {
        matches!(self, TaskPayload::Graph { .. })
    }
}

/// Outputs of one request cycle, keyed by output segment name
pub type CycleOutputs = BTreeMap<String, Vec<f32>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskResult {
    Outputs { cycles: Vec<CycleOutputs> },
    /// Serialized cluster, held until the task finishes
    SnapshotBlob { bytes: Vec<u8> },
    /// Where a finished snapshot-save blob was stored
    SnapshotStored { snapshot_id: String, size_bytes: u64 },
    Restored { segments: usize, skipped: usize, truncated: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub state: TaskState,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub current_cycle: u64,
    pub total_cycles: u64,
    pub failure: Option<String>,
}

impl TaskProgress {
    fn queued() -> Self {
        Self {
            state: TaskState::Queued,
            queued_at: Utc::now(),
            started_at: None,
            ended_at: None,
            current_cycle: 0,
            total_cycles: 0,
            failure: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub uuid: Uuid,
    pub name: String,
    pub task_type: TaskType,
    pub payload: TaskPayload,
    pub result: Option<TaskResult>,
    pub progress: TaskProgress,
}

impl Task {
    pub fn new(name: impl Into<String>, task_type: TaskType, payload: TaskPayload) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            task_type,
            payload,
            result: None,
            progress: TaskProgress::queued(),
        }
    }

    pub fn learn(name: impl Into<String>, payload: TaskPayload) -> Self {
        Self::new(name, TaskType::Learn, payload)
    }

    pub fn request(name: impl Into<String>, payload: TaskPayload) -> Self {
        Self::new(name, TaskType::Request, payload)
    }

    pub fn snapshot_save(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(
            name.clone(),
            TaskType::SnapshotSave,
            TaskPayload::SnapshotSave { name },
        )
    }

    pub fn snapshot_restore(snapshot_id: impl Into<String>) -> Self {
        let snapshot_id = snapshot_id.into();
        Self::new(
            format!("restore {snapshot_id}"),
            TaskType::SnapshotRestore,
            TaskPayload::SnapshotRestore { snapshot_id },
        )
    }

    pub fn state(&self) -> TaskState {
        self.progress.state
    }
}
