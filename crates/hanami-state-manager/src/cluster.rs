// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Cluster states, events and the transition table that ties them together.
//!
//! ```text
//! Task ──Learn──▶ Learn ──Image──▶ LearnImage   { Forward ─Next▶ Backward ─Next▶ CycleFinish ─Next▶ Forward }
//!                       ──Graph──▶ LearnGraph   { same }
//!      ──Request▶ Request ─Image─▶ RequestImage { Forward ─Next▶ CycleFinish ─Next▶ Forward }
//!                        ─Graph─▶ RequestGraph  { same }
//!      ──Snapshot▶ Snapshot ─Save▶ SnapshotSave | ─Restore▶ SnapshotRestore
//!      ──SwitchToDirect▶ Direct ──SwitchToTask▶ Task
//!      ──ProcessTask▶ Task
//! ```
//!
//! `FinishTask` bubbles from anywhere under `Learn`, `Request` or `Snapshot`
//! back to `Task`.

use crate::error::Result;
use crate::machine::{StateMachine, StateMachineBuilder};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ClusterState {
    Task = 0,
    Learn = 1,
    LearnImage = 2,
    LearnImageForward = 3,
    LearnImageBackward = 4,
    LearnImageCycleFinish = 5,
    LearnGraph = 6,
    LearnGraphForward = 7,
    LearnGraphBackward = 8,
    LearnGraphCycleFinish = 9,
    Request = 10,
    RequestImage = 11,
    RequestImageForward = 12,
    RequestImageCycleFinish = 13,
    RequestGraph = 14,
    RequestGraphForward = 15,
    RequestGraphCycleFinish = 16,
    Snapshot = 17,
    SnapshotSave = 18,
    SnapshotRestore = 19,
    Direct = 20,
}

impl ClusterState {
    pub const ALL: [ClusterState; 21] = [
        ClusterState::Task,
        ClusterState::Learn,
        ClusterState::LearnImage,
        ClusterState::LearnImageForward,
        ClusterState::LearnImageBackward,
        ClusterState::LearnImageCycleFinish,
        ClusterState::LearnGraph,
        ClusterState::LearnGraphForward,
        ClusterState::LearnGraphBackward,
        ClusterState::LearnGraphCycleFinish,
        ClusterState::Request,
        ClusterState::RequestImage,
        ClusterState::RequestImageForward,
        ClusterState::RequestImageCycleFinish,
        ClusterState::RequestGraph,
        ClusterState::RequestGraphForward,
        ClusterState::RequestGraphCycleFinish,
        ClusterState::Snapshot,
        ClusterState::SnapshotSave,
        ClusterState::SnapshotRestore,
        ClusterState::Direct,
    ];

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    pub fn is_forward(self) -> bool {
        matches!(
            self,
            ClusterState::LearnImageForward
                | ClusterState::LearnGraphForward
                | ClusterState::RequestImageForward
                | ClusterState::RequestGraphForward
        )
    }

    pub fn is_backward(self) -> bool {
        matches!(self, ClusterState::LearnImageBackward | ClusterState::LearnGraphBackward)
    }

    pub fn is_cycle_finish(self) -> bool {
        matches!(
            self,
            ClusterState::LearnImageCycleFinish
                | ClusterState::LearnGraphCycleFinish
                | ClusterState::RequestImageCycleFinish
                | ClusterState::RequestGraphCycleFinish
        )
    }
}

impl Display for ClusterState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ClusterState::Task => "TASK",
            ClusterState::Learn => "LEARN",
            ClusterState::LearnImage => "LEARN_IMAGE",
            ClusterState::LearnImageForward => "LEARN_IMAGE_FORWARD",
            ClusterState::LearnImageBackward => "LEARN_IMAGE_BACKWARD",
            ClusterState::LearnImageCycleFinish => "LEARN_IMAGE_CYCLE_FINISH",
            ClusterState::LearnGraph => "LEARN_GRAPH",
            ClusterState::LearnGraphForward => "LEARN_GRAPH_FORWARD",
            ClusterState::LearnGraphBackward => "LEARN_GRAPH_BACKWARD",
            ClusterState::LearnGraphCycleFinish => "LEARN_GRAPH_CYCLE_FINISH",
            ClusterState::Request => "REQUEST",
            ClusterState::RequestImage => "REQUEST_IMAGE",
            ClusterState::RequestImageForward => "REQUEST_IMAGE_FORWARD",
            ClusterState::RequestImageCycleFinish => "REQUEST_IMAGE_CYCLE_FINISH",
            ClusterState::RequestGraph => "REQUEST_GRAPH",
            ClusterState::RequestGraphForward => "REQUEST_GRAPH_FORWARD",
            ClusterState::RequestGraphCycleFinish => "REQUEST_GRAPH_CYCLE_FINISH",
            ClusterState::Snapshot => "SNAPSHOT",
            ClusterState::SnapshotSave => "SNAPSHOT_SAVE",
            ClusterState::SnapshotRestore => "SNAPSHOT_RESTORE",
            ClusterState::Direct => "DIRECT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterEvent {
    ProcessTask,
    Learn,
    Request,
    Image,
    Graph,
    Snapshot,
    Save,
    Restore,
    Next,
    FinishTask,
    SwitchToDirect,
    SwitchToTask,
}

impl Display for ClusterEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ClusterEvent::ProcessTask => "PROCESS_TASK",
            ClusterEvent::Learn => "LEARN",
            ClusterEvent::Request => "REQUEST",
            ClusterEvent::Image => "IMAGE",
            ClusterEvent::Graph => "GRAPH",
            ClusterEvent::Snapshot => "SNAPSHOT",
            ClusterEvent::Save => "SAVE",
            ClusterEvent::Restore => "RESTORE",
            ClusterEvent::Next => "NEXT",
            ClusterEvent::FinishTask => "FINISH_TASK",
            ClusterEvent::SwitchToDirect => "SWITCH_TO_DIRECT",
            ClusterEvent::SwitchToTask => "SWITCH_TO_TASK",
        };
        f.write_str(name)
    }
}

pub type ClusterStateMachine = StateMachine<ClusterState, ClusterEvent>;

/// Forward / backward / cycle-finish loop of one learn branch
fn learn_loop(
    builder: StateMachineBuilder<ClusterState, ClusterEvent>,
    branch: ClusterState,
    forward: ClusterState,
    backward: ClusterState,
    finish: ClusterState,
) -> StateMachineBuilder<ClusterState, ClusterEvent> {
    use ClusterEvent::Next;
    builder
        .initial_child(branch, forward)
        .child(branch, backward)
        .child(branch, finish)
        .transition(forward, Next, backward)
        .transition(backward, Next, finish)
        .transition(finish, Next, forward)
}

fn request_loop(
    builder: StateMachineBuilder<ClusterState, ClusterEvent>,
    branch: ClusterState,
    forward: ClusterState,
    finish: ClusterState,
) -> StateMachineBuilder<ClusterState, ClusterEvent> {
    use ClusterEvent::Next;
    builder
        .initial_child(branch, forward)
        .child(branch, finish)
        .transition(forward, Next, finish)
        .transition(finish, Next, forward)
}

/// Build the cluster state machine, starting in `Task`
pub fn build_cluster_state_machine() -> Result<ClusterStateMachine> {
    use ClusterEvent as E;
    use ClusterState as S;

    let builder = StateMachineBuilder::new()
        .initial(S::Task)
        .transition(S::Task, E::ProcessTask, S::Task)
        .transition(S::Task, E::Learn, S::Learn)
        .transition(S::Task, E::Request, S::Request)
        .transition(S::Task, E::Snapshot, S::Snapshot)
        .transition(S::Task, E::SwitchToDirect, S::Direct)
        .transition(S::Direct, E::SwitchToTask, S::Task)
        // learn branch
        .initial_child(S::Learn, S::LearnImage)
        .child(S::Learn, S::LearnGraph)
        .transition(S::Learn, E::Image, S::LearnImage)
        .transition(S::Learn, E::Graph, S::LearnGraph)
        .transition(S::Learn, E::FinishTask, S::Task)
        // request branch
        .initial_child(S::Request, S::RequestImage)
        .child(S::Request, S::RequestGraph)
        .transition(S::Request, E::Image, S::RequestImage)
        .transition(S::Request, E::Graph, S::RequestGraph)
        .transition(S::Request, E::FinishTask, S::Task)
        // snapshot branch
        .initial_child(S::Snapshot, S::SnapshotSave)
        .child(S::Snapshot, S::SnapshotRestore)
        .transition(S::Snapshot, E::Save, S::SnapshotSave)
        .transition(S::Snapshot, E::Restore, S::SnapshotRestore)
        .transition(S::Snapshot, E::FinishTask, S::Task)
        // variant selection re-enters the branch from its default leaf
        .bubbling(E::Image)
        .bubbling(E::Graph)
        .bubbling(E::Save)
        .bubbling(E::Restore)
        .bubbling(E::FinishTask);

    let builder = learn_loop(
        builder,
        S::LearnImage,
        S::LearnImageForward,
        S::LearnImageBackward,
        S::LearnImageCycleFinish,
    );
    let builder = learn_loop(
        builder,
        S::LearnGraph,
        S::LearnGraphForward,
        S::LearnGraphBackward,
        S::LearnGraphCycleFinish,
    );
    let builder = request_loop(
        builder,
        S::RequestImage,
        S::RequestImageForward,
        S::RequestImageCycleFinish,
    );
    let builder = request_loop(
        builder,
        S::RequestGraph,
        S::RequestGraphForward,
        S::RequestGraphCycleFinish,
    );
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codes_round_trip() {
        for state in ClusterState::ALL {
            assert_eq!(ClusterState::from_u8(state.to_u8()), Some(state));
        }
        assert_eq!(ClusterState::from_u8(200), None);
    }

    #[test]
    fn test_learn_image_reaches_forward() {
        let mut machine = build_cluster_state_machine().unwrap();
        machine.fire(ClusterEvent::Learn).unwrap();
        let state = machine.fire(ClusterEvent::Image).unwrap();
        assert_eq!(state, ClusterState::LearnImageForward);
        assert_eq!(
            machine.active_path(),
            &[ClusterState::Learn, ClusterState::LearnImage, ClusterState::LearnImageForward]
        );
    }

    #[test]
    fn test_request_cycle_skips_backward() {
        let mut machine = build_cluster_state_machine().unwrap();
        machine.fire(ClusterEvent::Request).unwrap();
        machine.fire(ClusterEvent::Graph).unwrap();
        assert_eq!(machine.fire(ClusterEvent::Next).unwrap(), ClusterState::RequestGraphCycleFinish);
        assert_eq!(machine.fire(ClusterEvent::Next).unwrap(), ClusterState::RequestGraphForward);
    }

    #[test]
    fn test_entering_branch_descends_to_default_leaf() {
        let mut machine = build_cluster_state_machine().unwrap();
        assert_eq!(machine.fire(ClusterEvent::Learn).unwrap(), ClusterState::LearnImageForward);
        assert_eq!(machine.fire(ClusterEvent::Graph).unwrap(), ClusterState::LearnGraphForward);
        machine.fire(ClusterEvent::FinishTask).unwrap();

        assert_eq!(machine.fire(ClusterEvent::Request).unwrap(), ClusterState::RequestImageForward);
        machine.fire(ClusterEvent::FinishTask).unwrap();

        assert_eq!(machine.fire(ClusterEvent::Snapshot).unwrap(), ClusterState::SnapshotSave);
        assert_eq!(machine.fire(ClusterEvent::Restore).unwrap(), ClusterState::SnapshotRestore);
        assert!(machine.fire(ClusterEvent::Image).is_err());
        assert_eq!(machine.current(), ClusterState::SnapshotRestore);
    }

    #[test]
    fn test_direct_only_from_task() {
        let mut machine = build_cluster_state_machine().unwrap();
        machine.fire(ClusterEvent::Snapshot).unwrap();
        assert!(machine.fire(ClusterEvent::SwitchToDirect).is_err());
        assert_eq!(machine.current(), ClusterState::SnapshotSave);

        machine.fire(ClusterEvent::FinishTask).unwrap();
        assert_eq!(machine.fire(ClusterEvent::SwitchToDirect).unwrap(), ClusterState::Direct);
        assert!(machine.fire(ClusterEvent::FinishTask).is_err());
        assert_eq!(machine.fire(ClusterEvent::SwitchToTask).unwrap(), ClusterState::Task);
    }

    #[test]
    fn test_next_does_not_bubble() {
        let mut machine = build_cluster_state_machine().unwrap();
        machine.fire(ClusterEvent::Snapshot).unwrap();
        assert!(machine.fire(ClusterEvent::Next).is_err());
        assert_eq!(machine.current(), ClusterState::SnapshotSave);
        assert!(machine.fire(ClusterEvent::Image).is_err());
        assert!(machine.fire(ClusterEvent::Save).is_ok());
    }
}
