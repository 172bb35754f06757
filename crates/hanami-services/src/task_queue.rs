// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Single-flight task queue of one cluster.

FIFO of task ids plus the task records. At most one task is `Active` at any
time; the next one is only handed out after the active task is finished,
failed or finalized after an abort.
*/

use crate::types::{Task, TaskProgress, TaskResult, TaskState};
use ahash::AHashMap;
use chrono::Utc;
use std::collections::VecDeque;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct TaskQueue {
    order: VecDeque<Uuid>,
    tasks: AHashMap<Uuid, Task>,
    current: Option<Uuid>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` at the tail under a freshly assigned uuid, resetting its
    /// progress to `Queued`
    pub fn add_task(&mut self, mut task: Task) -> Uuid {
        let uuid = Uuid::new_v4();
        task.uuid = uuid;
        task.progress.state = TaskState::Queued;
        task.progress.queued_at = Utc::now();
        task.progress.started_at = None;
        task.progress.ended_at = None;
        debug!(target: "hanami-services", task = %uuid, kind = %task.task_type, "Task queued");
        self.tasks.insert(uuid, task);
        self.order.push_back(uuid);
        uuid
    }

    /// Activate the queue head. `None` when the queue is empty or a task is
    /// still active.
    pub fn get_next_task(&mut self) -> Option<Uuid> {
        if self.current.is_some() {
            return None;
        }
        while let Some(uuid) = self.order.pop_front() {
            let Some(task) = self.tasks.get_mut(&uuid) else {
                continue;
            };
            if task.progress.state != TaskState::Queued {
                continue;
            }
            task.progress.state = TaskState::Active;
            task.progress.started_at = Some(Utc::now());
            self.current = Some(uuid);
            info!(target: "hanami-services", task = %uuid, kind = %task.task_type, "Task started");
            return Some(uuid);
        }
        None
    }

    /// Mark the active task finished
    pub fn finish_task(&mut self, uuid: Uuid) -> bool {
        if !self.end_active(uuid, TaskState::Finished) {
            return false;
        }
        info!(target: "hanami-services", task = %uuid, "Task finished");
        true
    }

    /// Mark the active task failed with `reason`
    pub fn fail_task(&mut self, uuid: Uuid, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        if !self.end_active(uuid, TaskState::Failed) {
            return false;
        }
        if let Some(task) = self.tasks.get_mut(&uuid) {
            warn!(target: "hanami-services", task = %uuid, %reason, "Task failed");
            task.progress.failure = Some(reason);
        }
        true
    }

    fn end_active(&mut self, uuid: Uuid, state: TaskState) -> bool {
        if self.current != Some(uuid) {
            return false;
        }
        let Some(task) = self.tasks.get_mut(&uuid) else {
            return false;
        };
        if task.progress.state != TaskState::Active {
            return false;
        }
        task.progress.state = state;
        task.progress.ended_at = Some(Utc::now());
        self.current = None;
        true
    }

    /// Remove a queued task, or abort the active one in place.
    ///
    /// Returns `false` for unknown and already ended tasks.
    pub fn remove_task(&mut self, uuid: Uuid) -> bool {
        let Some(state) = self.tasks.get(&uuid).map(|t| t.progress.state) else {
            return false;
        };
        match state {
            TaskState::Queued => {
                self.tasks.remove(&uuid);
                self.order.retain(|id| *id != uuid);
                debug!(target: "hanami-services", task = %uuid, "Queued task removed");
                true
            }
            TaskState::Active => {
                if let Some(task) = self.tasks.get_mut(&uuid) {
                    task.progress.state = TaskState::Aborted;
                }
                info!(target: "hanami-services", task = %uuid, "Active task aborted");
                true
            }
            TaskState::Finished | TaskState::Aborted | TaskState::Failed => false,
        }
    }

    /// Release an aborted current task once the running cycle reached a boundary
    pub fn finalize_aborted(&mut self) -> Option<Uuid> {
        let uuid = self.current?;
        let task = self.tasks.get_mut(&uuid)?;
        if task.progress.state != TaskState::Aborted {
            return None;
        }
        task.progress.ended_at = Some(Utc::now());
        self.current = None;
        debug!(target: "hanami-services", task = %uuid, "Aborted task finalized");
        Some(uuid)
    }

    /// The task taking part in the current cycle, if any
    pub fn current_task(&self) -> Option<&Task> {
        self.current.and_then(|uuid| self.tasks.get(&uuid))
    }

    pub fn current_task_mut(&mut self) -> Option<&mut Task> {
        let uuid = self.current?;
        self.tasks.get_mut(&uuid)
    }

    pub fn current_uuid(&self) -> Option<Uuid> {
        self.current
    }

    /// The current task was removed while active
    pub fn is_aborted(&self) -> bool {
        self.current_task()
            .is_some_and(|task| task.progress.state == TaskState::Aborted)
    }

    pub fn task(&self, uuid: Uuid) -> Option<&Task> {
        self.tasks.get(&uuid)
    }

    pub fn task_state(&self, uuid: Uuid) -> Option<TaskState> {
        self.tasks.get(&uuid).map(|t| t.progress.state)
    }

    pub fn task_progress(&self, uuid: Uuid) -> Option<TaskProgress> {
        self.tasks.get(&uuid).map(|t| t.progress.clone())
    }

    pub fn task_result(&self, uuid: Uuid) -> Option<&TaskResult> {
        self.tasks.get(&uuid).and_then(|t| t.result.as_ref())
    }

    /// All tasks, queued ones in dequeue order first, the rest by queue time
    pub fn list_tasks(&self) -> Vec<&Task> {
        let mut queued: Vec<&Task> = self.order.iter().filter_map(|id| self.tasks.get(id)).collect();
        let mut others: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| t.progress.state != TaskState::Queued)
            .collect();
        others.sort_by_key(|t| t.progress.queued_at);
        queued.extend(others);
        queued
    }

    pub fn queued_count(&self) -> usize {
        self.order.len()
    }

    /// Drop every ended task record; returns how many were dropped
    pub fn purge_completed(&mut self) -> usize {
        let before = self.tasks.len();
        let current = self.current;
        self.tasks
            .retain(|uuid, task| !(task.progress.state.is_terminal() && Some(*uuid) != current));
        before - self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskPayload;

    fn task(name: &str) -> Task {
        Task::request(name, TaskPayload::Image { samples: vec![] })
    }

    #[test]
    fn test_fifo_and_single_active() {
        let mut queue = TaskQueue::new();
        let a = queue.add_task(task("a"));
        let b = queue.add_task(task("b"));

        assert_eq!(queue.get_next_task(), Some(a));
        assert_eq!(queue.get_next_task(), None);
        assert_eq!(queue.task_state(b), Some(TaskState::Queued));

        assert!(queue.finish_task(a));
        assert!(!queue.finish_task(a));
        assert_eq!(queue.get_next_task(), Some(b));
        assert!(queue.task_progress(b).unwrap().started_at.is_some());
    }

    #[test]
    fn test_readding_active_task_gets_new_uuid() {
        let mut queue = TaskQueue::new();
        let original = task("a");
        let a = queue.add_task(original.clone());
        assert_eq!(queue.get_next_task(), Some(a));

        let again = queue.add_task(original.clone());
        let b = queue.add_task(task("b"));
        assert_ne!(again, a);
        assert_eq!(queue.task(again).unwrap().uuid, again);
        assert_eq!(queue.task_state(a), Some(TaskState::Active));

        assert!(queue.finish_task(a));
        assert_eq!(queue.get_next_task(), Some(again));
        assert!(queue.finish_task(again));
        assert_eq!(queue.get_next_task(), Some(b));
    }

    #[test]
    fn test_remove_queued_task() {
        let mut queue = TaskQueue::new();
        let a = queue.add_task(task("a"));
        let b = queue.add_task(task("b"));

        assert!(queue.remove_task(a));
        assert!(queue.task(a).is_none());
        assert_eq!(queue.queued_count(), 1);
        assert_eq!(queue.get_next_task(), Some(b));
    }

    #[test]
    fn test_abort_active_task() {
        let mut queue = TaskQueue::new();
        let a = queue.add_task(task("a"));
        queue.get_next_task();

        assert!(queue.remove_task(a));
        assert!(queue.is_aborted());
        assert_eq!(queue.task_state(a), Some(TaskState::Aborted));
        assert!(queue.current_task().is_some());

        assert_eq!(queue.finalize_aborted(), Some(a));
        assert!(queue.current_task().is_none());
        assert!(queue.task(a).unwrap().progress.ended_at.is_some());
        assert!(!queue.remove_task(a));
    }

    #[test]
    fn test_fail_records_reason() {
        let mut queue = TaskQueue::new();
        let a = queue.add_task(task("a"));
        assert!(!queue.fail_task(a, "not active"));
        queue.get_next_task();
        assert!(queue.fail_task(a, "stalled"));
        assert_eq!(queue.task(a).unwrap().progress.failure.as_deref(), Some("stalled"));
    }

    #[test]
    fn test_unknown_lookups() {
        let mut queue = TaskQueue::new();
        let ghost = Uuid::new_v4();
        assert!(!queue.remove_task(ghost));
        assert!(queue.task_progress(ghost).is_none());
        assert!(!queue.is_aborted());
        assert_eq!(queue.finalize_aborted(), None);
    }

    #[test]
    fn test_list_and_purge() {
        let mut queue = TaskQueue::new();
        let a = queue.add_task(task("a"));
        let b = queue.add_task(task("b"));
        queue.get_next_task();
        queue.finish_task(a);

        let names: Vec<&str> = queue.list_tasks().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);

        assert_eq!(queue.purge_completed(), 1);
        assert!(queue.task(a).is_none());
        assert!(queue.task(b).is_some());
    }
}
