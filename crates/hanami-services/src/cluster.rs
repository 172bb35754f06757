// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# Cluster

One network: the segment graph, its task queue, the cluster state machine and
the worker pool that runs processing phases.

The cluster is driven by [`Cluster::step`], which performs exactly one state
of the machine per call:

```text
TASK ──PROCESS_TASK──► dispatch by task type
  LEARN  ─IMAGE/GRAPH─► FORWARD ─NEXT─► BACKWARD ─NEXT─► CYCLE_FINISH ─NEXT─► FORWARD ...
  REQUEST ─IMAGE/GRAPH─► FORWARD ─NEXT─► CYCLE_FINISH ─NEXT─► FORWARD ...
  SNAPSHOT ─SAVE/RESTORE─► SNAPSHOT_SAVE | SNAPSHOT_RESTORE
any branch ──FINISH_TASK──► TASK
```

Each step boundary is a phase boundary, which is where an aborted task is
noticed. Errors inside a task never escape `step`; they fail the task and the
cluster returns to `TASK`.
*/

use crate::direct::{decode_frame, encode_frame};
use crate::options::ClusterOptions;
use crate::task_queue::TaskQueue;
use crate::traits::{SnapshotStore, StreamSession};
use crate::types::{
    CycleOutputs, GraphSeries, Sample, ServiceError, ServiceResult, Task, TaskPayload, TaskProgress,
    TaskResult, TaskState, TaskType, TopologyDescription,
};
use hanami_npu_engine::{
    create_backend, decode_segment, encode_segment, CycleBatch, CycleContext, DynamicSegment,
    OutputSegment, Phase, ProcessingBackend, SegmentGraph, SegmentKind, WorkerPool,
};
use hanami_npu_neural::{RandomValues, SegmentId};
use hanami_serialization::{decode_snapshot, encode_snapshot, ClusterHeader, SegmentRecord};
use hanami_state_manager::{
    build_cluster_state_machine, ClusterEvent, ClusterMode, ClusterState, ClusterStateMachine,
    ClusterStatus,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What a call to [`Cluster::step`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing queued, or the cluster is in direct mode
    Idle,
    TaskStarted(Uuid),
    /// A processing state completed; `state` is the state entered next
    PhaseCompleted { state: ClusterState },
    TaskFinished(Uuid),
    TaskAborted(Uuid),
    TaskFailed(Uuid),
}

/// Execution state of the active learn/request task
#[derive(Debug)]
struct TaskRun {
    uuid: Uuid,
    learning: bool,
    batches: Vec<CycleBatch>,
    /// Index of the batch of the current cycle
    next: usize,
    ctx: Option<Arc<CycleContext>>,
    outputs: Vec<CycleOutputs>,
}

pub struct Cluster {
    uuid: Uuid,
    name: String,
    options: ClusterOptions,
    graph: Arc<SegmentGraph>,
    backend: Arc<dyn ProcessingBackend>,
    pool: WorkerPool,
    random: Arc<RandomValues>,
    machine: ClusterStateMachine,
    queue: TaskQueue,
    status: Arc<ClusterStatus>,
    snapshot_store: Option<Arc<dyn SnapshotStore>>,
    stream: Option<Arc<dyn StreamSession>>,
    cycle: u64,
    run: Option<TaskRun>,
}

impl Cluster {
    /// Build a cluster from a topology description
    pub fn new(
        name: impl Into<String>,
        topology: &TopologyDescription,
        options: ClusterOptions,
    ) -> ServiceResult<Self> {
        let graph = topology.build_graph(&options.settings, options.random_seed)?;
        Self::from_graph(Uuid::new_v4(), name, graph, options)
    }

    /// Build a cluster from a topology JSON document
    pub fn from_json(name: impl Into<String>, json: &str, options: ClusterOptions) -> ServiceResult<Self> {
        Self::new(name, &TopologyDescription::from_json(json)?, options)
    }

    pub fn from_graph(
        uuid: Uuid,
        name: impl Into<String>,
        graph: SegmentGraph,
        options: ClusterOptions,
    ) -> ServiceResult<Self> {
        let name = name.into();
        let graph = Arc::new(graph);
        let largest = largest_dynamic_segment(&graph);
        let backend = create_backend(options.backend, largest, &options.backend_config);
        let pool = WorkerPool::new(options.scheduler)?;
        let random = Arc::new(RandomValues::generate(
            options.random_seed,
            options.random_table_size,
        ));
        let machine = build_cluster_state_machine()?;

        let cluster = Self {
            uuid,
            name,
            options,
            graph,
            backend,
            pool,
            random,
            machine,
            queue: TaskQueue::new(),
            status: Arc::new(ClusterStatus::new()),
            snapshot_store: None,
            stream: None,
            cycle: 0,
            run: None,
        };
        cluster.publish_status();
        cluster.status.set_synapse_count(cluster.total_synapses() as u64);
        info!(
            target: "hanami-services",
            cluster = %cluster.uuid,
            name = %cluster.name,
            segments = cluster.graph.len(),
            nodes = cluster.graph.total_nodes(),
            workers = cluster.pool.worker_count(),
            "Cluster created"
        );
        Ok(cluster)
    }

    pub fn with_snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshot_store = Some(store);
        self
    }

    pub fn with_stream_session(mut self, session: Arc<dyn StreamSession>) -> Self {
        self.stream = Some(session);
        self
    }

    pub fn set_snapshot_store(&mut self, store: Option<Arc<dyn SnapshotStore>>) {
        self.snapshot_store = store;
    }

    pub fn set_stream_session(&mut self, session: Option<Arc<dyn StreamSession>>) {
        self.stream = session;
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &Arc<SegmentGraph> {
        &self.graph
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    pub fn state(&self) -> ClusterState {
        self.machine.current()
    }

    pub fn mode(&self) -> ClusterMode {
        if self.machine.current() == ClusterState::Direct {
            ClusterMode::Direct
        } else {
            ClusterMode::Task
        }
    }

    /// Shared status, readable without the cluster lock
    pub fn status(&self) -> Arc<ClusterStatus> {
        Arc::clone(&self.status)
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn total_synapses(&self) -> usize {
        self.graph
            .cells()
            .iter()
            .filter(|cell| cell.kind() == SegmentKind::Dynamic)
            .filter_map(|cell| cell.with_segment(|s: &DynamicSegment| s.synapse_count()))
            .sum()
    }

    /// Latest values of every output segment, keyed by segment name
    pub fn outputs(&self) -> CycleOutputs {
        self.graph
            .cells()
            .iter()
            .filter(|cell| cell.kind() == SegmentKind::Output)
            .filter_map(|cell| {
                cell.with_segment(|s: &OutputSegment| s.outputs())
                    .map(|values| (cell.name().to_string(), values))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    pub fn add_task(&mut self, task: Task) -> Uuid {
        self.queue.add_task(task)
    }

    /// Remove a queued task or abort the active one; `false` for unknown or
    /// ended tasks
    pub fn remove_task(&mut self, uuid: Uuid) -> bool {
        self.queue.remove_task(uuid)
    }

    pub fn task(&self, uuid: Uuid) -> Option<&Task> {
        self.queue.task(uuid)
    }

    pub fn task_progress(&self, uuid: Uuid) -> Option<TaskProgress> {
        self.queue.task_progress(uuid)
    }

    pub fn task_result(&self, uuid: Uuid) -> Option<&TaskResult> {
        self.queue.task_result(uuid)
    }

    pub fn list_tasks(&self) -> Vec<&Task> {
        self.queue.list_tasks()
    }

    /// Nothing active, nothing queued
    pub fn is_idle(&self) -> bool {
        self.queue.current_uuid().is_none() && self.queue.queued_count() == 0
    }

    /// Perform one state of the cluster state machine
    pub fn step(&mut self) -> StepOutcome {
        let state = self.machine.current();
        let outcome = match state {
            ClusterState::Task => self.start_next_task(),
            ClusterState::Direct => StepOutcome::Idle,
            _ => match self.queue.current_uuid() {
                None => {
                    warn!(target: "hanami-services", %state, "No active task, returning to TASK");
                    self.run = None;
                    self.return_to_task();
                    StepOutcome::Idle
                }
                Some(uuid) if self.queue.is_aborted() => self.abort_current(uuid),
                Some(uuid) => match self.process_state(state) {
                    Ok(outcome) => outcome,
                    Err(err) => self.fail_task(uuid, err),
                },
            },
        };
        self.publish_status();
        outcome
    }

    /// Step until nothing is active or queued, or `max_steps` is reached.
    /// Returns the number of steps taken.
    pub fn run_until_idle(&mut self, max_steps: usize) -> usize {
        for taken in 0..max_steps {
            if self.step() == StepOutcome::Idle && self.is_idle() {
                return taken + 1;
            }
        }
        max_steps
    }

    fn start_next_task(&mut self) -> StepOutcome {
        let Some(uuid) = self.queue.get_next_task() else {
            return StepOutcome::Idle;
        };
        match self.dispatch(uuid) {
            Ok(()) => StepOutcome::TaskStarted(uuid),
            Err(err) => self.fail_task(uuid, err),
        }
    }

    /// Move the machine into the branch matching the task type
    fn dispatch(&mut self, uuid: Uuid) -> ServiceResult<()> {
        let (task_type, payload) = self
            .queue
            .task(uuid)
            .map(|t| (t.task_type, t.payload.clone()))
            .ok_or_else(|| not_found("Task", uuid))?;

        self.machine.fire(ClusterEvent::ProcessTask)?;
        match (task_type, &payload) {
            (TaskType::Learn | TaskType::Request, TaskPayload::Image { .. } | TaskPayload::Graph { .. }) => {
                let learning = task_type == TaskType::Learn;
                let batches = self.plan_batches(&payload, learning)?;
                if batches.is_empty() {
                    return Err(ServiceError::InvalidInput(format!("{task_type} task carries no samples")));
                }
                if let Some(task) = self.queue.current_task_mut() {
                    task.progress.total_cycles = batches.len() as u64;
                }
                self.machine.fire(if learning {
                    ClusterEvent::Learn
                } else {
                    ClusterEvent::Request
                })?;
                self.machine.fire(if payload.is_graph() {
                    ClusterEvent::Graph
                } else {
                    ClusterEvent::Image
                })?;
                self.run = Some(TaskRun {
                    uuid,
                    learning,
                    batches,
                    next: 0,
                    ctx: None,
                    outputs: Vec::new(),
                });
            }
            (TaskType::SnapshotSave, TaskPayload::SnapshotSave { .. }) => {
                self.machine.fire(ClusterEvent::Snapshot)?;
                self.machine.fire(ClusterEvent::Save)?;
            }
            (TaskType::SnapshotRestore, TaskPayload::SnapshotRestore { .. }) => {
                self.machine.fire(ClusterEvent::Snapshot)?;
                self.machine.fire(ClusterEvent::Restore)?;
            }
            (task_type, _) => {
                return Err(ServiceError::InvalidInput(format!(
                    "payload does not match a {task_type} task"
                )))
            }
        }
        debug!(target: "hanami-services", task = %uuid, state = %self.machine.current(), "Task dispatched");
        Ok(())
    }

    fn process_state(&mut self, state: ClusterState) -> ServiceResult<StepOutcome> {
        if state.is_forward() {
            self.run_forward()
        } else if state.is_backward() {
            self.run_backward()
        } else if state.is_cycle_finish() {
            self.finish_cycle()
        } else if state == ClusterState::SnapshotSave {
            self.save_snapshot_state()
        } else if state == ClusterState::SnapshotRestore {
            self.restore_snapshot_state()
        } else {
            Err(ServiceError::StateError(format!("no work is defined for state {state}")))
        }
    }

    fn run_forward(&mut self) -> ServiceResult<StepOutcome> {
        let run = self
            .run
            .as_mut()
            .ok_or_else(|| ServiceError::Internal("forward state without a running task".into()))?;
        let batch = run
            .batches
            .get_mut(run.next)
            .map(std::mem::take)
            .ok_or_else(|| ServiceError::Internal("no batch left for this cycle".into()))?;
        let ctx = Arc::new(CycleContext::new(
            self.cycle,
            run.learning,
            Arc::clone(&self.random),
            batch,
        ));
        run.ctx = Some(Arc::clone(&ctx));

        self.run_phases(&ctx, &[Phase::InputMapping, Phase::Forward])?;
        self.machine.fire(ClusterEvent::Next)?;
        Ok(StepOutcome::PhaseCompleted {
            state: self.machine.current(),
        })
    }

    fn run_backward(&mut self) -> ServiceResult<StepOutcome> {
        let ctx = self.current_context()?;
        self.run_phases(&ctx, &[Phase::Backward])?;
        self.machine.fire(ClusterEvent::Next)?;
        Ok(StepOutcome::PhaseCompleted {
            state: self.machine.current(),
        })
    }

    fn finish_cycle(&mut self) -> ServiceResult<StepOutcome> {
        let ctx = self.current_context()?;
        self.run_phases(&ctx, &[Phase::Finalize])?;

        self.cycle += 1;
        self.status.increment_cycle();
        self.status.set_synapse_count(self.total_synapses() as u64);
        let outputs = self.outputs();

        let run = self
            .run
            .as_mut()
            .ok_or_else(|| ServiceError::Internal("cycle finished without a running task".into()))?;
        if !run.learning {
            run.outputs.push(outputs);
        }
        run.next += 1;
        run.ctx = None;
        let (uuid, done, cycles) = (run.uuid, run.next >= run.batches.len(), run.next as u64);
        if let Some(task) = self.queue.current_task_mut() {
            task.progress.current_cycle = cycles;
        }

        if !done {
            self.machine.fire(ClusterEvent::Next)?;
            return Ok(StepOutcome::PhaseCompleted {
                state: self.machine.current(),
            });
        }

        let run = self.run.take();
        if let Some(run) = run.filter(|r| !r.learning) {
            self.set_result(TaskResult::Outputs { cycles: run.outputs });
        }
        self.complete_task(uuid)
    }

    fn current_context(&self) -> ServiceResult<Arc<CycleContext>> {
        self.run
            .as_ref()
            .and_then(|run| run.ctx.clone())
            .ok_or_else(|| ServiceError::Internal("no cycle in progress".into()))
    }

    fn run_phases(&self, ctx: &Arc<CycleContext>, phases: &[Phase]) -> ServiceResult<()> {
        for &phase in phases {
            let report = self.pool.run_phase(&self.graph, phase, ctx, &self.backend)?;
            debug!(
                target: "hanami-services",
                cluster = %self.uuid,
                cycle = ctx.cycle,
                %phase,
                segments = report.segments_processed,
                synapses_created = report.stats.synapses_created,
                synapses_removed = report.stats.synapses_removed,
                arena_full = report.stats.arena_full_events,
                elapsed_us = report.elapsed.as_micros() as u64,
                "Phase finished"
            );
        }
        Ok(())
    }

    fn set_result(&mut self, result: TaskResult) {
        if let Some(task) = self.queue.current_task_mut() {
            task.result = Some(result);
        }
    }

    /// Hand a snapshot blob to the store, finish the task and return to TASK
    fn complete_task(&mut self, uuid: Uuid) -> ServiceResult<StepOutcome> {
        if let Some(store) = self.snapshot_store.clone() {
            let pending = self.queue.current_task_mut().and_then(|task| {
                match task.result.take() {
                    Some(TaskResult::SnapshotBlob { bytes }) => {
                        let name = match &task.payload {
                            TaskPayload::SnapshotSave { name } => name.clone(),
                            _ => task.name.clone(),
                        };
                        Some((name, bytes))
                    }
                    other => {
                        task.result = other;
                        None
                    }
                }
            });
            if let Some((name, bytes)) = pending {
                let info = store.save(self.uuid, &name, &bytes)?;
                self.set_result(TaskResult::SnapshotStored {
                    snapshot_id: info.snapshot_id,
                    size_bytes: info.size_bytes,
                });
            }
        }

        self.machine.fire(ClusterEvent::FinishTask)?;
        self.queue.finish_task(uuid);
        self.status.record_task_finished();
        Ok(StepOutcome::TaskFinished(uuid))
    }

    fn abort_current(&mut self, uuid: Uuid) -> StepOutcome {
        self.graph.reset_borders();
        self.run = None;
        self.return_to_task();
        self.queue.finalize_aborted();
        info!(target: "hanami-services", cluster = %self.uuid, task = %uuid, "Aborted task finalized");
        StepOutcome::TaskAborted(uuid)
    }

    fn fail_task(&mut self, uuid: Uuid, err: ServiceError) -> StepOutcome {
        warn!(target: "hanami-services", cluster = %self.uuid, task = %uuid, error = %err, "Task failed");
        self.graph.reset_borders();
        self.run = None;
        self.return_to_task();
        self.queue.fail_task(uuid, err.to_string());
        self.status.record_task_failed();
        StepOutcome::TaskFailed(uuid)
    }

    fn return_to_task(&mut self) {
        if self.machine.current() == ClusterState::Task {
            return;
        }
        if let Err(err) = self.machine.fire(ClusterEvent::FinishTask) {
            warn!(target: "hanami-services", error = %err, "Could not return to TASK");
        }
    }

    fn publish_status(&self) {
        self.status.set_state(self.machine.current());
        self.status.set_mode(self.mode());
        self.status.set_task_active(self.queue.current_uuid().is_some());
        self.status.set_segment_count(self.graph.len() as u32);
        self.status.set_cycle_count(self.cycle);
    }

    // ------------------------------------------------------------------
    // Task payloads
    // ------------------------------------------------------------------

    fn plan_batches(&self, payload: &TaskPayload, learning: bool) -> ServiceResult<Vec<CycleBatch>> {
        match payload {
            TaskPayload::Image { samples } => samples
                .iter()
                .map(|sample| self.sample_batch(sample, learning))
                .collect(),
            TaskPayload::Graph { series } => self.series_batches(series, learning),
            TaskPayload::SnapshotSave { .. } | TaskPayload::SnapshotRestore { .. } => Err(
                ServiceError::InvalidInput("snapshot payloads carry no cycle data".into()),
            ),
        }
    }

    fn sample_batch(&self, sample: &Sample, learning: bool) -> ServiceResult<CycleBatch> {
        let mut batch = CycleBatch::default();
        for (name, values) in &sample.inputs {
            let id = self.resolve_segment(name, SegmentKind::Input)?;
            batch = batch.with_inputs(id, values.clone());
        }
        if learning {
            for (name, values) in &sample.expected {
                let id = self.resolve_segment(name, SegmentKind::Output)?;
                batch = batch.with_expected(id, values.clone());
            }
        }
        Ok(batch)
    }

    fn series_batches(&self, series: &GraphSeries, learning: bool) -> ServiceResult<Vec<CycleBatch>> {
        let input = self.resolve_segment(&series.input_segment, SegmentKind::Input)?;
        let output = self.resolve_segment(&series.output_segment, SegmentKind::Output)?;
        let window = self.node_count(input);
        let label = self.node_count(output);
        let values = &series.values;
        if values.len() < window + label {
            return Err(ServiceError::InvalidInput(format!(
                "series of {} values is shorter than one window ({window} inputs + {label} labels)",
                values.len()
            )));
        }
        Ok((0..=values.len() - window - label)
            .map(|start| {
                let batch = CycleBatch::default().with_inputs(input, values[start..start + window].to_vec());
                if learning {
                    let labels = values[start + window..start + window + label].to_vec();
                    batch.with_expected(output, labels)
                } else {
                    batch
                }
            })
            .collect())
    }

    fn resolve_segment(&self, name: &str, kind: SegmentKind) -> ServiceResult<SegmentId> {
        let id = self.graph.find(name).ok_or_else(|| ServiceError::NotFound {
            resource: "Segment".to_string(),
            id: name.to_string(),
        })?;
        match self.graph.cell(id) {
            Some(cell) if cell.kind() == kind => Ok(id),
            _ => Err(ServiceError::InvalidInput(format!("segment '{name}' is not a {kind} segment"))),
        }
    }

    fn node_count(&self, id: SegmentId) -> usize {
        self.graph
            .cell(id)
            .map(|cell| cell.body().lock().number_of_nodes())
            .unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Serialize the cluster: header plus one record per segment in id order
    pub fn snapshot_blob(&self) -> Vec<u8> {
        let mut header = ClusterHeader::new(
            *self.uuid.as_bytes(),
            self.name.clone(),
            self.graph.len() as u32,
            self.options.random_seed,
        );
        header.cycle_count = self.cycle;
        let records: Vec<SegmentRecord> = self.graph.cells().iter().map(encode_segment).collect();
        encode_snapshot(&header, &records)
    }

    /// Replace the segment graph with the contents of `blob`.
    ///
    /// Only allowed while no task is running. Returns the restore summary.
    pub fn restore_snapshot(&mut self, blob: &[u8]) -> ServiceResult<TaskResult> {
        if self.run.is_some() {
            return Err(ServiceError::InvalidState(
                "cannot restore while a task is processing cycles".into(),
            ));
        }
        self.restore_graph(blob)
    }

    fn restore_graph(&mut self, blob: &[u8]) -> ServiceResult<TaskResult> {
        let decoded = decode_snapshot(blob)?;
        if decoded.records.is_empty() {
            return Err(ServiceError::Snapshot("snapshot holds no segments".into()));
        }
        if decoded.skipped > 0 {
            warn!(
                target: "hanami-services",
                cluster = %self.uuid,
                skipped = decoded.skipped,
                truncated = decoded.truncated,
                "Snapshot records skipped during restore"
            );
        }

        let cells = decoded
            .records
            .iter()
            .enumerate()
            .map(|(idx, record)| decode_segment(record, SegmentId(idx as u32)))
            .collect::<Result<Vec<_>, _>>()?;
        let graph = SegmentGraph::new(cells)?;

        let header = decoded.header;
        if header.random_seed != self.options.random_seed {
            self.options.random_seed = header.random_seed;
            self.random = Arc::new(RandomValues::generate(
                header.random_seed,
                self.options.random_table_size,
            ));
        }
        self.graph = Arc::new(graph);
        self.cycle = header.cycle_count;
        self.status.set_synapse_count(self.total_synapses() as u64);
        info!(
            target: "hanami-services",
            cluster = %self.uuid,
            segments = self.graph.len(),
            cycle = self.cycle,
            "Snapshot restored"
        );
        Ok(TaskResult::Restored {
            segments: self.graph.len(),
            skipped: decoded.skipped,
            truncated: decoded.truncated,
        })
    }

    fn save_snapshot_state(&mut self) -> ServiceResult<StepOutcome> {
        let uuid = self
            .queue
            .current_uuid()
            .ok_or_else(|| ServiceError::Internal("snapshot state without a task".into()))?;
        let blob = self.snapshot_blob();
        debug!(target: "hanami-services", cluster = %self.uuid, bytes = blob.len(), "Snapshot encoded");
        self.set_result(TaskResult::SnapshotBlob { bytes: blob });
        self.complete_task(uuid)
    }

    fn restore_snapshot_state(&mut self) -> ServiceResult<StepOutcome> {
        let (uuid, snapshot_id) = match self.queue.current_task() {
            Some(Task {
                uuid,
                payload: TaskPayload::SnapshotRestore { snapshot_id },
                ..
            }) => (*uuid, snapshot_id.clone()),
            _ => return Err(ServiceError::Internal("restore state without a restore task".into())),
        };
        let store = self
            .snapshot_store
            .clone()
            .ok_or_else(|| ServiceError::InvalidState("cluster has no snapshot store".into()))?;
        let blob = store.load(&snapshot_id)?;
        let summary = self.restore_graph(&blob)?;
        self.set_result(summary);
        self.complete_task(uuid)
    }

    // ------------------------------------------------------------------
    // Direct mode
    // ------------------------------------------------------------------

    /// Leave task mode; only possible while no task is active
    pub fn switch_to_direct(&mut self) -> ServiceResult<()> {
        if let Some(uuid) = self.queue.current_uuid() {
            return Err(ServiceError::InvalidState(format!("task {uuid} is still active")));
        }
        self.machine.fire(ClusterEvent::SwitchToDirect)?;
        self.publish_status();
        info!(target: "hanami-services", cluster = %self.uuid, "Switched to direct mode");
        Ok(())
    }

    pub fn switch_to_task(&mut self) -> ServiceResult<()> {
        self.machine.fire(ClusterEvent::SwitchToTask)?;
        self.publish_status();
        info!(target: "hanami-services", cluster = %self.uuid, "Switched to task mode");
        Ok(())
    }

    /// Run one forward cycle on a direct-mode input frame.
    ///
    /// The frame's values are split over the input segments in id order. The
    /// concatenated outputs are returned and, with a stream session attached,
    /// sent back as one frame.
    pub fn push_direct_input(&mut self, frame: &[u8]) -> ServiceResult<Vec<f32>> {
        if self.machine.current() != ClusterState::Direct {
            return Err(ServiceError::InvalidState(format!(
                "direct input needs DIRECT mode, cluster is in {}",
                self.machine.current()
            )));
        }
        let values = decode_frame(frame)?;

        let inputs = self.graph.ids_of_kind(SegmentKind::Input);
        let expected: usize = inputs.iter().map(|id| self.node_count(*id)).sum();
        if values.len() != expected {
            return Err(ServiceError::InvalidInput(format!(
                "direct frame holds {} values, input segments take {expected}",
                values.len()
            )));
        }
        let mut batch = CycleBatch::default();
        let mut offset = 0;
        for id in inputs {
            let count = self.node_count(id);
            batch = batch.with_inputs(id, values[offset..offset + count].to_vec());
            offset += count;
        }

        let ctx = Arc::new(CycleContext::new(self.cycle, false, Arc::clone(&self.random), batch));
        self.pool.run_cycle(&self.graph, &ctx, &self.backend)?;
        self.cycle += 1;
        self.status.increment_cycle();

        let outputs: Vec<f32> = self
            .graph
            .ids_of_kind(SegmentKind::Output)
            .into_iter()
            .filter_map(|id| self.graph.cell(id))
            .filter_map(|cell| cell.with_segment(|s: &OutputSegment| s.outputs()))
            .flatten()
            .collect();
        if let Some(stream) = &self.stream {
            stream.send_stream_message(&encode_frame(&outputs))?;
        }
        Ok(outputs)
    }

    /// Process every inbound frame waiting on the stream session.
    ///
    /// Bad frames are logged and dropped. Returns the number of frames processed.
    pub fn poll_stream(&mut self) -> usize {
        if self.machine.current() != ClusterState::Direct {
            return 0;
        }
        let Some(stream) = self.stream.clone() else {
            return 0;
        };
        let mut processed = 0;
        while let Some(frame) = stream.try_receive() {
            match self.push_direct_input(&frame) {
                Ok(_) => processed += 1,
                Err(err) => warn!(
                    target: "hanami-services",
                    cluster = %self.uuid, error = %err, "Dropping direct frame"
                ),
            }
        }
        processed
    }

    /// Stop the worker pool; the cluster cannot process cycles afterwards
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("uuid", &self.uuid)
            .field("name", &self.name)
            .field("state", &self.machine.current())
            .field("segments", &self.graph.len())
            .field("cycle", &self.cycle)
            .field("backend", &self.backend)
            .field("current_task", &self.queue.current_uuid())
            .finish()
    }
}

fn largest_dynamic_segment(graph: &SegmentGraph) -> usize {
    graph
        .cells()
        .iter()
        .filter(|cell| cell.kind() == SegmentKind::Dynamic)
        .map(|cell| cell.body().lock().number_of_nodes())
        .max()
        .unwrap_or(0)
}

fn not_found(resource: &str, uuid: Uuid) -> ServiceError {
    ServiceError::NotFound {
        resource: resource.to_string(),
        id: uuid.to_string(),
    }
}
