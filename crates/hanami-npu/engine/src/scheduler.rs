// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Phase Scheduler
//!
//! A fixed pool of worker threads shares one lock-free segment queue. Each
//! phase is framed by a start and an end barrier:
//!
//! ```text
//! driver:  push all ids -> start.wait() -> drain -> end.wait() -> collect
//! worker:                  start.wait() -> drain -> end.wait()
//! ```
//!
//! A segment that is not ready is pushed back. When nothing completes for
//! `stall_timeout` the phase is abandoned and reported as
//! [`EngineError::PhaseStalled`]. With zero workers the driver drains the
//! queue alone.

use crate::backend::ProcessingBackend;
use crate::border::{process_segment, SegmentGraph};
use crate::context::{CycleContext, Phase};
use crate::error::{EngineError, Result};
use crate::stats::CycleStats;
use crossbeam::channel;
use crossbeam::queue::SegQueue;
use hanami_npu_neural::SegmentId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// Worker threads besides the driving thread; 0 runs phases inline
    pub worker_count: usize,
    /// Sleep when the queue is momentarily empty
    pub idle_sleep: Duration,
    /// Abandon a phase after this long without a completed segment
    pub stall_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            idle_sleep: Duration::from_micros(200),
            stall_timeout: Duration::from_secs(5),
        }
    }
}

/// Outcome of one phase
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub segments_processed: usize,
    /// Times a segment was pushed back because its inputs were missing
    pub requeues: usize,
    pub stats: CycleStats,
    pub elapsed: Duration,
}

/// Outcome of one cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    pub phases: Vec<PhaseReport>,
    pub stats: CycleStats,
}

#[derive(Clone)]
struct PhaseJob {
    graph: Arc<SegmentGraph>,
    phase: Phase,
    ctx: Arc<CycleContext>,
    backend: Arc<dyn ProcessingBackend>,
}

struct Shared {
    queue: SegQueue<SegmentId>,
    job: Mutex<Option<PhaseJob>>,
    start: Barrier,
    end: Barrier,
    remaining: AtomicUsize,
    requeues: AtomicUsize,
    shutdown: AtomicBool,
    abandoned: AtomicBool,
    last_progress: Mutex<Instant>,
    stats: Mutex<CycleStats>,
    failure: Mutex<Option<EngineError>>,
    idle_sleep: Duration,
    stall_timeout: Duration,
}

impl Shared {
    fn fail(&self, err: EngineError) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(err);
        }
        self.abandoned.store(true, Ordering::Release);
    }

    fn check_stall(&self, phase: Phase) {
        if self.last_progress.lock().elapsed() >= self.stall_timeout {
            let pending = self.remaining.load(Ordering::Acquire);
            self.fail(EngineError::PhaseStalled { phase, pending });
        }
    }

    /// Pull segments until the phase is complete or abandoned
    fn drain(&self, job: &PhaseJob) {
        while self.remaining.load(Ordering::Acquire) > 0 && !self.abandoned.load(Ordering::Acquire) {
            let Some(id) = self.queue.pop() else {
                self.check_stall(job.phase);
                thread::sleep(self.idle_sleep);
                continue;
            };

            match process_segment(&job.graph, id, job.phase, &job.ctx, job.backend.as_ref()) {
                Ok(Some(stats)) => {
                    *self.stats.lock() += stats;
                    *self.last_progress.lock() = Instant::now();
                    self.remaining.fetch_sub(1, Ordering::AcqRel);
                }
                Ok(None) => {
                    self.queue.push(id);
                    self.requeues.fetch_add(1, Ordering::Relaxed);
                    self.check_stall(job.phase);
                    thread::yield_now();
                }
                Err(err) => {
                    error!(target: "hanami-npu-engine", segment = %id, phase = %job.phase, error = %err, "Segment processing failed");
                    self.fail(err);
                }
            }
        }
    }
}

/// Worker pool executing phases over a [`SegmentGraph`]
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    config: SchedulerConfig,
    stopped: bool,
}

impl WorkerPool {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        let parties = config.worker_count + 1;
        let shared = Arc::new(Shared {
            queue: SegQueue::new(),
            job: Mutex::new(None),
            start: Barrier::new(parties),
            end: Barrier::new(parties),
            remaining: AtomicUsize::new(0),
            requeues: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            abandoned: AtomicBool::new(false),
            last_progress: Mutex::new(Instant::now()),
            stats: Mutex::new(CycleStats::default()),
            failure: Mutex::new(None),
            idle_sleep: config.idle_sleep,
            stall_timeout: config.stall_timeout,
        });

        // Workers only join the barriers once every thread exists; dropping
        // `go_tx` on a spawn failure releases the ones already started.
        let (go_tx, go_rx) = channel::bounded::<()>(config.worker_count);
        let mut workers = Vec::with_capacity(config.worker_count);
        for idx in 0..config.worker_count {
            let shared = Arc::clone(&shared);
            let go_rx = go_rx.clone();
            let handle = thread::Builder::new()
                .name(format!("hanami-worker-{idx}"))
                .spawn(move || {
                    if go_rx.recv().is_err() {
                        return;
                    }
                    worker_loop(&shared);
                })
                .map_err(|e| EngineError::WorkerPool(format!("failed to spawn worker {idx}: {e}")))?;
            workers.push(handle);
        }
        for _ in 0..config.worker_count {
            go_tx
                .send(())
                .map_err(|e| EngineError::WorkerPool(format!("failed to start workers: {e}")))?;
        }

        info!(
            target: "hanami-npu-engine",
            workers = config.worker_count,
            stall_timeout_ms = config.stall_timeout.as_millis() as u64,
            "Worker pool started"
        );
        Ok(Self {
            shared,
            workers,
            config,
            stopped: false,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Run one phase over every segment in `graph`
    pub fn run_phase(
        &self,
        graph: &Arc<SegmentGraph>,
        phase: Phase,
        ctx: &Arc<CycleContext>,
        backend: &Arc<dyn ProcessingBackend>,
    ) -> Result<PhaseReport> {
        if self.stopped {
            return Err(EngineError::WorkerPool("worker pool is shut down".to_string()));
        }
        let started = Instant::now();
        let shared = &self.shared;

        while shared.queue.pop().is_some() {}
        *shared.stats.lock() = CycleStats::default();
        *shared.failure.lock() = None;
        *shared.last_progress.lock() = started;
        shared.requeues.store(0, Ordering::Relaxed);
        shared.abandoned.store(false, Ordering::Release);
        shared.remaining.store(graph.len(), Ordering::Release);
        for cell in graph.cells() {
            shared.queue.push(cell.id());
        }

        let job = PhaseJob {
            graph: Arc::clone(graph),
            phase,
            ctx: Arc::clone(ctx),
            backend: Arc::clone(backend),
        };
        *shared.job.lock() = Some(job.clone());

        if self.workers.is_empty() {
            shared.drain(&job);
        } else {
            shared.start.wait();
            shared.drain(&job);
            shared.end.wait();
        }

        *shared.job.lock() = None;
        while shared.queue.pop().is_some() {}

        if let Some(err) = shared.failure.lock().take() {
            warn!(target: "hanami-npu-engine", %phase, error = %err, "Phase abandoned");
            return Err(err);
        }

        let remaining = shared.remaining.load(Ordering::Acquire);
        let report = PhaseReport {
            phase,
            segments_processed: graph.len() - remaining,
            requeues: shared.requeues.load(Ordering::Relaxed),
            stats: *shared.stats.lock(),
            elapsed: started.elapsed(),
        };
        debug!(
            target: "hanami-npu-engine",
            %phase,
            segments = report.segments_processed,
            requeues = report.requeues,
            nodes_active = report.stats.nodes_active,
            synapses_created = report.stats.synapses_created,
            "Phase complete"
        );
        Ok(report)
    }

    /// Run every phase of one cycle; border state is reset on failure
    pub fn run_cycle(
        &self,
        graph: &Arc<SegmentGraph>,
        ctx: &Arc<CycleContext>,
        backend: &Arc<dyn ProcessingBackend>,
    ) -> Result<CycleReport> {
        let mut report = CycleReport {
            cycle: ctx.cycle,
            ..CycleReport::default()
        };
        for &phase in ctx.phases() {
            match self.run_phase(graph, phase, ctx, backend) {
                Ok(phase_report) => {
                    report.stats += phase_report.stats;
                    report.phases.push(phase_report);
                }
                Err(err) => {
                    graph.reset_borders();
                    return Err(err);
                }
            }
        }
        Ok(report)
    }

    /// Stop and join all workers
    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.shared.shutdown.store(true, Ordering::Release);
        if !self.workers.is_empty() {
            self.shared.start.wait();
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!(target: "hanami-npu-engine", "Worker thread panicked");
            }
        }
        info!(target: "hanami-npu-engine", "Worker pool stopped");
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        shared.start.wait();
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }
        let job = shared.job.lock().clone();
        if let Some(job) = job {
            shared.drain(&job);
        }
        shared.end.wait();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("config", &self.config)
            .field("stopped", &self.stopped)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::border::{link_segments, BorderState, SegmentCell};
    use crate::context::CycleBatch;
    use crate::segment::{InputSegment, OutputSegment};
    use hanami_npu_neural::{FlowDirection, RandomValues, SegmentNeighborList};

    fn chain() -> Arc<SegmentGraph> {
        let mut a = SegmentNeighborList::default();
        let mut b = SegmentNeighborList::default();
        link_segments(&mut a, SegmentId(0), 3, &mut b, SegmentId(1), 2, FlowDirection::Output);
        let (a, b) = (BorderState::new(a), BorderState::new(b));
        let cells = vec![
            SegmentCell::new(SegmentId(0), "in", a, Box::new(InputSegment::new(SegmentId(0), 2, 2))),
            SegmentCell::new(SegmentId(1), "out", b, Box::new(OutputSegment::new(SegmentId(1), 2, 2))),
        ];
        Arc::new(SegmentGraph::new(cells).unwrap())
    }

    fn ctx(learning: bool) -> Arc<CycleContext> {
        let batch = CycleBatch::default()
            .with_inputs(SegmentId(0), vec![0.25, 0.75])
            .with_expected(SegmentId(1), vec![1.0, 0.0]);
        Arc::new(CycleContext::new(
            0,
            learning,
            Arc::new(RandomValues::generate(3, 64)),
            batch,
        ))
    }

    fn outputs(graph: &SegmentGraph) -> Vec<f32> {
        graph
            .cell(SegmentId(1))
            .unwrap()
            .with_segment(|s: &OutputSegment| s.outputs())
            .unwrap()
    }

    #[test]
    fn test_inline_cycle() {
        let pool = WorkerPool::new(SchedulerConfig {
            worker_count: 0,
            ..SchedulerConfig::default()
        })
        .unwrap();
        let graph = chain();
        let backend: Arc<dyn ProcessingBackend> = Arc::new(CpuBackend::new());

        let report = pool.run_cycle(&graph, &ctx(true), &backend).unwrap();

        assert_eq!(report.phases.len(), 4);
        assert!(report.phases.iter().all(|p| p.segments_processed == 2));
        assert_eq!(outputs(&graph), vec![0.25, 0.75]);
    }

    #[test]
    fn test_threaded_matches_inline() {
        let backend: Arc<dyn ProcessingBackend> = Arc::new(CpuBackend::new());
        let inline = WorkerPool::new(SchedulerConfig {
            worker_count: 0,
            ..SchedulerConfig::default()
        })
        .unwrap();
        let threaded = WorkerPool::new(SchedulerConfig {
            worker_count: 3,
            ..SchedulerConfig::default()
        })
        .unwrap();
        let (g1, g2) = (chain(), chain());

        for _ in 0..5 {
            inline.run_cycle(&g1, &ctx(false), &backend).unwrap();
            threaded.run_cycle(&g2, &ctx(false), &backend).unwrap();
        }
        assert_eq!(outputs(&g1), outputs(&g2));
    }

    /// Two segments feeding each other: neither is ever ready in forward
    fn cyclic() -> Arc<SegmentGraph> {
        let mut a = SegmentNeighborList::default();
        let mut b = SegmentNeighborList::default();
        link_segments(&mut a, SegmentId(0), 0, &mut b, SegmentId(1), 1, FlowDirection::Output);
        link_segments(&mut a, SegmentId(0), 1, &mut b, SegmentId(1), 1, FlowDirection::Input);
        let (a, b) = (BorderState::new(a), BorderState::new(b));
        let cells = vec![
            SegmentCell::new(SegmentId(0), "a", a, Box::new(InputSegment::new(SegmentId(0), 1, 2))),
            SegmentCell::new(SegmentId(1), "b", b, Box::new(OutputSegment::new(SegmentId(1), 1, 2))),
        ];
        Arc::new(SegmentGraph::new(cells).unwrap())
    }

    #[test]
    fn test_unready_segments_stall() {
        let pool = WorkerPool::new(SchedulerConfig {
            worker_count: 1,
            idle_sleep: Duration::from_micros(50),
            stall_timeout: Duration::from_millis(50),
        })
        .unwrap();
        let graph = cyclic();
        let backend: Arc<dyn ProcessingBackend> = Arc::new(CpuBackend::new());

        let result = pool.run_phase(&graph, Phase::Forward, &ctx(false), &backend);
        match result {
            Err(EngineError::PhaseStalled { phase, pending }) => {
                assert_eq!(phase, Phase::Forward);
                assert_eq!(pending, 2);
            }
            other => panic!("expected stall, got {other:?}"),
        }

        // The pool stays usable after a stall.
        let report = pool
            .run_phase(&graph, Phase::InputMapping, &ctx(false), &backend)
            .unwrap();
        assert_eq!(report.segments_processed, 2);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut pool = WorkerPool::new(SchedulerConfig::default()).unwrap();
        assert_eq!(pool.worker_count(), 2);
        pool.shutdown();
        pool.shutdown();
        let graph = chain();
        let backend: Arc<dyn ProcessingBackend> = Arc::new(CpuBackend::new());
        assert!(pool.run_phase(&graph, Phase::Forward, &ctx(false), &backend).is_err());
    }
}
