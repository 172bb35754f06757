// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Segment cycle benchmarks
//!
//! One learning cycle over an input -> dynamic -> output chain, for both
//! backends and a few dynamic segment sizes. Inputs are fixed; no I/O.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hanami_npu_engine::{
    link_segments, BackendType, BorderState, CpuBackend, CycleBatch, CycleContext, DynamicSegment,
    InputSegment, OutputSegment, ParallelBackend, ProcessingBackend, SchedulerConfig, SegmentCell,
    SegmentGraph, WorkerPool,
};
use hanami_npu_neural::{
    Brick, BrickId, BrickKind, FlowDirection, Position, RandomValues, SegmentId, SegmentNeighborList,
    SegmentSettings,
};
use std::sync::Arc;
use std::time::Duration;

fn build_graph(width: u32, hidden_bricks: u32) -> Arc<SegmentGraph> {
    let mut input = SegmentNeighborList::default();
    let mut dynamic = SegmentNeighborList::default();
    let mut output = SegmentNeighborList::default();
    link_segments(&mut input, SegmentId(0), 2, &mut dynamic, SegmentId(1), width, FlowDirection::Output);
    link_segments(&mut dynamic, SegmentId(1), 3, &mut output, SegmentId(2), width, FlowDirection::Output);
    let (input, dynamic, output) = (
        BorderState::new(input),
        BorderState::new(dynamic),
        BorderState::new(output),
    );

    let mut bricks = Vec::with_capacity(hidden_bricks as usize + 2);
    let mut first = Brick::new(BrickId(0), Position::new(0, 0, 0), BrickKind::Input, width);
    first.border_side = Some(9);
    bricks.push(first);
    for x in 1..=hidden_bricks {
        bricks.push(Brick::new(BrickId(x), Position::new(x as i32, 0, 0), BrickKind::Normal, width));
    }
    let mut last = Brick::new(
        BrickId(hidden_bricks + 1),
        Position::new(hidden_bricks as i32 + 1, 0, 0),
        BrickKind::Output,
        width,
    );
    last.border_side = Some(3);
    bricks.push(last);

    let body = DynamicSegment::new(
        SegmentId(1),
        SegmentSettings::default(),
        bricks,
        dynamic.transfer_size(),
        42,
    )
    .unwrap();
    let cells = vec![
        SegmentCell::new(
            SegmentId(0),
            "input",
            input.clone(),
            Box::new(InputSegment::new(SegmentId(0), width as usize, input.transfer_size())),
        ),
        SegmentCell::new(SegmentId(1), "dynamic", dynamic, Box::new(body)),
        SegmentCell::new(
            SegmentId(2),
            "output",
            output.clone(),
            Box::new(OutputSegment::new(SegmentId(2), width as usize, output.transfer_size())),
        ),
    ];
    Arc::new(SegmentGraph::new(cells).unwrap())
}

fn context(cycle: u64, width: u32, random: &Arc<RandomValues>) -> Arc<CycleContext> {
    let values: Vec<f32> = (0..width).map(|i| (i % 10) as f32 / 10.0).collect();
    let batch = CycleBatch::default()
        .with_inputs(SegmentId(0), values.clone())
        .with_expected(SegmentId(2), values);
    Arc::new(CycleContext::new(cycle, true, Arc::clone(random), batch))
}

fn bench_learning_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("learning_cycle");
    group.measurement_time(Duration::from_secs(5));
    let random = Arc::new(RandomValues::generate(11, 1 << 14));
    let pool = WorkerPool::new(SchedulerConfig {
        worker_count: 0,
        ..SchedulerConfig::default()
    })
    .unwrap();

    for &(width, hidden) in &[(16u32, 4u32), (64, 8), (128, 16)] {
        let nodes = (width * (hidden + 2)) as u64;
        group.throughput(Throughput::Elements(nodes));
        for backend_type in [BackendType::Cpu, BackendType::Parallel] {
            let backend: Arc<dyn ProcessingBackend> = match backend_type {
                BackendType::Parallel => Arc::new(ParallelBackend::new()),
                _ => Arc::new(CpuBackend::new()),
            };
            let graph = build_graph(width, hidden);
            let mut cycle = 0u64;
            group.bench_with_input(
                BenchmarkId::new(backend_type.to_string(), nodes),
                &width,
                |b, &width| {
                    b.iter(|| {
                        cycle += 1;
                        let ctx = context(cycle, width, &random);
                        black_box(pool.run_cycle(&graph, &ctx, &backend).unwrap())
                    })
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_learning_cycle);
criterion_main!(benches);
