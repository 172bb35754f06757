// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Build a cluster from a topology document and run tasks on it.
//!
//! Inputs come from a JSON task file:
//!
//! ```json
//! { "learn": [ { "inputs": { "in": [0.9, 0.4] }, "expected": { "out": [1.0] } } ],
//!   "request": [ { "inputs": { "in": [0.9, 0.4] } } ] }
//! ```
//!
//! Without a task file every input segment gets a single all-ones request.
//! `--snapshot` stores the trained cluster in the configured snapshot directory.

use anyhow::{bail, Context, Result};
use hanami::config::{load_config, validate_config, HanamiConfig};
use hanami::engine::SegmentKind;
use hanami::observability::{init_with_config, parse_debug_flags, LogFormat, LoggingConfig};
use hanami::services::{
    Cluster, ClusterOptions, FileSnapshotStore, Sample, Task, TaskPayload, TaskResult, TaskState,
    TopologyDescription,
};
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const MAX_STEPS: usize = 1_000_000;

struct Args {
    topology: PathBuf,
    tasks: Option<PathBuf>,
    config: Option<PathBuf>,
    overrides: HashMap<String, String>,
    snapshot: bool,
}

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: run_cluster <topology.json> [--tasks <tasks.json>] [--config <path>]\n\
         \x20                  [--workers <n>] [--backend cpu|parallel|auto] [--seed <n>]\n\
         \x20                  [--snapshot] [--debug-all | --debug-<crate>]\n"
    );
    process::exit(2);
}

fn parse_args() -> Args {
    let mut topology = None;
    let mut tasks = None;
    let mut config = None;
    let mut overrides = HashMap::new();
    let mut snapshot = false;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--tasks" => tasks = Some(PathBuf::from(args.next().unwrap_or_else(|| usage_and_exit()))),
            "--config" => config = Some(PathBuf::from(args.next().unwrap_or_else(|| usage_and_exit()))),
            "--workers" => {
                overrides.insert("worker_count".to_string(), args.next().unwrap_or_else(|| usage_and_exit()));
            }
            "--backend" => {
                overrides.insert("backend".to_string(), args.next().unwrap_or_else(|| usage_and_exit()));
            }
            "--seed" => {
                overrides.insert("random_seed".to_string(), args.next().unwrap_or_else(|| usage_and_exit()));
            }
            "--snapshot" => snapshot = true,
            "-h" | "--help" => usage_and_exit(),
            flag if flag.starts_with("--debug") => {}
            other if other.starts_with("--") => {
                eprintln!("Unknown argument: {other}");
                usage_and_exit();
            }
            path => topology = Some(PathBuf::from(path)),
        }
    }

    Args {
        topology: topology.unwrap_or_else(|| usage_and_exit()),
        tasks,
        config,
        overrides,
        snapshot,
    }
}

fn load_configuration(args: &Args) -> Result<HanamiConfig> {
    match load_config(args.config.as_deref(), Some(&args.overrides)) {
        Ok(config) => Ok(config),
        Err(err) if args.config.is_none() => {
            eprintln!("No configuration file ({err}); using defaults");
            let mut config = HanamiConfig::default();
            hanami::config::apply_environment_overrides(&mut config);
            hanami::config::apply_cli_overrides(&mut config, &args.overrides);
            Ok(config)
        }
        Err(err) => Err(err).context("failed to load configuration"),
    }
}

fn logging_config(config: &HanamiConfig) -> LoggingConfig {
    LoggingConfig {
        level: config.system.log_level.clone(),
        format: LogFormat::Text,
        file_logging: config.logging.file_logging,
        log_dir: config.logging.log_dir.clone(),
        retention_days: config.logging.retention_days,
        ..LoggingConfig::default()
    }
}

fn samples(value: Option<&Value>) -> Result<Vec<Sample>> {
    match value {
        None => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone()).context("malformed samples"),
    }
}

/// Tasks from the task file, or one all-ones request
fn build_tasks(args: &Args, cluster: &Cluster) -> Result<Vec<Task>> {
    let Some(path) = &args.tasks else {
        let graph = cluster.graph();
        let mut sample = Sample::new();
        for id in graph.ids_of_kind(SegmentKind::Input) {
            if let Some(cell) = graph.cell(id) {
                let nodes = cell.body().lock().number_of_nodes();
                sample = sample.with_input(cell.name(), vec![1.0; nodes]);
            }
        }
        return Ok(vec![Task::request("probe", TaskPayload::Image { samples: vec![sample] })]);
    };

    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let doc: Value = serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))?;
    let mut tasks = Vec::new();
    let learn = samples(doc.get("learn"))?;
    if !learn.is_empty() {
        tasks.push(Task::learn("learn", TaskPayload::Image { samples: learn }));
    }
    let request = samples(doc.get("request"))?;
    if !request.is_empty() {
        tasks.push(Task::request("request", TaskPayload::Image { samples: request }));
    }
    if tasks.is_empty() {
        bail!("{} holds no learn or request samples", path.display());
    }
    Ok(tasks)
}

fn report(cluster: &Cluster, uuid: Uuid) {
    let Some(task) = cluster.task(uuid) else {
        return;
    };
    let progress = &task.progress;
    println!(
        "{} {} [{}] cycles {}/{}",
        task.task_type, task.uuid, task.name, progress.current_cycle, progress.total_cycles
    );
    if task.state() != TaskState::Finished {
        println!("  state: {:?} {}", task.state(), progress.failure.as_deref().unwrap_or(""));
        return;
    }
    match &task.result {
        Some(TaskResult::Outputs { cycles }) => {
            for (idx, outputs) in cycles.iter().enumerate() {
                for (segment, values) in outputs {
                    println!("  cycle {idx} {segment}: {values:?}");
                }
            }
        }
        Some(TaskResult::SnapshotStored { snapshot_id, size_bytes }) => {
            println!("  snapshot {snapshot_id} ({size_bytes} bytes)");
        }
        _ => {}
    }
}

fn run() -> Result<()> {
    let args = parse_args();
    let config = load_configuration(&args)?;
    validate_config(&config).context("invalid configuration")?;
    let _guard = init_with_config(&parse_debug_flags(), &logging_config(&config))?;

    let options = ClusterOptions::from_config(&config)?;
    let json = fs::read_to_string(&args.topology)
        .with_context(|| format!("failed to read {}", args.topology.display()))?;
    let topology = TopologyDescription::from_json(&json)?;
    let name = topology.name.clone().unwrap_or_else(|| "cluster".to_string());

    let mut cluster = Cluster::new(name, &topology, options)?;
    if args.snapshot {
        let store = FileSnapshotStore::new(&config.snapshot.output_dir, &config.snapshot.file_extension)?;
        cluster.set_snapshot_store(Some(Arc::new(store)));
    }

    let mut uuids: Vec<Uuid> = build_tasks(&args, &cluster)?
        .into_iter()
        .map(|task| cluster.add_task(task))
        .collect();
    if args.snapshot {
        uuids.push(cluster.add_task(Task::snapshot_save(cluster.name().to_string())));
    }

    let steps = cluster.run_until_idle(MAX_STEPS);
    if !cluster.is_idle() {
        warn!(target: "hanami", steps, "Step limit reached with tasks pending");
    }
    info!(
        target: "hanami",
        cycles = cluster.cycle(),
        synapses = cluster.total_synapses(),
        "Run complete"
    );

    for uuid in uuids {
        report(&cluster, uuid);
    }
    cluster.shutdown();
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("run_cluster: {err:#}");
        process::exit(1);
    }
}
