// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization for Hanami
//!
//! Console output is always available. With the `file-logging` feature each
//! run also gets its own folder with per-crate JSON log files.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDateTime, Utc};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::{LogFormat, LoggingConfig};

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Keeps file writers alive; logs are flushed when dropped
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run folder of this process, if file logging is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Build the console filter, letting `RUST_LOG` win when it is set
pub fn build_env_filter(debug_flags: &CrateDebugFlags, default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(debug_flags.to_filter_string_with_default(default_level)))
}

/// Install a console-only subscriber
///
/// Fails if a global subscriber is already installed.
pub fn init_console_logging(debug_flags: &CrateDebugFlags) -> Result<()> {
    init_with_config(debug_flags, &LoggingConfig::default()).map(|_| ())
}

/// Install the global subscriber described by `config`
pub fn init_with_config(debug_flags: &CrateDebugFlags, config: &LoggingConfig) -> Result<LoggingGuard> {
    if config.file_logging {
        return init_file_logging(debug_flags, config);
    }

    let env_filter = build_env_filter(debug_flags, &config.level);
    let console = console_layer(config.format).with_filter(env_filter);
    Registry::default()
        .with(console)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: Vec::new(),
        log_dir: None,
    })
}

fn console_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    match format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
    }
}

#[cfg(not(feature = "file-logging"))]
fn init_file_logging(_debug_flags: &CrateDebugFlags, _config: &LoggingConfig) -> Result<LoggingGuard> {
    Err(anyhow!(
        "file logging requested but hanami-observability was built without the `file-logging` feature"
    ))
}

/// Console output plus one JSON file per crate and a combined file
///
/// ```text
/// ./logs/
///   └── run_20250101_120000/
///       ├── hanami-npu-engine.log
///       ├── hanami-services.log
///       └── hanami.log (combined)
/// ```
#[cfg(feature = "file-logging")]
fn init_file_logging(debug_flags: &CrateDebugFlags, config: &LoggingConfig) -> Result<LoggingGuard> {
    use tracing_appender::rolling;

    let run_folder = config.log_dir.join(format!(
        "{RUN_PREFIX}{}",
        Utc::now().format(RUN_TIMESTAMP_FORMAT)
    ));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;

    cleanup_old_logs(&config.log_dir, config.retention_days, config.retention_runs)?;

    let mut layers = Vec::new();
    let mut file_guards = Vec::new();

    layers.push(
        console_layer(config.format)
            .with_filter(build_env_filter(debug_flags, &config.level))
            .boxed(),
    );

    for crate_name in crate::KNOWN_CRATES {
        let appender = rolling::daily(&run_folder, format!("{crate_name}.log"));
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guards.push(guard);
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_file(true)
                .with_line_number(true)
                .json()
                .with_filter(EnvFilter::new(format!("{crate_name}=debug,off")))
                .boxed(),
        );
    }

    let combined = rolling::daily(&run_folder, "hanami.log");
    let (writer, guard) = tracing_appender::non_blocking(combined);
    file_guards.push(guard);
    layers.push(
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_file(true)
            .with_line_number(true)
            .json()
            .with_filter(EnvFilter::new(debug_flags.to_filter_string_with_default(&config.level)))
            .boxed(),
    );

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(LoggingGuard {
        _file_guards: file_guards,
        log_dir: Some(run_folder),
    })
}

/// Remove run folders older than `retention_days`, then trim to the newest
/// `retention_runs`. Returns how many folders were removed.
pub fn cleanup_old_logs(base_log_dir: &Path, retention_days: u64, retention_runs: usize) -> Result<usize> {
    if !base_log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now().naive_utc() - chrono::Duration::days(retention_days as i64);
    let mut runs: Vec<(PathBuf, NaiveDateTime)> = Vec::new();

    let entries = std::fs::read_dir(base_log_dir)
        .with_context(|| format!("Failed to read log directory: {}", base_log_dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let stamp = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(RUN_PREFIX))
            .and_then(|s| NaiveDateTime::parse_from_str(s, RUN_TIMESTAMP_FORMAT).ok());
        if let Some(stamp) = stamp {
            runs.push((path, stamp));
        }
    }

    // newest first
    runs.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (index, (path, stamp)) in runs.iter().enumerate() {
        if *stamp < cutoff || index >= retention_runs {
            match std::fs::remove_dir_all(path) {
                Ok(()) => removed += 1,
                Err(e) => eprintln!("Warning: Failed to remove old log directory {}: {}", path.display(), e),
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_run(base: &Path, stamp: &str) -> PathBuf {
        let dir = base.join(format!("{RUN_PREFIX}{stamp}"));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_cleanup_missing_dir_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_old_logs(&tmp.path().join("nope"), 30, 10).unwrap(), 0);
    }

    #[test]
    fn test_cleanup_removes_expired_runs() {
        let tmp = tempfile::tempdir().unwrap();
        let old = make_run(tmp.path(), "20000101_000000");
        let recent = make_run(tmp.path(), &Utc::now().format(RUN_TIMESTAMP_FORMAT).to_string());
        let unrelated = tmp.path().join("keep_me");
        std::fs::create_dir_all(&unrelated).unwrap();

        assert_eq!(cleanup_old_logs(tmp.path(), 30, 10).unwrap(), 1);
        assert!(!old.exists());
        assert!(recent.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_cleanup_keeps_newest_runs() {
        let tmp = tempfile::tempdir().unwrap();
        let now = Utc::now().naive_utc();
        let dirs: Vec<PathBuf> = (0..4)
            .map(|i| {
                let stamp = (now - chrono::Duration::minutes(i)).format(RUN_TIMESTAMP_FORMAT);
                make_run(tmp.path(), &stamp.to_string())
            })
            .collect();

        assert_eq!(cleanup_old_logs(tmp.path(), 30, 2).unwrap(), 2);
        assert!(dirs[0].exists());
        assert!(dirs[1].exists());
        assert!(!dirs[2].exists());
        assert!(!dirs[3].exists());
    }
}
