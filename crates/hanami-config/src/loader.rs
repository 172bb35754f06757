// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later tiers win:
//! 1. TOML file (base values)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, HanamiConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "hanami_configuration.toml";

/// Find the Hanami configuration file
///
/// Search order:
/// 1. `HANAMI_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Up to 5 parent directories
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("HANAMI_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by HANAMI_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");
    Err(ConfigError::FileNotFound(format!(
        "'{CONFIG_FILE_NAME}' not found in any of these locations:\n{search_list}\n\nSet HANAMI_CONFIG_PATH to specify a custom location."
    )))
}

/// Load configuration from a TOML file and apply overrides
///
/// With `config_path == None` the file is searched with [`find_config_file`].
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<HanamiConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: HanamiConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }
    Ok(config)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `HANAMI_DATA_DIR` -> `system.data_dir`
/// - `HANAMI_LOG_LEVEL` -> `system.log_level`
/// - `HANAMI_DEBUG` -> `system.debug`
/// - `HANAMI_WORKER_COUNT` -> `workers.worker_count`
/// - `HANAMI_STALL_TIMEOUT_MS` -> `workers.stall_timeout_ms`
/// - `HANAMI_BACKEND` -> `cluster.backend`
/// - `HANAMI_RANDOM_SEED` -> `cluster.random_seed`
/// - `HANAMI_SNAPSHOT_DIR` -> `snapshot.output_dir`
pub fn apply_environment_overrides(config: &mut HanamiConfig) {
    if let Ok(value) = env::var("HANAMI_DATA_DIR") {
        config.system.data_dir = PathBuf::from(value);
    }
    if let Ok(value) = env::var("HANAMI_LOG_LEVEL") {
        config.system.log_level = value;
    }
    if let Ok(value) = env::var("HANAMI_DEBUG") {
        config.system.debug = parse_flag(&value);
    }

    if let Ok(value) = env::var("HANAMI_WORKER_COUNT") {
        if let Ok(count) = value.parse::<usize>() {
            config.workers.worker_count = count;
        }
    }
    if let Ok(value) = env::var("HANAMI_STALL_TIMEOUT_MS") {
        if let Ok(ms) = value.parse::<u64>() {
            config.workers.stall_timeout_ms = ms;
        }
    }

    if let Ok(value) = env::var("HANAMI_BACKEND") {
        config.cluster.backend = value;
    }
    if let Ok(value) = env::var("HANAMI_RANDOM_SEED") {
        if let Ok(seed) = value.parse::<u64>() {
            config.cluster.random_seed = seed;
        }
    }

    if let Ok(value) = env::var("HANAMI_SNAPSHOT_DIR") {
        config.snapshot.output_dir = PathBuf::from(value);
    }
}

/// Apply CLI argument overrides to configuration
///
/// Keys: `worker_count`, `backend`, `random_seed`, `log_level`, `debug`,
/// `snapshot_dir`, `data_dir`. Unparseable values are ignored.
pub fn apply_cli_overrides(config: &mut HanamiConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("worker_count") {
        if let Ok(count) = value.parse::<usize>() {
            config.workers.worker_count = count;
        }
    }
    if let Some(value) = cli_args.get("backend") {
        config.cluster.backend = value.clone();
    }
    if let Some(value) = cli_args.get("random_seed") {
        if let Ok(seed) = value.parse::<u64>() {
            config.cluster.random_seed = seed;
        }
    }
    if let Some(value) = cli_args.get("log_level") {
        config.system.log_level = value.clone();
    }
    if let Some(value) = cli_args.get("debug") {
        config.system.debug = parse_flag(value);
    }
    if let Some(value) = cli_args.get("snapshot_dir") {
        config.snapshot.output_dir = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("data_dir") {
        config.system.data_dir = PathBuf::from(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom_config.toml");
        File::create(&config_path).unwrap();

        env::set_var("HANAMI_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("HANAMI_CONFIG_PATH");

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_missing_env_path_is_an_error() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        env::set_var("HANAMI_CONFIG_PATH", dir.path().join("absent.toml"));
        let result = find_config_file();
        env::remove_var("HANAMI_CONFIG_PATH");

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::remove_var("HANAMI_WORKER_COUNT");
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[workers]").unwrap();
        writeln!(file, "worker_count = 4").unwrap();
        writeln!(file, "[cluster]").unwrap();
        writeln!(file, "backend = \"cpu\"").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.workers.worker_count, 4);
        assert_eq!(config.cluster.backend, "cpu");
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = HanamiConfig::default();

        env::set_var("HANAMI_WORKER_COUNT", "6");
        env::set_var("HANAMI_RANDOM_SEED", "not-a-number");
        apply_environment_overrides(&mut config);
        env::remove_var("HANAMI_WORKER_COUNT");
        env::remove_var("HANAMI_RANDOM_SEED");

        assert_eq!(config.workers.worker_count, 6);
        assert_eq!(config.cluster.random_seed, HanamiConfig::default().cluster.random_seed);
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[workers]").unwrap();
        writeln!(file, "worker_count = 1").unwrap();
        writeln!(file, "[cluster]").unwrap();
        writeln!(file, "backend = \"cpu\"").unwrap();

        env::set_var("HANAMI_WORKER_COUNT", "3");
        env::set_var("HANAMI_BACKEND", "parallel");

        let mut cli_args = HashMap::new();
        cli_args.insert("backend".to_string(), "auto".to_string());
        let config = load_config(Some(&config_path), Some(&cli_args)).unwrap();

        env::remove_var("HANAMI_WORKER_COUNT");
        env::remove_var("HANAMI_BACKEND");

        // CLI wins for backend, env wins for worker count
        assert_eq!(config.cluster.backend, "auto");
        assert_eq!(config.workers.worker_count, 3);
    }
}
