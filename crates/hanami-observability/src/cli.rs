// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! CLI argument parsing for per-crate debug flags
//!
//! Supports flags like `--debug-hanami-services` and `--debug-all`.

use std::collections::HashMap;
use std::env;

use crate::KNOWN_CRATES;

/// Per-crate debug switches
///
/// ```rust
/// use hanami_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-hanami-services".to_string()]);
/// assert!(flags.is_enabled("hanami-services"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrateDebugFlags {
    pub enabled_crates: HashMap<String, bool>,
}

impl CrateDebugFlags {
    /// Parse `--debug-{crate-name}` and `--debug-all` arguments
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = CrateDebugFlags::default();
        for arg in args {
            if arg == "--debug-all" {
                flags.enable_all();
            } else if let Some(crate_name) = arg.strip_prefix("--debug-") {
                flags.enabled_crates.insert(crate_name.to_string(), true);
            }
        }
        flags
    }

    pub fn enable_all(&mut self) {
        for crate_name in KNOWN_CRATES {
            self.enabled_crates.insert(crate_name.to_string(), true);
        }
    }

    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains_key(crate_name)
    }

    pub fn enabled_crates(&self) -> Vec<&String> {
        self.enabled_crates.keys().collect()
    }

    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// `DEBUG` for enabled crates, `INFO` otherwise
    pub fn log_level(&self, crate_name: &str) -> tracing::Level {
        if self.is_enabled(crate_name) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// `EnvFilter` directive string, e.g. `hanami-services=debug,info`
    pub fn to_filter_string(&self) -> String {
        self.to_filter_string_with_default("info")
    }

    /// Same as [`Self::to_filter_string`] with a custom level for everything else
    pub fn to_filter_string_with_default(&self, default_level: &str) -> String {
        let mut names: Vec<_> = self.enabled_crates.keys().collect();
        names.sort();
        let mut filters: Vec<String> = names.iter().map(|name| format!("{name}=debug")).collect();
        filters.push(default_level.to_lowercase());
        filters.join(",")
    }
}

/// Debug flags from command-line arguments and `HANAMI_DEBUG`
///
/// `HANAMI_DEBUG` is a comma-separated list of crate names, or `all`.
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());
    if let Ok(env_var) = env::var("HANAMI_DEBUG") {
        merge_env_flags(&mut flags, &env_var);
    }
    flags
}

fn merge_env_flags(flags: &mut CrateDebugFlags, env_var: &str) {
    if env_var.trim() == "all" {
        flags.enable_all();
        return;
    }
    for crate_name in env_var.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        flags.enabled_crates.insert(crate_name.to_string(), true);
    }
}

pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug-{{crate-name}}          Enable debug logging for specific crate

Available crates:
  {}

Environment Variable:
  HANAMI_DEBUG={{crate-name}}[,{{crate-name}}]  Enable debug for crates (comma-separated)
  HANAMI_DEBUG=all                               Enable debug for all crates
"#,
        KNOWN_CRATES.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_crate_flag() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-hanami-services".to_string()]);
        assert!(flags.is_enabled("hanami-services"));
        assert!(!flags.is_enabled("hanami-npu-engine"));
    }

    #[test]
    fn test_debug_all() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-all".to_string()]);
        for crate_name in KNOWN_CRATES {
            assert!(flags.is_enabled(crate_name), "{} should be enabled", crate_name);
        }
    }

    #[test]
    fn test_filter_string_is_sorted() {
        let flags = CrateDebugFlags::from_args(vec![
            "--debug-hanami-services".to_string(),
            "--debug-hanami-config".to_string(),
        ]);
        assert_eq!(
            flags.to_filter_string(),
            "hanami-config=debug,hanami-services=debug,info"
        );
        assert_eq!(CrateDebugFlags::default().to_filter_string_with_default("WARN"), "warn");
    }

    #[test]
    fn test_env_list() {
        let mut flags = CrateDebugFlags::default();
        merge_env_flags(&mut flags, " hanami-npu-engine , ,hanami-services");
        assert_eq!(flags.enabled_crates().len(), 2);
        assert_eq!(flags.log_level("hanami-npu-engine"), tracing::Level::DEBUG);
    }
}
