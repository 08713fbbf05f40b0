//! Runner configuration
//!
//! Defaults come from `PLAYRUN_*` environment variables so that the CLI and
//! embedding services share one source of truth.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default automation-platform bundled site-packages
pub const DEFAULT_AWX_MODULES_PATH: &str = "/var/lib/awx/venv/ansible/lib/python3.6/site-packages";
/// Default platform-bundled python3 site-packages
pub const DEFAULT_PYTHON3_MODULES_PATH: &str = "/usr/lib64/python3.6/site-packages";
/// Default platform-bundled python2 site-packages
pub const DEFAULT_PYTHON2_MODULES_PATH: &str = "/var/lib/manageiq/venv/lib/python2.7/site-packages";

/// Highest `-v` count ansible-runner accepts
pub const DEFAULT_MAX_VERBOSITY: u8 = 5;

/// Well-known site-packages directories probed in addition to the one
/// `ansible --version` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulePathCandidates {
    /// Automation-platform (AWX) bundled site-packages
    pub awx: PathBuf,
    /// Platform-bundled python3 site-packages
    pub python3: PathBuf,
    /// Platform-bundled python2 site-packages
    pub python2: PathBuf,
}

impl Default for ModulePathCandidates {
    fn default() -> Self {
        ModulePathCandidates {
            awx: env_path("PLAYRUN_AWX_MODULES_PATH", DEFAULT_AWX_MODULES_PATH),
            python3: env_path("PLAYRUN_PYTHON3_MODULES_PATH", DEFAULT_PYTHON3_MODULES_PATH),
            python2: env_path("PLAYRUN_PYTHON2_MODULES_PATH", DEFAULT_PYTHON2_MODULES_PATH),
        }
    }
}

/// Runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// ansible-runner executable
    pub runner_bin: String,
    /// ansible executable, used for the version probe
    pub ansible_bin: String,
    /// ansible-galaxy executable, used to fetch role requirements
    pub galaxy_bin: String,
    /// Keep staged directories of synchronous runs after they finish
    pub keep_staging: bool,
    /// Interval between `is-alive` polls while waiting on an async run
    pub poll_interval: Duration,
    /// Upper bound on the number of `v` characters in the verbosity flag
    pub max_verbosity: u8,
    /// Candidate site-packages directories
    pub module_paths: ModulePathCandidates,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            runner_bin: std::env::var("PLAYRUN_RUNNER_BIN")
                .unwrap_or_else(|_| "ansible-runner".to_string()),
            ansible_bin: std::env::var("PLAYRUN_ANSIBLE_BIN")
                .unwrap_or_else(|_| "ansible".to_string()),
            galaxy_bin: std::env::var("PLAYRUN_GALAXY_BIN")
                .unwrap_or_else(|_| "ansible-galaxy".to_string()),
            keep_staging: std::env::var("PLAYRUN_KEEP_STAGING")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
            poll_interval: Duration::from_millis(
                std::env::var("PLAYRUN_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1000),
            ),
            max_verbosity: std::env::var("PLAYRUN_MAX_VERBOSITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_VERBOSITY),
            module_paths: ModulePathCandidates::default(),
        }
    }
}

impl RunnerConfig {
    /// Create a config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Use a different ansible-runner executable
    pub fn with_runner_bin(mut self, bin: &str) -> Self {
        self.runner_bin = bin.to_string();
        self
    }

    /// Keep (or remove) staged directories of synchronous runs
    pub fn with_keep_staging(mut self, keep: bool) -> Self {
        self.keep_staging = keep;
        self
    }

    /// Set the async poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Replace the candidate site-packages directories
    pub fn with_module_paths(mut self, candidates: ModulePathCandidates) -> Self {
        self.module_paths = candidates;
        self
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var_os(key)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" YES "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("nope"));
    }

    #[test]
    fn test_builder_overrides() {
        let config = RunnerConfig::default()
            .with_runner_bin("/opt/bin/ansible-runner")
            .with_keep_staging(true)
            .with_poll_interval(Duration::from_millis(5));

        assert_eq!(config.runner_bin, "/opt/bin/ansible-runner");
        assert!(config.keep_staging);
        assert_eq!(config.poll_interval, Duration::from_millis(5));
    }
}
