//! playrun-core: ansible-runner invocation builder
//!
//! Turns a [`RunRequest`] (environment, extra vars, playbook or role,
//! options) into a staged ansible-runner private data directory and a
//! subprocess invocation, and reports the outcome as a [`Response`] or a
//! pollable [`ResponseAsync`].
//!
//! ## Pieces
//!
//! - [`python_path`]: PYTHONPATH resolution from `ansible --version` and
//!   bundled virtualenvs
//! - [`staging`]: `inventory/hosts`, `env/extravars`, `env/cmdline`
//! - [`invocation`]: argument rendering and the [`CommandRunner`] seam
//! - [`content`]: galaxy role requirements
//! - [`runner`]: [`Runner::run`] / [`Runner::run_async`]

pub mod config;
pub mod content;
pub mod error;
pub mod fakes;
pub mod invocation;
pub mod python_path;
pub mod request;
pub mod response;
pub mod runner;
pub mod staging;
pub mod telemetry;
pub mod version;

// Re-export main types
pub use config::{ModulePathCandidates, RunnerConfig};
pub use content::{ContentFetcher, GalaxyContent};
pub use error::{ProbeError, RunnerError};
pub use invocation::{
    CommandOutput, CommandRunner, Invocation, InvocationArgs, TokioCommandRunner,
};
pub use python_path::{AnsibleVersionProbe, ModulePath, ModulePathResolver, VersionProbe};
pub use request::{RunOptions, RunRequest, Target};
pub use response::{AsyncRunRecord, Response, ResponseAsync};
pub use runner::{RunMethod, RunPhase, Runner, DEFAULT_IDENT, PYTHONPATH};
pub use staging::StagedRun;
pub use version::VersionReport;

/// Result type for playrun operations
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Check if ansible-runner is available
pub async fn is_runner_available(runner_bin: &str) -> bool {
    tokio::process::Command::new(runner_bin)
        .arg("--version")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_runner_is_unavailable() {
        assert!(!is_runner_available("playrun-definitely-not-installed").await);
    }
}
