//! Run responses
//!
//! [`Response`] is a finished run. [`ResponseAsync`] is a handle on a run
//! started with `ansible-runner start`; it polls `is-alive` and reads the
//! artifacts ansible-runner leaves under `artifacts/<ident>/` once the run
//! is over.

use crate::error::RunnerError;
use crate::invocation::{CommandOutput, CommandRunner, Invocation, InvocationArgs};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Outcome of a finished ansible-runner run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub ident: String,
    /// Private data directory; removed after synchronous runs unless kept
    pub base_dir: PathBuf,
    /// `None` when the runner was killed before reporting a code
    pub return_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Verbosity was 5 or more
    pub debug: bool,
}

impl Response {
    pub fn from_output(
        ident: impl Into<String>,
        base_dir: impl Into<PathBuf>,
        output: CommandOutput,
        debug: bool,
    ) -> Self {
        Response {
            ident: ident.into(),
            base_dir: base_dir.into(),
            return_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            debug,
        }
    }

    /// Read `artifacts/<ident>/rc` and `artifacts/<ident>/stdout`.
    pub fn from_artifacts(base_dir: &Path, ident: &str, debug: bool) -> Result<Self> {
        let artifacts = base_dir.join("artifacts").join(ident);

        let rc_path = artifacts.join("rc");
        let return_code = match std::fs::read_to_string(&rc_path) {
            Ok(text) => Some(text.trim().parse::<i32>().map_err(|e| {
                RunnerError::InvalidArtifact {
                    path: rc_path.clone(),
                    details: e.to_string(),
                }
            })?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let stdout = match std::fs::read_to_string(artifacts.join("stdout")) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Response {
            ident: ident.to_string(),
            base_dir: base_dir.to_path_buf(),
            return_code,
            stdout,
            stderr: String::new(),
            debug,
        })
    }

    pub fn success(&self) -> bool {
        self.return_code == Some(0)
    }

    /// JSON job events from `--json` output; other lines are skipped.
    pub fn parsed_stdout(&self) -> Vec<Value> {
        self.stdout
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line.trim()).ok())
            .filter(Value::is_object)
            .collect()
    }
}

/// Serializable description of an async run, for handing it to whatever
/// polls for completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncRunRecord {
    pub ident: String,
    pub base_dir: PathBuf,
    pub command_line: String,
    pub debug: bool,
}

/// Handle on a run started with `ansible-runner start`
pub struct ResponseAsync {
    record: AsyncRunRecord,
    runner_bin: String,
    commands: Arc<dyn CommandRunner>,
    poll_interval: Duration,
}

impl ResponseAsync {
    pub fn new(
        record: AsyncRunRecord,
        runner_bin: impl Into<String>,
        commands: Arc<dyn CommandRunner>,
        poll_interval: Duration,
    ) -> Self {
        ResponseAsync {
            record,
            runner_bin: runner_bin.into(),
            commands,
            poll_interval,
        }
    }

    pub fn ident(&self) -> &str {
        &self.record.ident
    }

    pub fn base_dir(&self) -> &Path {
        &self.record.base_dir
    }

    /// The `ansible-runner start ...` line that launched the run
    pub fn command_line(&self) -> &str {
        &self.record.command_line
    }

    pub fn debug(&self) -> bool {
        self.record.debug
    }

    pub fn record(&self) -> &AsyncRunRecord {
        &self.record
    }

    /// `ansible-runner is-alive`; exit status 0 means still running.
    pub async fn running(&self) -> Result<bool> {
        let output = self.control("is-alive").await?;
        Ok(output.success())
    }

    /// `ansible-runner stop`; returns whether the runner accepted the request.
    pub async fn stop(&self) -> Result<bool> {
        info!("Stopping ansible-runner run {:?}", self.record.base_dir);
        let output = self.control("stop").await?;
        Ok(output.success())
    }

    /// Poll until the run finishes, then read its artifacts.
    pub async fn wait(&self, timeout: Duration) -> Result<Response> {
        let started = Instant::now();
        while self.running().await? {
            if started.elapsed() >= timeout {
                return Err(RunnerError::Timeout {
                    ident: self.record.ident.clone(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        debug!("ansible-runner run {:?} finished", self.record.base_dir);
        self.response()
    }

    /// Artifacts of the run; `return_code` is `None` while it is running.
    pub fn response(&self) -> Result<Response> {
        Response::from_artifacts(&self.record.base_dir, &self.record.ident, self.record.debug)
    }

    /// Remove the private data directory.
    pub fn cleanup(self) -> Result<()> {
        match std::fs::remove_dir_all(&self.record.base_dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn control(&self, method: &str) -> Result<CommandOutput> {
        let mut args = InvocationArgs::new();
        args.set("ident", self.record.ident.as_str());
        let invocation =
            Invocation::runner(&self.runner_bin, method, &self.record.base_dir).with_args(args);
        self.commands.run(&invocation).await
    }
}

impl std::fmt::Debug for ResponseAsync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseAsync")
            .field("record", &self.record)
            .field("runner_bin", &self.runner_bin)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}
