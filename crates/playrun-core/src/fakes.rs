//! In-memory fakes for the subprocess seams (testing only)
//!
//! `RecordingCommandRunner` stands in for ansible-runner / ansible-galaxy and
//! snapshots the staged directory at call time, because synchronous runs
//! remove it afterwards. `StaticVersionProbe` replays a fixed
//! `ansible --version` report. `RecordingContentFetcher` remembers which
//! project directories were asked to fetch galaxy roles.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::content::ContentFetcher;
use crate::error::RunnerError;
use crate::invocation::{CommandOutput, CommandRunner, Invocation};
use crate::python_path::VersionProbe;
use crate::Result;

// ---------------------------------------------------------------------------
// RecordingCommandRunner
// ---------------------------------------------------------------------------

/// Staged files as they were when the command was invoked
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagedSnapshot {
    pub hosts: Option<String>,
    pub extravars: Option<Value>,
    pub cmdline: Option<String>,
}

impl StagedSnapshot {
    fn capture(base_dir: &Path) -> Self {
        let read = |path: PathBuf| std::fs::read_to_string(path).ok();
        StagedSnapshot {
            hosts: read(base_dir.join("inventory").join("hosts")),
            extravars: read(base_dir.join("env").join("extravars"))
                .and_then(|text| serde_json::from_str(&text).ok()),
            cmdline: read(base_dir.join("env").join("cmdline")),
        }
    }
}

/// One recorded invocation
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub invocation: Invocation,
    /// Present when the invocation carried a private data directory
    pub staged: Option<StagedSnapshot>,
}

#[derive(Debug)]
enum Reply {
    Output(CommandOutput),
    LaunchFailure,
}

/// Records every invocation and replies from a script.
///
/// Replies are consumed in order; the last one repeats forever.
#[derive(Debug)]
pub struct RecordingCommandRunner {
    calls: Mutex<Vec<RecordedCall>>,
    replies: Mutex<VecDeque<Reply>>,
}

impl Default for RecordingCommandRunner {
    fn default() -> Self {
        Self::with_output(CommandOutput {
            exit_code: Some(0),
            stdout: "output".to_string(),
            stderr: String::new(),
        })
    }
}

impl RecordingCommandRunner {
    /// Every call exits 0 with stdout `output`
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(output: CommandOutput) -> Self {
        Self::from_replies([Reply::Output(output)])
    }

    /// Successive calls exit with these codes
    pub fn with_exit_codes<I: IntoIterator<Item = i32>>(codes: I) -> Self {
        Self::from_replies(codes.into_iter().map(|code| {
            Reply::Output(CommandOutput {
                exit_code: Some(code),
                ..Default::default()
            })
        }))
    }

    /// Every call fails as if the executable were missing
    pub fn failing_launch() -> Self {
        Self::from_replies([Reply::LaunchFailure])
    }

    fn from_replies<I: IntoIterator<Item = Reply>>(replies: I) -> Self {
        RecordingCommandRunner {
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(replies.into_iter().collect()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn next_reply(&self, program: &str) -> Result<CommandOutput> {
        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            None
        };
        let reply = reply.as_ref().or_else(|| replies.front());

        match reply {
            Some(Reply::Output(output)) => Ok(output.clone()),
            Some(Reply::LaunchFailure) => Err(RunnerError::Launch {
                program: program.to_string(),
                source: std::io::Error::new(ErrorKind::NotFound, "No such file or directory"),
            }),
            None => Ok(CommandOutput::default()),
        }
    }
}

#[async_trait]
impl CommandRunner for RecordingCommandRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let staged = invocation.base_dir.as_deref().map(StagedSnapshot::capture);
        self.calls.lock().unwrap().push(RecordedCall {
            invocation: invocation.clone(),
            staged,
        });
        self.next_reply(&invocation.program)
    }
}

// ---------------------------------------------------------------------------
// StaticVersionProbe
// ---------------------------------------------------------------------------

/// Replays a fixed `ansible --version` report and counts probes
#[derive(Debug, Default)]
pub struct StaticVersionProbe {
    report: String,
    probes: Mutex<usize>,
}

impl StaticVersionProbe {
    pub fn new(report: impl Into<String>) -> Self {
        StaticVersionProbe {
            report: report.into(),
            probes: Mutex::new(0),
        }
    }

    /// Probe that behaves as if ansible were not installed
    pub fn not_installed() -> Self {
        Self::new("")
    }

    pub fn probe_count(&self) -> usize {
        *self.probes.lock().unwrap()
    }
}

#[async_trait]
impl VersionProbe for StaticVersionProbe {
    async fn version_report(&self) -> String {
        *self.probes.lock().unwrap() += 1;
        self.report.clone()
    }
}

// ---------------------------------------------------------------------------
// RecordingContentFetcher
// ---------------------------------------------------------------------------

/// Remembers each project directory asked to fetch galaxy roles
#[derive(Debug, Default)]
pub struct RecordingContentFetcher {
    fetched: Mutex<Vec<PathBuf>>,
    fail: bool,
}

impl RecordingContentFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch fails with `GalaxyFetch`
    pub fn failing() -> Self {
        RecordingContentFetcher {
            fetched: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn fetched(&self) -> Vec<PathBuf> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentFetcher for RecordingContentFetcher {
    async fn fetch_galaxy_roles(&self, project_dir: &Path) -> Result<()> {
        self.fetched.lock().unwrap().push(project_dir.to_path_buf());
        if self.fail {
            return Err(RunnerError::GalaxyFetch {
                project_dir: project_dir.to_path_buf(),
                details: "requirements could not be installed".to_string(),
            });
        }
        Ok(())
    }
}
