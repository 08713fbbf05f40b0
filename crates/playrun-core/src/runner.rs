//! The ansible-runner invocation builder.
//!
//! ```text
//! Created -> Staged -> Launched -> Completed | Failed   (run)
//! Created -> Staged -> Launched -> Started              (run_async)
//! ```
//!
//! A run is checked (target path exists), staged into a private data
//! directory, playbook projects get their galaxy roles fetched, and then
//! `ansible-runner run|start <base_dir> --json ...` is launched with the
//! caller's environment plus the resolved PYTHONPATH.

use crate::config::RunnerConfig;
use crate::content::{ContentFetcher, GalaxyContent};
use crate::error::RunnerError;
use crate::invocation::{
    CommandOutput, CommandRunner, Invocation, InvocationArgs, TokioCommandRunner,
};
use crate::python_path::{AnsibleVersionProbe, ModulePathResolver};
use crate::request::{RunRequest, Target};
use crate::response::{AsyncRunRecord, Response, ResponseAsync};
use crate::staging::StagedRun;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ident passed to ansible-runner; names `artifacts/<ident>/`
pub const DEFAULT_IDENT: &str = "result";

/// Environment variable carrying the resolved module path
pub const PYTHONPATH: &str = "PYTHONPATH";

/// Lifecycle of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Created,
    Staged,
    Launched,
    /// Synchronous run exited 0
    Completed,
    /// Synchronous run exited non-zero or was killed
    Failed,
    /// Asynchronous run handed off to the poller
    Started,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunPhase::Created => "created",
            RunPhase::Staged => "staged",
            RunPhase::Launched => "launched",
            RunPhase::Completed => "completed",
            RunPhase::Failed => "failed",
            RunPhase::Started => "started",
        };
        f.write_str(name)
    }
}

/// ansible-runner subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMethod {
    /// Block until the playbook finishes
    Run,
    /// Daemonize and return immediately
    Start,
}

impl RunMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMethod::Run => "run",
            RunMethod::Start => "start",
        }
    }
}

/// A launched invocation whose staged directory is still owned
struct Launched {
    staged: StagedRun,
    invocation: Invocation,
    output: CommandOutput,
    debug: bool,
}

/// Builds, stages and launches ansible-runner invocations
pub struct Runner {
    config: RunnerConfig,
    commands: Arc<dyn CommandRunner>,
    content: Arc<dyn ContentFetcher>,
    python_path: Arc<ModulePathResolver>,
}

impl Runner {
    /// Runner backed by real subprocesses
    pub fn new(config: RunnerConfig) -> Self {
        let commands: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner);
        let content = Arc::new(GalaxyContent::new(
            config.galaxy_bin.clone(),
            commands.clone(),
        ));
        let python_path = Arc::new(ModulePathResolver::new(
            Arc::new(AnsibleVersionProbe::new(config.ansible_bin.clone())),
            config.module_paths.clone(),
        ));
        Self::with_parts(config, commands, content, python_path)
    }

    /// Runner from explicit collaborators
    pub fn with_parts(
        config: RunnerConfig,
        commands: Arc<dyn CommandRunner>,
        content: Arc<dyn ContentFetcher>,
        python_path: Arc<ModulePathResolver>,
    ) -> Self {
        Runner {
            config,
            commands,
            content,
            python_path,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Shared PYTHONPATH resolver (reset / override hooks live there)
    pub fn python_path(&self) -> &ModulePathResolver {
        &self.python_path
    }

    /// Run a playbook or role to completion.
    ///
    /// A non-zero exit is reported through [`Response::return_code`].
    pub async fn run(&self, request: RunRequest) -> Result<Response> {
        let launched = self.launch(request, RunMethod::Run).await?;
        let Launched {
            staged,
            invocation,
            output,
            debug,
        } = launched;

        let response = Response::from_output(DEFAULT_IDENT, staged.base_dir(), output, debug);
        let phase = if response.success() {
            RunPhase::Completed
        } else {
            RunPhase::Failed
        };
        info!(
            phase = %phase,
            return_code = ?response.return_code,
            "{}",
            invocation.command_line()
        );

        if debug || self.config.keep_staging {
            let kept = staged.keep();
            info!("Keeping ansible-runner directory {:?}", kept);
        } else if let Err(e) = staged.remove() {
            warn!("Failed to remove {:?}: {}", response.base_dir, e);
        }

        Ok(response)
    }

    /// Start a playbook or role with `ansible-runner start` and return a
    /// handle without waiting for it to finish.
    pub async fn run_async(&self, request: RunRequest) -> Result<ResponseAsync> {
        let launched = self.launch(request, RunMethod::Start).await?;
        let Launched {
            staged,
            invocation,
            output,
            debug,
        } = launched;

        if !output.success() {
            warn!(
                return_code = ?output.exit_code,
                "ansible-runner start reported failure: {}",
                output.stderr.trim()
            );
        }

        let command_line = invocation.command_line();
        let base_dir = staged.keep();
        info!(phase = %RunPhase::Started, "{}", command_line);

        Ok(ResponseAsync::new(
            AsyncRunRecord {
                ident: DEFAULT_IDENT.to_string(),
                base_dir,
                command_line,
                debug,
            },
            self.config.runner_bin.clone(),
            self.commands.clone(),
            self.config.poll_interval,
        ))
    }

    async fn launch(&self, request: RunRequest, method: RunMethod) -> Result<Launched> {
        let RunRequest {
            environment,
            extra_vars,
            target,
            options,
        } = request;
        let debug = options.verbosity >= 5;

        check_target(&target)?;
        debug!(phase = %RunPhase::Created, method = method.as_str(), "{:?}", target);

        let staged = StagedRun::stage(&extra_vars, &options)?;
        debug!(phase = %RunPhase::Staged, "{:?}", staged.base_dir());

        let mut args = target_args(&target);
        if let Some(flag) = verbosity_flag(options.verbosity, self.config.max_verbosity) {
            args.flag(flag);
        }

        if let Target::Playbook(playbook) = &target {
            self.content
                .fetch_galaxy_roles(&project_dir(playbook))
                .await?;
        }

        let env = self.runner_env(environment).await;
        let invocation =
            Invocation::runner(&self.config.runner_bin, method.as_str(), staged.base_dir())
                .with_args(args)
                .with_env(env);

        debug!(phase = %RunPhase::Launched, "{}", invocation.command_line());
        let output = self.commands.run(&invocation).await?;

        Ok(Launched {
            staged,
            invocation,
            output,
            debug,
        })
    }

    /// Caller environment plus PYTHONPATH when one was resolved
    async fn runner_env(&self, environment: BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut env = environment;
        let python_path = self.python_path.resolve().await;
        if !python_path.is_empty() {
            env.insert(PYTHONPATH.to_string(), python_path);
        }
        env
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("config", &self.config)
            .field("python_path", &self.python_path)
            .finish()
    }
}

fn check_target(target: &Target) -> Result<()> {
    let path = target.required_path();
    if path.exists() {
        return Ok(());
    }
    Err(match target {
        Target::Playbook(_) => RunnerError::PlaybookNotFound(path.to_path_buf()),
        Target::Role { .. } => RunnerError::RolesPathNotFound(path.to_path_buf()),
    })
}

/// Directory holding the playbook; `.` for a bare file name
pub fn project_dir(playbook: &Path) -> PathBuf {
    match playbook.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// `ident` plus the playbook or role keyword arguments
pub fn target_args(target: &Target) -> InvocationArgs {
    let mut args = InvocationArgs::new();
    args.set("ident", DEFAULT_IDENT);

    match target {
        Target::Playbook(playbook) => {
            let name = playbook
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            args.set("playbook", name)
                .set("project_dir", project_dir(playbook).to_string_lossy());
        }
        Target::Role {
            name,
            roles_path,
            skip_facts,
        } => {
            args.set("role", name.as_str())
                .set("roles_path", roles_path.to_string_lossy());
            if *skip_facts {
                args.flag("role_skip_facts");
            }
        }
    }

    args
}

/// `-v` repeated `verbosity` times, capped at `max`; `None` when quiet
pub fn verbosity_flag(verbosity: u8, max: u8) -> Option<String> {
    let count = verbosity.min(max) as usize;
    (count > 0).then(|| format!("-{}", "v".repeat(count)))
}
