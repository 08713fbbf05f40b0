//! Command invocation descriptors and the subprocess seam.
//!
//! An [`Invocation`] is plain data: program, subcommand, optional private
//! data directory and keyword arguments. [`CommandRunner`] turns it into a
//! process; [`TokioCommandRunner`] is the real one, tests use the recording
//! fake in [`crate::fakes`].

use crate::error::RunnerError;
use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Ordered keyword arguments. A `None` value renders as a bare flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationArgs(Vec<(String, Option<String>)>);

impl InvocationArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) `key value`
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.insert(key.into(), Some(value.into()))
    }

    /// Add (or replace) a flag without a value
    pub fn flag(&mut self, key: impl Into<String>) -> &mut Self {
        self.insert(key.into(), None)
    }

    /// `Some(None)` for a flag, `Some(Some(v))` for a valued key
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `snake_case` keys become `--kebab-case`; keys that already start
    /// with `-` (e.g. `-vvvvv`) are passed through unchanged.
    pub fn to_argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.0.len() * 2);
        for (key, value) in &self.0 {
            if key.starts_with('-') {
                argv.push(key.clone());
            } else {
                argv.push(format!("--{}", key.replace('_', "-")));
            }
            if let Some(value) = value {
                argv.push(value.clone());
            }
        }
        argv
    }

    fn insert(&mut self, key: String, value: Option<String>) -> &mut Self {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, Option<V>)> for InvocationArgs {
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        let mut args = InvocationArgs::new();
        for (key, value) in iter {
            args.insert(key.into(), value.map(Into::into));
        }
        args
    }
}

/// One external command: `program subcommand [base_dir] [--json] args...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub subcommand: String,
    /// ansible-runner private data directory
    pub base_dir: Option<PathBuf>,
    /// Ask ansible-runner for JSON job events on stdout
    pub json: bool,
    pub args: InvocationArgs,
    /// Added on top of the inherited process environment
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, subcommand: impl Into<String>) -> Self {
        Invocation {
            program: program.into(),
            subcommand: subcommand.into(),
            base_dir: None,
            json: false,
            args: InvocationArgs::new(),
            env: BTreeMap::new(),
        }
    }

    /// An ansible-runner call against a private data directory
    pub fn runner(program: &str, method: &str, base_dir: impl Into<PathBuf>) -> Self {
        let mut invocation = Self::new(program, method);
        invocation.base_dir = Some(base_dir.into());
        invocation.json = true;
        invocation
    }

    pub fn with_args(mut self, args: InvocationArgs) -> Self {
        self.args = args;
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Arguments after the program name
    pub fn params(&self) -> Vec<String> {
        let mut params = vec![self.subcommand.clone()];
        if let Some(base_dir) = &self.base_dir {
            params.push(base_dir.to_string_lossy().into_owned());
        }
        if self.json {
            params.push("--json".to_string());
        }
        params.extend(self.args.to_argv());
        params
    }

    /// Shell-like rendering for logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.params())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs an [`Invocation`] to completion.
///
/// A non-zero exit is returned as data; only a failure to start the
/// process is an error.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;
}

/// [`CommandRunner`] backed by `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        debug!("Running {}", invocation.command_line());

        let output = Command::new(&invocation.program)
            .args(invocation.params())
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| RunnerError::Launch {
                program: invocation.program.clone(),
                source,
            })?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_render_kebab_case_and_bare_flags() {
        let mut args = InvocationArgs::new();
        args.set("ident", "result")
            .set("project_dir", "/path/to/my")
            .flag("-vvvvv");

        assert_eq!(
            args.to_argv(),
            vec!["--ident", "result", "--project-dir", "/path/to/my", "-vvvvv"]
        );
        assert_eq!(args.get("-vvvvv"), Some(None));
        assert_eq!(args.get("ident"), Some(Some("result")));
        assert_eq!(args.get("playbook"), None);
    }

    #[test]
    fn test_set_replaces_existing_key_in_place() {
        let mut args: InvocationArgs =
            [("ident", Some("a")), ("role", Some("r"))].into_iter().collect();
        args.set("ident", "b");
        assert_eq!(args.keys().collect::<Vec<_>>(), vec!["ident", "role"]);
        assert_eq!(args.get("ident"), Some(Some("b")));
    }

    #[test]
    fn test_runner_params() {
        let mut args = InvocationArgs::new();
        args.set("ident", "result");
        let invocation = Invocation::runner("ansible-runner", "run", "/tmp/x").with_args(args);

        assert_eq!(
            invocation.params(),
            vec!["run", "/tmp/x", "--json", "--ident", "result"]
        );
        assert_eq!(
            invocation.command_line(),
            "ansible-runner run /tmp/x --json --ident result"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_captures_output_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-runner.sh");
        std::fs::write(&script, "echo \"$PLAYRUN_TEST $1\"\nexit 3\n").unwrap();

        let mut invocation = Invocation::new("sh", script.to_string_lossy()).with_env(
            [("PLAYRUN_TEST".to_string(), "hello".to_string())]
                .into_iter()
                .collect(),
        );
        invocation.args.flag("--json");

        let output = TokioCommandRunner.run(&invocation).await.unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "hello --json");
    }

    #[tokio::test]
    async fn test_tokio_runner_missing_program_is_launch_error() {
        let invocation = Invocation::new("playrun-definitely-not-installed", "run");
        let err = TokioCommandRunner.run(&invocation).await.unwrap_err();
        assert!(matches!(err, RunnerError::Launch { .. }));
    }
}
