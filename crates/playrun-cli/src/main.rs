//! playrun - ansible-runner front-end
//!
//! ## Commands
//!
//! - `run`: run a playbook through ansible-runner
//! - `role`: run a single role
//! - `python-path`: print the PYTHONPATH handed to ansible-runner
//! - `version`: print the parsed `ansible --version` report

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use playrun_core::{
    AnsibleVersionProbe, Response, RunRequest, Runner, RunnerConfig, VersionProbe, VersionReport,
};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "playrun")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run ansible playbooks and roles through ansible-runner", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// ansible-runner executable
    #[arg(long, global = true, env = "PLAYRUN_RUNNER_BIN")]
    runner_bin: Option<String>,

    /// ansible executable used for the version probe
    #[arg(long, global = true, env = "PLAYRUN_ANSIBLE_BIN")]
    ansible_bin: Option<String>,

    /// ansible-galaxy executable used for role requirements
    #[arg(long, global = true, env = "PLAYRUN_GALAXY_BIN")]
    galaxy_bin: Option<String>,

    /// Keep the staged ansible-runner directory after the run
    #[arg(
        long,
        global = true,
        env = "PLAYRUN_KEEP_STAGING",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    keep_staging: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a playbook
    Run {
        /// Path to the playbook; its directory becomes the project dir
        playbook: PathBuf,

        #[command(flatten)]
        opts: RunArgs,
    },

    /// Run a single role
    Role {
        /// Role name
        name: String,

        /// Directory containing the role
        #[arg(long)]
        roles_path: PathBuf,

        /// Gather facts before running the role
        #[arg(long)]
        gather_facts: bool,

        #[command(flatten)]
        opts: RunArgs,
    },

    /// Print the PYTHONPATH ansible-runner would be launched with
    PythonPath,

    /// Print the parsed `ansible --version` report as JSON
    Version,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Environment variable for the run (KEY=VALUE, repeatable)
    #[arg(short = 'e', long = "env", value_parser = parse_key_val)]
    env: Vec<(String, String)>,

    /// Extra variables as a JSON object, or @path to a JSON file
    #[arg(long)]
    extra_vars: Option<String>,

    /// Only run plays and tasks tagged with these values
    #[arg(long)]
    tags: Option<String>,

    /// Verbosity 0-6; 5 and above keeps the staged directory
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=6))]
    verbosity: u8,

    /// Run operations with become
    #[arg(long = "become")]
    become_enabled: bool,

    /// Start the run in the background and print its handle
    #[arg(long = "async")]
    start: bool,

    /// With --async, wait up to this many seconds for the run to finish
    #[arg(long, requires = "start")]
    wait: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    playrun_core::telemetry::init_tracing(cli.json, level);

    let config = runner_config(&cli);
    let runner = Runner::new(config.clone());

    let code = match cli.command {
        Commands::Run { playbook, opts } => {
            ensure_runner(&config).await?;
            let request = build_request(RunRequest::playbook(playbook), &opts)?;
            cmd_run(&runner, request, &opts).await?
        }
        Commands::Role {
            name,
            roles_path,
            gather_facts,
            opts,
        } => {
            ensure_runner(&config).await?;
            let request = build_request(
                RunRequest::role(name, roles_path).with_role_skip_facts(!gather_facts),
                &opts,
            )?;
            cmd_run(&runner, request, &opts).await?
        }
        Commands::PythonPath => {
            cmd_python_path(&runner).await;
            0
        }
        Commands::Version => {
            cmd_version(&AnsibleVersionProbe::new(config.ansible_bin.clone())).await?;
            0
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Environment defaults with command-line overrides on top
fn runner_config(cli: &Cli) -> RunnerConfig {
    let mut config = RunnerConfig::from_env();
    if let Some(bin) = &cli.runner_bin {
        config.runner_bin = bin.clone();
    }
    if let Some(bin) = &cli.ansible_bin {
        config.ansible_bin = bin.clone();
    }
    if let Some(bin) = &cli.galaxy_bin {
        config.galaxy_bin = bin.clone();
    }
    if cli.keep_staging {
        config.keep_staging = true;
    }
    config
}

/// Fail before staging anything when ansible-runner cannot be launched
async fn ensure_runner(config: &RunnerConfig) -> Result<()> {
    if playrun_core::is_runner_available(&config.runner_bin).await {
        return Ok(());
    }
    bail!(
        "{} is not installed or not on PATH (set --runner-bin or PLAYRUN_RUNNER_BIN)",
        config.runner_bin
    )
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{}`", s))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in `{}`", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Parse `--extra-vars`; `@path` reads the JSON from a file.
fn parse_extra_vars(raw: Option<&str>) -> Result<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };

    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .context(format!("Failed to read extra vars file: {}", path))?,
        None => raw.to_string(),
    };

    match serde_json::from_str(&text).context("Failed to parse extra vars as JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!("extra vars must be a JSON object, got: {}", other),
    }
}

fn build_request(request: RunRequest, opts: &RunArgs) -> Result<RunRequest> {
    let extra_vars = parse_extra_vars(opts.extra_vars.as_deref())?;

    let mut request = request
        .with_env(opts.env.iter().cloned())
        .with_extra_vars(extra_vars)
        .with_verbosity(opts.verbosity)
        .with_become(opts.become_enabled);
    if let Some(tags) = &opts.tags {
        request = request.with_tags(tags.clone());
    }
    Ok(request)
}

/// Run (or start) a request; returns the process exit code to report.
async fn cmd_run(runner: &Runner, request: RunRequest, opts: &RunArgs) -> Result<i32> {
    if !opts.start {
        let response = runner
            .run(request)
            .await
            .context("ansible-runner run failed")?;
        return Ok(report(&response));
    }

    let handle = runner
        .run_async(request)
        .await
        .context("Failed to start ansible-runner")?;
    println!("{}", serde_json::to_string_pretty(handle.record())?);

    let Some(secs) = opts.wait else {
        return Ok(0);
    };

    let response = handle
        .wait(Duration::from_secs(secs))
        .await
        .context(format!("Waiting for run in {:?}", handle.base_dir()))?;
    Ok(report(&response))
}

fn report(response: &Response) -> i32 {
    print!("{}", response.stdout);
    match response.return_code {
        Some(0) => {
            info!("Run {} succeeded", response.ident);
            0
        }
        Some(code) => {
            eprintln!("ansible-runner exited with {}", code);
            if !response.stderr.trim().is_empty() {
                eprintln!("{}", response.stderr.trim());
            }
            code
        }
        None => {
            eprintln!("ansible-runner did not report a return code");
            1
        }
    }
}

async fn cmd_python_path(runner: &Runner) {
    let resolved = runner.python_path().resolve().await;
    if resolved.is_empty() {
        info!("No ansible module paths found");
    }
    println!("{}", resolved);
}

async fn cmd_version(probe: &dyn VersionProbe) -> Result<()> {
    let text = probe.version_report().await;
    let report = VersionReport::parse(&text).context("Failed to parse `ansible --version`")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use playrun_core::fakes::{RecordingCommandRunner, RecordingContentFetcher, StaticVersionProbe};
    use playrun_core::{ModulePathCandidates, ModulePathResolver};
    use std::sync::Arc;

    fn fake_runner(root: &std::path::Path, commands: Arc<RecordingCommandRunner>) -> Runner {
        let candidates = ModulePathCandidates {
            awx: root.join("awx"),
            python3: root.join("py3"),
            python2: root.join("py2"),
        };
        let config = RunnerConfig::default()
            .with_keep_staging(false)
            .with_module_paths(candidates.clone());
        Runner::with_parts(
            config,
            commands,
            Arc::new(RecordingContentFetcher::new()),
            Arc::new(ModulePathResolver::new(
                Arc::new(StaticVersionProbe::not_installed()),
                candidates,
            )),
        )
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_arguments() {
        let cli = Cli::try_parse_from([
            "playrun",
            "run",
            "site.yml",
            "-e",
            "HOME=/root",
            "--tags",
            "setup",
            "--verbosity",
            "3",
            "--become",
        ])
        .unwrap();

        match cli.command {
            Commands::Run { playbook, opts } => {
                assert_eq!(playbook, PathBuf::from("site.yml"));
                assert_eq!(opts.env, vec![("HOME".to_string(), "/root".to_string())]);
                assert_eq!(opts.tags.as_deref(), Some("setup"));
                assert_eq!(opts.verbosity, 3);
                assert!(opts.become_enabled);
                assert!(!opts.start);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_verbosity_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["playrun", "run", "site.yml", "--verbosity", "7"]).is_err());
    }

    #[test]
    fn test_wait_requires_async() {
        assert!(Cli::try_parse_from(["playrun", "run", "site.yml", "--wait", "10"]).is_err());
    }

    #[test]
    fn test_keep_staging_reads_environment() {
        let cmd = Cli::command();
        let arg = cmd
            .get_arguments()
            .find(|a| a.get_id() == "keep_staging")
            .unwrap();
        assert_eq!(arg.get_env(), Some(std::ffi::OsStr::new("PLAYRUN_KEEP_STAGING")));
    }

    #[tokio::test]
    async fn test_ensure_runner_rejects_missing_binary() {
        let config = RunnerConfig::default().with_runner_bin("playrun-no-such-runner");
        let err = ensure_runner(&config).await.unwrap_err();
        assert!(err.to_string().contains("playrun-no-such-runner"));
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("A=b=c").unwrap(),
            ("A".to_string(), "b=c".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_parse_extra_vars() {
        assert!(parse_extra_vars(None).unwrap().is_empty());

        let vars = parse_extra_vars(Some(r#"{"a": 1}"#)).unwrap();
        assert_eq!(vars["a"], Value::from(1));

        assert!(parse_extra_vars(Some("[1, 2]")).is_err());
        assert!(parse_extra_vars(Some("not json")).is_err());
    }

    #[test]
    fn test_parse_extra_vars_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vars.json");
        std::fs::write(&path, r#"{"region": "us-east-1"}"#).unwrap();

        let vars = parse_extra_vars(Some(&format!("@{}", path.display()))).unwrap();
        assert_eq!(vars["region"], Value::from("us-east-1"));
    }

    #[test]
    fn test_build_role_request() {
        let opts = RunArgs {
            tags: Some("web".to_string()),
            ..Default::default()
        };
        let request = build_request(
            RunRequest::role("nginx", "/etc/roles").with_role_skip_facts(false),
            &opts,
        )
        .unwrap();

        assert_eq!(request.options.tags.as_deref(), Some("web"));
        match request.target {
            playrun_core::Target::Role { skip_facts, .. } => assert!(!skip_facts),
            _ => panic!("expected role target"),
        }
    }

    #[tokio::test]
    async fn test_cmd_run_reports_exit_code() {
        let root = tempfile::tempdir().unwrap();
        let playbook = root.path().join("site.yml");
        std::fs::write(&playbook, "- hosts: all\n").unwrap();

        let commands = Arc::new(RecordingCommandRunner::with_exit_codes([2]));
        let runner = fake_runner(root.path(), commands.clone());

        let opts = RunArgs::default();
        let request = build_request(RunRequest::playbook(&playbook), &opts).unwrap();
        let code = cmd_run(&runner, request, &opts).await.unwrap();

        assert_eq!(code, 2);
        assert_eq!(commands.calls()[0].invocation.subcommand, "run");
    }

    #[tokio::test]
    async fn test_cmd_run_async_starts_without_waiting() {
        let root = tempfile::tempdir().unwrap();
        let playbook = root.path().join("site.yml");
        std::fs::write(&playbook, "- hosts: all\n").unwrap();

        let commands = Arc::new(RecordingCommandRunner::new());
        let runner = fake_runner(root.path(), commands.clone());

        let opts = RunArgs {
            start: true,
            ..Default::default()
        };
        let request = build_request(RunRequest::playbook(&playbook), &opts).unwrap();
        let code = cmd_run(&runner, request, &opts).await.unwrap();

        let calls = commands.calls();
        assert_eq!(code, 0);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].invocation.subcommand, "start");

        if let Some(base_dir) = &calls[0].invocation.base_dir {
            std::fs::remove_dir_all(base_dir).unwrap();
        }
    }

    #[tokio::test]
    async fn test_cmd_version_rejects_missing_ansible() {
        let result = cmd_version(&StaticVersionProbe::not_installed()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cmd_version_prints_report() {
        let probe = StaticVersionProbe::new(
            "ansible 2.9.23\n  python version = 3.8.10\n  ansible python module location = /usr/lib/python3.8/site-packages/ansible\n",
        );
        cmd_version(&probe).await.unwrap();
    }
}
