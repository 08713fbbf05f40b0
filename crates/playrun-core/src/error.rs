//! Error types for playrun-core

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while staging or invoking ansible-runner
#[derive(Error, Debug)]
pub enum RunnerError {
    /// Playbook path does not exist
    #[error("Playbook doesn't exist: {0}")]
    PlaybookNotFound(PathBuf),

    /// Roles path does not exist
    #[error("Roles path doesn't exist: {0}")]
    RolesPathNotFound(PathBuf),

    /// Executable could not be launched (not installed, not executable)
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// ansible-galaxy failed to install the project's role requirements
    #[error("ansible-galaxy install failed for {project_dir}: {details}")]
    GalaxyFetch { project_dir: PathBuf, details: String },

    /// An async run did not finish within the wait limit
    #[error("run {ident} still running after {elapsed_ms}ms")]
    Timeout { ident: String, elapsed_ms: u64 },

    /// Artifact written by ansible-runner could not be interpreted
    #[error("invalid artifact {path}: {details}")]
    InvalidArtifact { path: PathBuf, details: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why an `ansible --version` report could not be used.
///
/// Never escapes the module path resolver: every variant degrades to an
/// empty tool path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The probe produced no output (ansible missing, or it failed)
    #[error("version report is empty")]
    Empty,

    /// Output was present but its header line was not recognised
    #[error("unparsable version report: {0}")]
    Unparsable(String),

    /// Report parsed but carries no `ansible python module location` line
    #[error("version report has no python module location")]
    MissingModuleLocation,
}
