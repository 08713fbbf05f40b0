//! Galaxy role requirements
//!
//! A playbook project may declare external roles in
//! `roles/requirements.yml`. They are installed next to the playbook before
//! ansible-runner starts.

use crate::error::RunnerError;
use crate::invocation::{CommandRunner, Invocation, InvocationArgs};
use crate::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Fetches a project's declared role dependencies
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_galaxy_roles(&self, project_dir: &Path) -> Result<()>;
}

/// [`ContentFetcher`] that shells out to `ansible-galaxy install`
pub struct GalaxyContent {
    galaxy_bin: String,
    commands: Arc<dyn CommandRunner>,
}

impl GalaxyContent {
    pub fn new(galaxy_bin: impl Into<String>, commands: Arc<dyn CommandRunner>) -> Self {
        GalaxyContent {
            galaxy_bin: galaxy_bin.into(),
            commands,
        }
    }

    pub fn roles_dir(project_dir: &Path) -> PathBuf {
        project_dir.join("roles")
    }

    pub fn requirements_file(project_dir: &Path) -> PathBuf {
        Self::roles_dir(project_dir).join("requirements.yml")
    }
}

#[async_trait]
impl ContentFetcher for GalaxyContent {
    async fn fetch_galaxy_roles(&self, project_dir: &Path) -> Result<()> {
        let requirements = Self::requirements_file(project_dir);
        if !requirements.exists() {
            debug!("No role requirements in {:?}", project_dir);
            return Ok(());
        }

        info!("Installing galaxy roles from {:?}", requirements);

        let mut args = InvocationArgs::new();
        args.set("roles_path", Self::roles_dir(project_dir).to_string_lossy())
            .set("role_file", requirements.to_string_lossy());
        let invocation = Invocation::new(&self.galaxy_bin, "install").with_args(args);

        let output = self.commands.run(&invocation).await?;
        if !output.success() {
            return Err(RunnerError::GalaxyFetch {
                project_dir: project_dir.to_path_buf(),
                details: output.stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}

impl std::fmt::Debug for GalaxyContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GalaxyContent")
            .field("galaxy_bin", &self.galaxy_bin)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::RecordingCommandRunner;
    use crate::invocation::CommandOutput;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_no_requirements_is_noop() {
        let project = tempdir().unwrap();
        let commands = Arc::new(RecordingCommandRunner::new());
        let content = GalaxyContent::new("ansible-galaxy", commands.clone());

        content.fetch_galaxy_roles(project.path()).await.unwrap();
        assert!(commands.calls().is_empty());
    }

    #[tokio::test]
    async fn test_installs_requirements_into_roles_dir() {
        let project = tempdir().unwrap();
        let roles = project.path().join("roles");
        std::fs::create_dir_all(&roles).unwrap();
        std::fs::write(roles.join("requirements.yml"), "- src: geerlingguy.nginx\n").unwrap();

        let commands = Arc::new(RecordingCommandRunner::new());
        let content = GalaxyContent::new("ansible-galaxy", commands.clone());
        content.fetch_galaxy_roles(project.path()).await.unwrap();

        let calls = commands.calls();
        assert_eq!(calls.len(), 1);
        let invocation = &calls[0].invocation;
        assert_eq!(invocation.program, "ansible-galaxy");
        assert_eq!(invocation.subcommand, "install");
        assert_eq!(
            invocation.args.get("roles_path"),
            Some(Some(roles.to_string_lossy().as_ref()))
        );
        assert_eq!(
            invocation.args.get("role_file"),
            Some(Some(roles.join("requirements.yml").to_string_lossy().as_ref()))
        );
    }

    #[tokio::test]
    async fn test_failed_install_is_reported() {
        let project = tempdir().unwrap();
        let roles = project.path().join("roles");
        std::fs::create_dir_all(&roles).unwrap();
        std::fs::write(roles.join("requirements.yml"), "- src: missing.role\n").unwrap();

        let commands = Arc::new(RecordingCommandRunner::with_output(CommandOutput {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "role not found\n".to_string(),
        }));
        let content = GalaxyContent::new("ansible-galaxy", commands);

        let err = content.fetch_galaxy_roles(project.path()).await.unwrap_err();
        match err {
            RunnerError::GalaxyFetch { details, .. } => assert_eq!(details, "role not found"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
