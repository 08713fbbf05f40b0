//! Private data directory staging
//!
//! ansible-runner reads its inputs from a directory laid out as:
//!
//! ```text
//! <base_dir>/inventory/hosts   localhost
//! <base_dir>/env/extravars     JSON extra vars
//! <base_dir>/env/cmdline       extra ansible-playbook flags (optional)
//! ```

use crate::request::RunOptions;
use crate::Result;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Extra var that pins every run to the local connection plugin
pub const CONNECTION_VAR: &str = "ansible_connection";

/// A staged ansible-runner private data directory.
///
/// Removed when dropped unless [`keep`](Self::keep) is called.
#[derive(Debug)]
pub struct StagedRun {
    dir: TempDir,
}

impl StagedRun {
    /// Create a fresh directory and write the inventory, extra vars and
    /// (when there is something to pass) the cmdline file.
    pub fn stage(extra_vars: &Map<String, Value>, options: &RunOptions) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("ansible-runner").tempdir()?;
        let staged = StagedRun { dir };

        staged.write_hosts()?;
        staged.write_extravars(extra_vars)?;
        staged.write_cmdline(&cmdline_tokens(options))?;

        debug!("Staged ansible-runner directory {:?}", staged.base_dir());
        Ok(staged)
    }

    pub fn base_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn hosts_path(&self) -> PathBuf {
        self.base_dir().join("inventory").join("hosts")
    }

    pub fn extravars_path(&self) -> PathBuf {
        self.base_dir().join("env").join("extravars")
    }

    pub fn cmdline_path(&self) -> PathBuf {
        self.base_dir().join("env").join("cmdline")
    }

    /// Detach the directory from this value so it outlives the run.
    pub fn keep(self) -> PathBuf {
        #[allow(deprecated)]
        self.dir.into_path()
    }

    /// Remove the directory, reporting failures instead of ignoring them.
    pub fn remove(self) -> Result<()> {
        self.dir.close()?;
        Ok(())
    }

    fn write_hosts(&self) -> Result<()> {
        let path = self.hosts_path();
        create_parent(&path)?;
        std::fs::write(path, "localhost")?;
        Ok(())
    }

    fn write_extravars(&self, extra_vars: &Map<String, Value>) -> Result<()> {
        let path = self.extravars_path();
        create_parent(&path)?;
        std::fs::write(path, serde_json::to_vec(&merged_extra_vars(extra_vars))?)?;
        Ok(())
    }

    fn write_cmdline(&self, tokens: &[String]) -> Result<()> {
        if tokens.is_empty() {
            return Ok(());
        }
        let path = self.cmdline_path();
        create_parent(&path)?;
        std::fs::write(path, tokens.join(" "))?;
        Ok(())
    }
}

/// Caller extra vars plus `ansible_connection: local`
pub fn merged_extra_vars(extra_vars: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = extra_vars.clone();
    merged.insert(CONNECTION_VAR.to_string(), Value::from("local"));
    merged
}

/// Tokens for `env/cmdline`; verbosity is passed on the command line instead.
pub fn cmdline_tokens(options: &RunOptions) -> Vec<String> {
    let mut tokens = Vec::new();
    if let Some(tags) = options.tags.as_deref().filter(|t| !t.is_empty()) {
        tokens.push(format!("--tags {}", tags));
    }
    if options.become_enabled {
        tokens.push("--become".to_string());
    }
    tokens
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_stage_writes_hosts_and_extravars() {
        let staged = StagedRun::stage(
            &vars(json!({"id": "201ac780"})),
            &RunOptions::default(),
        )
        .unwrap();

        let hosts = std::fs::read_to_string(staged.hosts_path()).unwrap();
        assert_eq!(hosts, "localhost");

        let extravars: Value =
            serde_json::from_slice(&std::fs::read(staged.extravars_path()).unwrap()).unwrap();
        assert_eq!(
            extravars,
            json!({"id": "201ac780", "ansible_connection": "local"})
        );

        assert!(!staged.cmdline_path().exists());
    }

    #[test]
    fn test_cmdline_tags_and_become() {
        let options = RunOptions {
            tags: Some("tag".to_string()),
            verbosity: 0,
            become_enabled: true,
        };
        let staged = StagedRun::stage(&Map::new(), &options).unwrap();

        let cmdline = std::fs::read_to_string(staged.cmdline_path()).unwrap();
        assert_eq!(cmdline, "--tags tag --become");
    }

    #[test]
    fn test_verbosity_alone_writes_no_cmdline() {
        let options = RunOptions {
            verbosity: 6,
            ..Default::default()
        };
        let staged = StagedRun::stage(&Map::new(), &options).unwrap();
        assert!(!staged.cmdline_path().exists());
    }

    #[test]
    fn test_connection_var_always_local() {
        let merged = merged_extra_vars(&vars(json!({"ansible_connection": "ssh", "a": 1})));
        assert_eq!(merged["ansible_connection"], json!("local"));
        assert_eq!(merged["a"], json!(1));
    }

    #[test]
    fn test_drop_removes_directory_unless_kept() {
        let staged = StagedRun::stage(&Map::new(), &RunOptions::default()).unwrap();
        let path = staged.base_dir().to_path_buf();
        drop(staged);
        assert!(!path.exists());

        let staged = StagedRun::stage(&Map::new(), &RunOptions::default()).unwrap();
        let kept = staged.keep();
        assert!(kept.join("inventory").join("hosts").exists());
        std::fs::remove_dir_all(kept).unwrap();
    }
}
