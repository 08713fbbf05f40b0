//! Run requests
//!
//! A [`RunRequest`] carries everything one ansible-runner invocation needs:
//! the subprocess environment, the extra vars, the target and the options.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// What ansible-runner should execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// A playbook file; its parent directory is the project directory
    Playbook(PathBuf),
    /// A role looked up under `roles_path`
    Role {
        name: String,
        roles_path: PathBuf,
        /// Skip fact gathering for the generated play
        skip_facts: bool,
    },
}

impl Target {
    /// Playbook target
    pub fn playbook(path: impl Into<PathBuf>) -> Self {
        Target::Playbook(path.into())
    }

    /// Role target; fact gathering is skipped, matching ansible-runner's
    /// usual role invocation
    pub fn role(name: impl Into<String>, roles_path: impl Into<PathBuf>) -> Self {
        Target::Role {
            name: name.into(),
            roles_path: roles_path.into(),
            skip_facts: true,
        }
    }

    /// The path that must exist before anything is staged
    pub fn required_path(&self) -> &Path {
        match self {
            Target::Playbook(path) => path,
            Target::Role { roles_path, .. } => roles_path,
        }
    }
}

/// Per-run options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// `--tags` passed through `env/cmdline`
    pub tags: Option<String>,
    /// 0 (quiet) to 6; 5 and above also turns on debug mode
    pub verbosity: u8,
    /// `--become` passed through `env/cmdline`
    pub become_enabled: bool,
}

/// A single ansible-runner invocation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Environment variables for the runner subprocess
    pub environment: BTreeMap<String, String>,
    /// Extra vars written to `env/extravars`
    pub extra_vars: Map<String, Value>,
    /// Playbook or role
    pub target: Target,
    /// Tags, verbosity and become
    pub options: RunOptions,
}

impl RunRequest {
    /// Request for a playbook run
    pub fn playbook(path: impl Into<PathBuf>) -> Self {
        Self::new(Target::playbook(path))
    }

    /// Request for a role run
    pub fn role(name: impl Into<String>, roles_path: impl Into<PathBuf>) -> Self {
        Self::new(Target::role(name, roles_path))
    }

    pub fn new(target: Target) -> Self {
        RunRequest {
            environment: BTreeMap::new(),
            extra_vars: Map::new(),
            target,
            options: RunOptions::default(),
        }
    }

    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.environment
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_extra_vars<I, K>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.extra_vars
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.options.tags = Some(tags.into());
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.options.verbosity = verbosity;
        self
    }

    pub fn with_become(mut self, enabled: bool) -> Self {
        self.options.become_enabled = enabled;
        self
    }

    /// Only meaningful for role targets
    pub fn with_role_skip_facts(mut self, skip: bool) -> Self {
        if let Target::Role { skip_facts, .. } = &mut self.target {
            *skip_facts = skip;
        }
        self
    }

    /// Debug mode keeps the staged directory around for inspection
    pub fn debug(&self) -> bool {
        self.options.verbosity >= 5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_collects_env_and_extra_vars() {
        let request = RunRequest::playbook("/path/to/my/playbook")
            .with_env([("ENV1", "VAL1"), ("ENV2", "VAL2")])
            .with_extra_vars([("id", json!("abc"))])
            .with_tags("tag");

        assert_eq!(request.environment.len(), 2);
        assert_eq!(request.extra_vars["id"], json!("abc"));
        assert_eq!(request.options.tags.as_deref(), Some("tag"));
        assert_eq!(
            request.target.required_path(),
            Path::new("/path/to/my/playbook")
        );
    }

    #[test]
    fn test_debug_starts_at_verbosity_five() {
        let request = RunRequest::playbook("/p");
        assert!(!request.clone().with_verbosity(4).debug());
        assert!(request.clone().with_verbosity(5).debug());
        assert!(request.with_verbosity(6).debug());
    }

    #[test]
    fn test_role_skip_facts_defaults_on() {
        let request = RunRequest::role("my-role", "/roles");
        assert!(matches!(request.target, Target::Role { skip_facts: true, .. }));

        let request = request.with_role_skip_facts(false);
        assert!(matches!(request.target, Target::Role { skip_facts: false, .. }));
        assert_eq!(request.target.required_path(), Path::new("/roles"));
    }
}
