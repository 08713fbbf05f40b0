//! PYTHONPATH resolution for the runner subprocess
//!
//! ansible-runner must be able to import the ansible modules it drives. Those
//! live either where `ansible --version` says they are, or in one of a few
//! bundled virtualenvs. The resolver probes all of them once and caches the
//! joined result until [`ModulePathResolver::reset`] is called.

use crate::config::ModulePathCandidates;
use crate::version::VersionReport;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::process::Command;
use tracing::{debug, warn};

/// Source of the `ansible --version` text
#[async_trait]
pub trait VersionProbe: Send + Sync {
    /// Raw report text; empty when ansible is missing or fails to start.
    async fn version_report(&self) -> String;
}

/// Runs `<ansible_bin> --version` with stderr discarded
#[derive(Debug, Clone)]
pub struct AnsibleVersionProbe {
    ansible_bin: String,
}

impl AnsibleVersionProbe {
    pub fn new(ansible_bin: impl Into<String>) -> Self {
        AnsibleVersionProbe {
            ansible_bin: ansible_bin.into(),
        }
    }
}

impl Default for AnsibleVersionProbe {
    fn default() -> Self {
        Self::new("ansible")
    }
}

#[async_trait]
impl VersionProbe for AnsibleVersionProbe {
    async fn version_report(&self) -> String {
        let output = Command::new(&self.ansible_bin)
            .arg("--version")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await;

        match output {
            Ok(out) => String::from_utf8_lossy(&out.stdout).into_owned(),
            Err(e) => {
                debug!("{} --version could not be run: {}", self.ansible_bin, e);
                String::new()
            }
        }
    }
}

/// Ordered, de-duplicated list of existing site-packages directories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModulePath(Vec<PathBuf>);

impl ModulePath {
    /// Keep candidates that exist on disk, first occurrence wins.
    pub fn from_candidates<I>(candidates: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut paths: Vec<PathBuf> = Vec::new();
        for candidate in candidates {
            if candidate.as_os_str().is_empty() || paths.contains(&candidate) {
                continue;
            }
            if !candidate.exists() {
                continue;
            }
            if std::env::join_paths([&candidate]).is_err() {
                warn!("Skipping module path containing a path separator: {:?}", candidate);
                continue;
            }
            paths.push(candidate);
        }
        ModulePath(paths)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Paths joined with the platform separator, ready for `PYTHONPATH`
    pub fn joined(&self) -> String {
        std::env::join_paths(&self.0)
            .map(|joined| joined.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Resolves (and memoizes) the PYTHONPATH value for runner subprocesses
pub struct ModulePathResolver {
    probe: Arc<dyn VersionProbe>,
    candidates: ModulePathCandidates,
    cached: Mutex<Option<String>>,
}

impl ModulePathResolver {
    pub fn new(probe: Arc<dyn VersionProbe>, candidates: ModulePathCandidates) -> Self {
        ModulePathResolver {
            probe,
            candidates,
            cached: Mutex::new(None),
        }
    }

    /// Site-packages directory ansible reports for itself; `None` when the
    /// probe output is empty or unparsable.
    pub async fn ansible_python_path(&self) -> Option<PathBuf> {
        let text = self.probe.version_report().await;
        match VersionReport::parse(&text).and_then(|report| report.site_packages()) {
            Ok(path) if !path.as_os_str().is_empty() => {
                debug!("ansible reports site-packages at {:?}", path);
                Some(path)
            }
            Ok(_) => None,
            Err(e) => {
                debug!("No ansible python path: {}", e);
                None
            }
        }
    }

    /// Compute the module path without touching the cache.
    ///
    /// Precedence: AWX bundle, ansible-reported, python3 bundle, python2 bundle.
    pub async fn probe(&self) -> ModulePath {
        let reported = self.ansible_python_path().await;

        let ordered = std::iter::once(self.candidates.awx.clone())
            .chain(reported)
            .chain([
                self.candidates.python3.clone(),
                self.candidates.python2.clone(),
            ]);

        ModulePath::from_candidates(ordered)
    }

    /// PYTHONPATH value; computed on first use, cached afterwards.
    /// An empty string means no module directory was found.
    pub async fn resolve(&self) -> String {
        let cached = self.cache().clone();
        if let Some(cached) = cached {
            return cached;
        }

        // Recomputing concurrently is harmless: the result only depends on
        // the filesystem and the probe.
        let joined = self.probe().await.joined();
        debug!("Resolved PYTHONPATH: {:?}", joined);
        *self.cache() = Some(joined.clone());
        joined
    }

    /// Pin the value returned by [`resolve`](Self::resolve).
    pub fn set_override(&self, value: impl Into<String>) {
        *self.cache() = Some(value.into());
    }

    /// Forget the cached value; the next `resolve` probes again.
    pub fn reset(&self) {
        *self.cache() = None;
    }

    pub fn candidates(&self) -> &ModulePathCandidates {
        &self.candidates
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        // A poisoned cache only ever holds a complete String or None.
        self.cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ModulePathResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModulePathResolver")
            .field("candidates", &self.candidates)
            .field("cached", &*self.cache())
            .finish()
    }
}
