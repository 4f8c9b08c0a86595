//! Automation engine trait and stack types.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::config::{ConfigValue, GitSource, StackSpec};
use crate::error::EngineResult;
use crate::progress::ProgressStreams;

/// A fully qualified stack name: `organization/project/stack`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackName {
    pub organization: String,
    pub project: String,
    pub stack: String,
}

impl StackName {
    pub fn new(
        organization: impl Into<String>,
        project: impl Into<String>,
        stack: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            project: project.into(),
            stack: stack.into(),
        }
    }

    pub fn fully_qualified(&self) -> String {
        format!("{}/{}/{}", self.organization, self.project, self.stack)
    }
}

impl std::fmt::Display for StackName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.fully_qualified())
    }
}

/// Engine operations, as recorded in reports and mock captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Upsert,
    SetConfig,
    Refresh,
    Update,
    Destroy,
    Remove,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upsert => "upsert",
            Self::SetConfig => "set_config",
            Self::Refresh => "refresh",
            Self::Update => "update",
            Self::Destroy => "destroy",
            Self::Remove => "remove",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opaque reference to a created or selected stack.
///
/// A handle backed by a cloned git workspace keeps that workspace alive until
/// the last clone of the handle is dropped. Clones share staged config.
#[derive(Debug, Clone)]
pub struct StackHandle {
    name: StackName,
    workdir: Option<PathBuf>,
    remote: Option<RemoteTarget>,
    checkout: Option<Arc<TempDir>>,
    staged: Arc<Mutex<Vec<(String, ConfigValue)>>>,
}

/// Source and environment for a stack that runs on the deployment service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub git: GitSource,
    pub env: Vec<crate::config::EnvVarValue>,
}

impl StackHandle {
    /// A stack whose program lives in a local directory.
    pub fn local(name: StackName, workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: Some(workdir.into()),
            ..Self::detached(name)
        }
    }

    /// A stack whose program was cloned into a temporary workspace.
    pub fn checked_out(name: StackName, workdir: PathBuf, checkout: TempDir) -> Self {
        Self::detached(name).with_checkout(workdir, checkout)
    }

    /// A stack that runs on the deployment service.
    pub fn remote(name: StackName, target: RemoteTarget) -> Self {
        Self {
            remote: Some(target),
            ..Self::detached(name)
        }
    }

    /// A stack with no local program, as produced by dry runs and mocks.
    pub fn detached(name: StackName) -> Self {
        Self {
            name,
            workdir: None,
            remote: None,
            checkout: None,
            staged: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Run engine commands from `workdir` inside `checkout`, keeping it alive.
    pub fn with_checkout(mut self, workdir: PathBuf, checkout: TempDir) -> Self {
        self.workdir = Some(workdir);
        self.checkout = Some(Arc::new(checkout));
        self
    }

    /// Record a config entry to apply inside the next remote operation.
    /// A later value for the same key replaces the earlier one.
    pub fn stage_config(&self, key: &str, value: &ConfigValue) {
        let mut staged = self.staged.lock();
        match staged.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.clone(),
            None => staged.push((key.to_string(), value.clone())),
        }
    }

    /// Config entries staged for remote operations, in the order first set.
    pub fn staged_config(&self) -> Vec<(String, ConfigValue)> {
        self.staged.lock().clone()
    }

    pub fn name(&self) -> &StackName {
        &self.name
    }

    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    pub fn remote_target(&self) -> Option<&RemoteTarget> {
        self.remote.as_ref()
    }

    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }
}

/// Outcome of a refresh, update or destroy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    pub operation: Operation,
    pub stack: String,
    /// Engine stdout
    pub output: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl OperationResult {
    pub fn new(
        operation: Operation,
        stack: &StackName,
        output: String,
        started_at: DateTime<Utc>,
    ) -> Self {
        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        Self {
            operation,
            stack: stack.fully_qualified(),
            output,
            started_at,
            finished_at,
            duration_ms,
        }
    }
}

/// The external automation engine.
///
/// Every call blocks its caller until the engine finishes; implementations
/// perform no retries.
#[async_trait]
pub trait AutomationEngine: Send + Sync {
    /// Check if the engine can be invoked.
    async fn is_available(&self) -> EngineResult<bool>;

    /// Get engine version information.
    async fn version(&self) -> EngineResult<String>;

    /// Create the stack if absent, otherwise select it.
    async fn upsert_stack(&self, spec: &StackSpec) -> EngineResult<StackHandle>;

    /// Set a single configuration entry on a stack.
    async fn set_config(
        &self,
        stack: &StackHandle,
        key: &str,
        value: &ConfigValue,
    ) -> EngineResult<()>;

    /// Reconcile recorded state with real infrastructure.
    async fn refresh(
        &self,
        stack: &StackHandle,
        progress: &mut ProgressStreams,
    ) -> EngineResult<OperationResult>;

    /// Apply the stack's program.
    async fn update(
        &self,
        stack: &StackHandle,
        progress: &mut ProgressStreams,
    ) -> EngineResult<OperationResult>;

    /// Tear down every resource in the stack.
    async fn destroy(
        &self,
        stack: &StackHandle,
        progress: &mut ProgressStreams,
    ) -> EngineResult<OperationResult>;

    /// Delete the stack's state record.
    async fn remove_stack(&self, stack: &StackHandle) -> EngineResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fully_qualified_name() {
        let name = StackName::new("acme", "platform", "dev");
        assert_eq!(name.fully_qualified(), "acme/platform/dev");
        assert_eq!(name.to_string(), "acme/platform/dev");
    }

    #[test]
    fn test_handle_kinds() {
        let name = StackName::new("acme", "base", "dev");

        let local = StackHandle::local(name.clone(), "/srv/base");
        assert_eq!(local.workdir(), Some(Path::new("/srv/base")));
        assert!(!local.is_remote());

        let detached = StackHandle::detached(name.clone());
        assert!(detached.workdir().is_none());

        let remote = StackHandle::remote(
            name,
            RemoteTarget {
                git: GitSource::new("https://example.com/r.git", "main"),
                env: Vec::new(),
            },
        );
        assert!(remote.is_remote());
        assert!(remote.workdir().is_none());
    }

    #[test]
    fn test_staged_config_shared_and_replaced() {
        let handle = StackHandle::detached(StackName::new("acme", "app", "dev"));
        let copy = handle.clone();

        handle.stage_config("platformOrgName", &ConfigValue::plain("acme"));
        copy.stage_config("dbPassword", &ConfigValue::secret("one"));
        handle.stage_config("dbPassword", &ConfigValue::secret("two"));

        assert_eq!(
            copy.staged_config(),
            vec![
                ("platformOrgName".to_string(), ConfigValue::plain("acme")),
                ("dbPassword".to_string(), ConfigValue::secret("two")),
            ]
        );
    }

    #[test]
    fn test_checkout_outlives_clones() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();
        let handle = StackHandle::checked_out(StackName::new("o", "p", "s"), path.clone(), dir);

        let copy = handle.clone();
        drop(handle);
        assert!(path.exists());
        drop(copy);
        assert!(!path.exists());
    }
}
