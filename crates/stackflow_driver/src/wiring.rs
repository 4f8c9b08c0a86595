//! Cross-stack configuration.
//!
//! Stacks are connected by name only: a downstream stack receives the
//! organization, project and stack names of each upstream stack and resolves
//! the outputs itself through the engine's stack references.

use serde::{Deserialize, Serialize};
use tracing::warn;

use stackflow_config::{Environment, Project, StackKind};
use stackflow_engine::{ConfigValue, EnvVarValue};

/// Config key holding the cloud region.
pub const REGION_KEY: &str = "aws:region";

/// Environment variable carrying the region into remote deployments.
pub const REGION_ENV_VAR: &str = "AWS_REGION";

/// A configuration entry to set on a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: ConfigValue,
}

impl ConfigEntry {
    pub fn plain(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: ConfigValue::plain(value),
        }
    }
}

/// Builds the configuration for each stack of an environment.
pub struct StackWiring<'a> {
    env: &'a Environment,
}

impl<'a> StackWiring<'a> {
    pub fn new(env: &'a Environment) -> Self {
        Self { env }
    }

    /// Entries to set on a stack of `kind` before it is refreshed.
    pub fn entries_for(&self, kind: StackKind) -> Vec<ConfigEntry> {
        let mut entries = Vec::new();

        if kind.receives_region() {
            entries.push(ConfigEntry::plain(REGION_KEY, &self.env.region));
        }

        for upstream in kind.upstream() {
            if let Some(project) = self.env.project(*upstream) {
                entries.extend(self.reference_entries(*upstream, project));
            }
        }

        entries
    }

    /// The `<prefix>OrgName`, `<prefix>ProjName` and `<prefix>StackName`
    /// entries pointing at an upstream project.
    pub fn reference_entries(&self, kind: StackKind, project: &Project) -> [ConfigEntry; 3] {
        let prefix = project.reference_prefix(kind);
        [
            ConfigEntry::plain(format!("{}OrgName", prefix), &self.env.organization),
            ConfigEntry::plain(format!("{}ProjName", prefix), &project.name),
            ConfigEntry::plain(format!("{}StackName", prefix), &self.env.stack_name),
        ]
    }
}

/// Variables forwarded into remote deployments: the region in plain text,
/// then every `forwardEnv` variable as a secret. Unset variables are skipped.
pub fn remote_env_vars(
    env: &Environment,
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<EnvVarValue> {
    let mut vars = vec![EnvVarValue::plain(REGION_ENV_VAR, &env.region)];

    for name in env.forward_env() {
        match lookup(&name) {
            Some(value) => vars.push(EnvVarValue::secret(name, value)),
            None => warn!("{} is not set; not forwarding it to remote deployments", name),
        }
    }

    vars
}
