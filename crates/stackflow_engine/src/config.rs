//! Stack source and engine configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::engine::StackName;

/// A configuration value to set on a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValue {
    pub value: String,
    /// Whether the engine should encrypt the value at rest
    pub secret: bool,
}

impl ConfigValue {
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secret: false,
        }
    }

    pub fn secret(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secret: true,
        }
    }
}

/// An environment variable forwarded into a remote deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVarValue {
    pub name: String,
    pub value: String,
    pub secret: bool,
}

impl EnvVarValue {
    pub fn plain(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            secret: false,
        }
    }

    pub fn secret(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            secret: true,
        }
    }
}

/// A program held in a git repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitSource {
    /// Repository URL
    pub url: String,
    /// Subdirectory holding the program
    pub subpath: Option<String>,
    /// Branch to check out
    pub branch: String,
    /// Command run in the program directory after cloning
    pub setup_command: Vec<String>,
}

impl GitSource {
    pub fn new(url: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            subpath: None,
            branch: branch.into(),
            setup_command: Vec::new(),
        }
    }

    pub fn subpath(mut self, subpath: impl Into<String>) -> Self {
        self.subpath = Some(subpath.into());
        self
    }

    pub fn setup_command(mut self, cmd: Vec<String>) -> Self {
        self.setup_command = cmd;
        self
    }

    /// Fully qualified ref name, as remote deployments expect.
    pub fn branch_ref(&self) -> String {
        if self.branch.starts_with("refs/") {
            self.branch.clone()
        } else {
            format!("refs/heads/{}", self.branch)
        }
    }
}

/// Where a stack's program comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum StackSource {
    Local { dir: PathBuf },
    Git(GitSource),
}

/// Where stack operations execute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deployment {
    /// On this machine, against a local or cloned program
    #[default]
    Local,
    /// On the engine's deployment service, with forwarded environment
    Remote { env: Vec<EnvVarValue> },
}

/// Everything needed to create or select a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSpec {
    pub name: StackName,
    pub source: StackSource,
    pub deployment: Deployment,
}

impl StackSpec {
    pub fn local(name: StackName, dir: impl Into<PathBuf>) -> Self {
        Self {
            name,
            source: StackSource::Local { dir: dir.into() },
            deployment: Deployment::Local,
        }
    }

    pub fn git(name: StackName, source: GitSource) -> Self {
        Self {
            name,
            source: StackSource::Git(source),
            deployment: Deployment::Local,
        }
    }

    /// Run operations remotely, forwarding the given variables.
    pub fn remote(mut self, env: Vec<EnvVarValue>) -> Self {
        self.deployment = Deployment::Remote { env };
        self
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.deployment, Deployment::Remote { .. })
    }
}

/// Options for the CLI-backed engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Engine binary to invoke
    pub binary: String,
    /// Arguments placed before every subcommand
    pub global_args: Vec<String>,
    /// Log commands instead of executing them
    pub dry_run: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            binary: "pulumi".to_string(),
            global_args: vec!["--color".to_string(), "never".to_string()],
            dry_run: false,
        }
    }
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn global_args(mut self, args: Vec<String>) -> Self {
        self.global_args = args;
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_ref() {
        let source = GitSource::new("https://example.com/repo.git", "main");
        assert_eq!(source.branch_ref(), "refs/heads/main");

        let source = GitSource::new("https://example.com/repo.git", "refs/tags/v1");
        assert_eq!(source.branch_ref(), "refs/tags/v1");
    }

    #[test]
    fn test_spec_builders() {
        let name = StackName::new("acme", "base", "dev");
        let spec = StackSpec::local(name.clone(), "/tmp/base");
        assert!(!spec.is_remote());

        let spec = StackSpec::git(name, GitSource::new("https://example.com/r.git", "main"))
            .remote(vec![EnvVarValue::secret("TOKEN", "x")]);
        assert!(spec.is_remote());
    }

    #[test]
    fn test_default_options() {
        let options = EngineOptions::default();
        assert_eq!(options.binary, "pulumi");
        assert!(!options.dry_run);
        assert!(EngineOptions::new().dry_run().dry_run);
    }
}
