//! Environment and project records.

use serde::{Deserialize, Serialize};

/// Branch used for git sources when none is configured.
pub const DEFAULT_BRANCH: &str = "main";

/// Configuration file read when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Credential variables forwarded to remote deployments when `forwardEnv` is unset.
pub const DEFAULT_FORWARD_ENV: [&str; 3] =
    ["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY", "AWS_SESSION_TOKEN"];

/// Command run in a freshly cloned git workspace when `setupCommand` is unset.
pub const DEFAULT_SETUP_COMMAND: [&str; 2] = ["npm", "install"];

/// The logical role of a stack. Declaration order is dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackKind {
    Base,
    Platform,
    Data,
    App,
}

impl StackKind {
    /// All kinds in dependency order.
    pub const ALL: [StackKind; 4] = [
        StackKind::Base,
        StackKind::Platform,
        StackKind::Data,
        StackKind::App,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Platform => "platform",
            Self::Data => "data",
            Self::App => "app",
        }
    }

    /// Kinds whose identifying metadata this kind receives as configuration.
    pub fn upstream(&self) -> &'static [StackKind] {
        match self {
            Self::Base => &[],
            Self::Platform | Self::Data => &[StackKind::Base],
            Self::App => &[StackKind::Platform, StackKind::Data],
        }
    }

    /// Whether the cloud region is set on stacks of this kind.
    pub fn receives_region(&self) -> bool {
        !matches!(self, Self::App)
    }
}

impl std::fmt::Display for StackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a stack program lives and how it is labelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Local directory or git URL of the program
    pub location: String,
    /// Logical project name, the middle segment of the stack name
    pub name: String,
    /// Label used in progress messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Subdirectory of a git repository holding the program
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Git branch to check out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Prefix downstream stacks use for the keys that point at this project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_prefix: Option<String>,
}

impl Project {
    pub fn new(location: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            name: name.into(),
            nickname: None,
            path: None,
            branch: None,
            reference_prefix: None,
        }
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_reference_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.reference_prefix = Some(prefix.into());
        self
    }

    /// Branch to check out, `main` unless configured.
    pub fn branch(&self) -> &str {
        non_empty(&self.branch).unwrap_or(DEFAULT_BRANCH)
    }

    /// Display label, falling back to the project name.
    pub fn nickname(&self) -> &str {
        non_empty(&self.nickname).unwrap_or(&self.name)
    }

    /// Subdirectory within the repository, if any.
    pub fn subpath(&self) -> Option<&str> {
        non_empty(&self.path)
    }

    /// Key prefix for downstream wiring, falling back to the kind name.
    pub fn reference_prefix(&self, kind: StackKind) -> &str {
        non_empty(&self.reference_prefix).unwrap_or(kind.as_str())
    }

    /// Whether the location names a git repository rather than a local directory.
    pub fn is_remote(&self) -> bool {
        let location = self.location.trim();
        location.contains("://") || location.starts_with("git@") || location.ends_with(".git")
    }
}

/// Empty strings count as absent, so `branch: ""` behaves like no branch.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// A deployment environment: shared settings plus one project per stack kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Cloud region, set as `aws:region` on non-app stacks
    pub region: String,
    /// Organization owning every stack
    pub organization: String,
    /// Stack suffix shared by every project, e.g. `dev`
    pub stack_name: String,
    pub base_project: Project,
    pub platform_project: Project,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_project: Option<Project>,
    pub app_project: Project,
    /// Run stack operations on the engine's remote deployment service
    #[serde(default)]
    pub remote_deployment: bool,
    /// Credential variables forwarded to remote deployments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_env: Option<Vec<String>>,
    /// Command run after cloning a git source; an empty list skips setup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_command: Option<Vec<String>>,
    /// Delete each stack's state record after destroying its resources
    #[serde(default)]
    pub remove_on_destroy: bool,
}

impl Environment {
    /// Project configured for a stack kind, if any.
    pub fn project(&self, kind: StackKind) -> Option<&Project> {
        match kind {
            StackKind::Base => Some(&self.base_project),
            StackKind::Platform => Some(&self.platform_project),
            StackKind::Data => self.data_project.as_ref(),
            StackKind::App => Some(&self.app_project),
        }
    }

    /// Configured projects in dependency order.
    pub fn projects(&self) -> Vec<(StackKind, &Project)> {
        StackKind::ALL
            .iter()
            .filter_map(|kind| self.project(*kind).map(|p| (*kind, p)))
            .collect()
    }

    /// Configured kinds in dependency order.
    pub fn kinds(&self) -> Vec<StackKind> {
        self.projects().into_iter().map(|(kind, _)| kind).collect()
    }

    pub fn forward_env(&self) -> Vec<String> {
        match &self.forward_env {
            Some(vars) => vars.clone(),
            None => DEFAULT_FORWARD_ENV.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn setup_command(&self) -> Vec<String> {
        match &self.setup_command {
            Some(cmd) => cmd.clone(),
            None => DEFAULT_SETUP_COMMAND.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Environment {
        Environment {
            region: "us-west-2".to_string(),
            organization: "acme".to_string(),
            stack_name: "dev".to_string(),
            base_project: Project::new("./base", "base-infra"),
            platform_project: Project::new("./platform", "k8s"),
            data_project: None,
            app_project: Project::new("./app", "web"),
            remote_deployment: false,
            forward_env: None,
            setup_command: None,
            remove_on_destroy: false,
        }
    }

    #[test]
    fn test_kinds_are_declared_in_dependency_order() {
        let mut sorted = StackKind::ALL;
        sorted.sort();
        assert_eq!(sorted, StackKind::ALL);
        assert_eq!(StackKind::ALL[0], StackKind::Base);
        assert_eq!(StackKind::ALL[3], StackKind::App);
    }

    #[test]
    fn test_upstream_only_points_backwards() {
        for kind in StackKind::ALL {
            for upstream in kind.upstream() {
                assert!(upstream < &kind, "{} depends on later kind {}", kind, upstream);
            }
        }
    }

    #[test]
    fn test_region_not_set_on_app() {
        assert!(StackKind::Base.receives_region());
        assert!(StackKind::Data.receives_region());
        assert!(!StackKind::App.receives_region());
    }

    #[test]
    fn test_branch_defaults_to_main() {
        let project = Project::new("https://github.com/acme/base.git", "base");
        assert_eq!(project.branch(), "main");

        let blank = project.clone().with_branch("  ");
        assert_eq!(blank.branch(), "main");

        let custom = project.with_branch("release");
        assert_eq!(custom.branch(), "release");
    }

    #[test]
    fn test_nickname_falls_back_to_name() {
        let project = Project::new("./base", "base-infra");
        assert_eq!(project.nickname(), "base-infra");
        assert_eq!(project.with_nickname("Base").nickname(), "Base");
    }

    #[test]
    fn test_reference_prefix_defaults_to_kind() {
        let project = Project::new("./base", "base-infra");
        assert_eq!(project.reference_prefix(StackKind::Base), "base");
        let project = project.with_reference_prefix("infra");
        assert_eq!(project.reference_prefix(StackKind::Base), "infra");
    }

    #[test]
    fn test_remote_detection() {
        assert!(Project::new("https://github.com/acme/infra", "x").is_remote());
        assert!(Project::new("git@github.com:acme/infra.git", "x").is_remote());
        assert!(Project::new("ssh://git@host/infra", "x").is_remote());
        assert!(!Project::new("../infra/base", "x").is_remote());
        assert!(!Project::new("/abs/path", "x").is_remote());
    }

    #[test]
    fn test_projects_skip_missing_data() {
        let env = env();
        assert_eq!(
            env.kinds(),
            vec![StackKind::Base, StackKind::Platform, StackKind::App]
        );

        let mut with_data = env;
        with_data.data_project = Some(Project::new("./data", "db"));
        assert_eq!(with_data.kinds(), StackKind::ALL.to_vec());
    }

    #[test]
    fn test_forward_env_and_setup_defaults() {
        let mut env = env();
        assert_eq!(env.forward_env().len(), 3);
        assert_eq!(env.setup_command(), vec!["npm", "install"]);

        env.forward_env = Some(vec!["ARM_CLIENT_ID".to_string()]);
        env.setup_command = Some(vec![]);
        assert_eq!(env.forward_env(), vec!["ARM_CLIENT_ID"]);
        assert!(env.setup_command().is_empty());
    }
}
