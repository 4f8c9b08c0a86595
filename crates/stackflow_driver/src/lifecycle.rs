//! Stack lifecycle sequencing.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use stackflow_config::{Environment, Project, StackKind};
use stackflow_engine::{
    AutomationEngine, EngineError, EngineResult, GitSource, Operation, OperationResult,
    ProgressStreams, StackHandle, StackName, StackSpec,
};

use crate::error::{DriverError, DriverResult};
use crate::report::{OperationRecord, RunMode, RunReport};
use crate::wiring::{remote_env_vars, StackWiring};

/// A stack that has been created or selected for this run.
#[derive(Debug, Clone)]
pub struct ManagedStack {
    pub kind: StackKind,
    pub nickname: String,
    pub handle: StackHandle,
}

impl ManagedStack {
    pub fn name(&self) -> &StackName {
        self.handle.name()
    }
}

/// The streaming lifecycle operations.
#[derive(Debug, Clone, Copy)]
enum Phase {
    Refresh,
    Update,
    Destroy,
}

impl Phase {
    fn operation(self) -> Operation {
        match self {
            Self::Refresh => Operation::Refresh,
            Self::Update => Operation::Update,
            Self::Destroy => Operation::Destroy,
        }
    }

    fn starting(self, nickname: &str) -> String {
        match self {
            Self::Refresh => format!("Starting refresh of {} stack", nickname),
            Self::Update => format!("Starting update of {} stack", nickname),
            Self::Destroy => format!("Destroying {} stack", nickname),
        }
    }

    fn succeeded(self, nickname: &str) -> String {
        match self {
            Self::Refresh => format!("Successfully refreshed {} stack", nickname),
            Self::Update => format!("Successfully updated {} stack", nickname),
            Self::Destroy => format!("Successfully destroyed {} stack", nickname),
        }
    }

    fn error(self, stack: &str, source: EngineError) -> DriverError {
        let stack = stack.to_string();
        match self {
            Self::Refresh => DriverError::Refresh { stack, source },
            Self::Update => DriverError::Update { stack, source },
            Self::Destroy => DriverError::Destroy { stack, source },
        }
    }
}

/// Drives every stack of an environment through one run.
pub struct StackDriver {
    engine: Arc<dyn AutomationEngine>,
    env: Environment,
    base_dir: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    stream_to_console: bool,
}

impl StackDriver {
    pub fn new(engine: Arc<dyn AutomationEngine>, env: Environment) -> Self {
        Self {
            engine,
            env,
            base_dir: None,
            log_dir: None,
            stream_to_console: true,
        }
    }

    /// Directory that relative local locations are resolved against.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Directory for progress logs (default: the system temp directory).
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Whether engine output is echoed to stdout as well as the log file.
    pub fn stream_to_console(mut self, enabled: bool) -> Self {
        self.stream_to_console = enabled;
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Run in the given mode.
    pub async fn run(&self, mode: RunMode) -> DriverResult<RunReport> {
        info!("Starting {} run for stack suffix {}", mode, self.env.stack_name);
        match mode {
            RunMode::Apply => self.apply().await,
            RunMode::Destroy => self.destroy().await,
        }
    }

    /// Set up every stack, then configure, refresh and update each in dependency order.
    pub async fn apply(&self) -> DriverResult<RunReport> {
        let mut report = RunReport::new(RunMode::Apply);
        let stacks = self.setup(&mut report).await?;

        for stack in &stacks {
            self.configure(stack, &mut report).await?;
            self.lifecycle(Phase::Refresh, stack, &mut report).await?;
            self.lifecycle(Phase::Update, stack, &mut report).await?;
        }

        report.finish();
        Ok(report)
    }

    /// Set up every stack, then destroy them in reverse dependency order.
    pub async fn destroy(&self) -> DriverResult<RunReport> {
        let mut report = RunReport::new(RunMode::Destroy);
        let stacks = self.setup(&mut report).await?;

        for stack in stacks.iter().rev() {
            self.lifecycle(Phase::Destroy, stack, &mut report).await?;
            if self.env.remove_on_destroy {
                self.remove(stack, &mut report).await?;
            }
        }

        report.finish();
        Ok(report)
    }

    /// Create or select every configured stack, in dependency order.
    pub async fn setup(&self, report: &mut RunReport) -> DriverResult<Vec<ManagedStack>> {
        let mut stacks = Vec::new();

        for (kind, project) in self.env.projects() {
            let nickname = project.nickname().to_string();
            let spec = self.stack_spec(project);
            let started = Instant::now();

            let handle = self.engine.upsert_stack(&spec).await.map_err(|e| {
                error!("Failed to create or select {} stack: {}", nickname, e);
                DriverError::Setup {
                    stack: nickname.clone(),
                    source: e,
                }
            })?;
            println!("Successfully created/selected {} stack", nickname);

            report.record(OperationRecord {
                operation: Operation::Upsert,
                kind,
                stack: spec.name.fully_qualified(),
                nickname: nickname.clone(),
                key: None,
                duration_ms: elapsed_ms(started),
                log_file: None,
            });
            stacks.push(ManagedStack {
                kind,
                nickname,
                handle,
            });
        }

        Ok(stacks)
    }

    /// Build the engine request for a project.
    pub fn stack_spec(&self, project: &Project) -> StackSpec {
        let name = StackName::new(
            &self.env.organization,
            &project.name,
            &self.env.stack_name,
        );

        let spec = if project.is_remote() {
            let mut git = GitSource::new(project.location.trim(), project.branch())
                .setup_command(self.env.setup_command());
            if let Some(sub) = project.subpath() {
                git = git.subpath(sub);
            }
            StackSpec::git(name, git)
        } else {
            StackSpec::local(name, self.local_dir(project))
        };

        if self.env.remote_deployment {
            spec.remote(remote_env_vars(&self.env, |k| std::env::var(k).ok()))
        } else {
            spec
        }
    }

    fn local_dir(&self, project: &Project) -> PathBuf {
        let location = Path::new(project.location.trim());
        let dir = match &self.base_dir {
            Some(base) if location.is_relative() => base.join(location),
            _ => location.to_path_buf(),
        };
        match project.subpath() {
            Some(sub) => dir.join(sub),
            None => dir,
        }
    }

    async fn configure(&self, stack: &ManagedStack, report: &mut RunReport) -> DriverResult<()> {
        for entry in StackWiring::new(&self.env).entries_for(stack.kind) {
            let started = Instant::now();
            self.engine
                .set_config(&stack.handle, &entry.key, &entry.value)
                .await
                .map_err(|e| {
                    error!("Failed to set {} on {} stack: {}", entry.key, stack.nickname, e);
                    DriverError::ConfigSet {
                        stack: stack.nickname.clone(),
                        key: entry.key.clone(),
                        source: e,
                    }
                })?;

            report.record(OperationRecord {
                operation: Operation::SetConfig,
                kind: stack.kind,
                stack: stack.name().fully_qualified(),
                nickname: stack.nickname.clone(),
                key: Some(entry.key),
                duration_ms: elapsed_ms(started),
                log_file: None,
            });
        }
        Ok(())
    }

    async fn lifecycle(
        &self,
        phase: Phase,
        stack: &ManagedStack,
        report: &mut RunReport,
    ) -> DriverResult<()> {
        println!("{}", phase.starting(&stack.nickname));

        let outcome: EngineResult<(OperationResult, Option<PathBuf>)> = async {
            let mut progress = self.progress_for(phase.operation(), stack)?;
            let result = match phase {
                Phase::Refresh => self.engine.refresh(&stack.handle, &mut progress).await?,
                Phase::Update => self.engine.update(&stack.handle, &mut progress).await?,
                Phase::Destroy => self.engine.destroy(&stack.handle, &mut progress).await?,
            };
            Ok::<_, EngineError>((result, progress.log_path().map(Path::to_path_buf)))
        }
        .await;

        let (result, log_file) = outcome.map_err(|e| {
            error!(
                "Failed to {} {} stack: {}",
                phase.operation(),
                stack.nickname,
                e
            );
            phase.error(&stack.nickname, e)
        })?;
        println!("{}", phase.succeeded(&stack.nickname));

        report.record(OperationRecord {
            operation: phase.operation(),
            kind: stack.kind,
            stack: result.stack,
            nickname: stack.nickname.clone(),
            key: None,
            duration_ms: result.duration_ms,
            log_file,
        });
        Ok(())
    }

    async fn remove(&self, stack: &ManagedStack, report: &mut RunReport) -> DriverResult<()> {
        let started = Instant::now();
        self.engine
            .remove_stack(&stack.handle)
            .await
            .map_err(|e| DriverError::Remove {
                stack: stack.nickname.clone(),
                source: e,
            })?;
        println!("Successfully removed {} stack", stack.nickname);

        report.record(OperationRecord {
            operation: Operation::Remove,
            kind: stack.kind,
            stack: stack.name().fully_qualified(),
            nickname: stack.nickname.clone(),
            key: None,
            duration_ms: elapsed_ms(started),
            log_file: None,
        });
        Ok(())
    }

    /// Console (optionally) plus a fresh log file for one operation.
    fn progress_for(&self, operation: Operation, stack: &ManagedStack) -> EngineResult<ProgressStreams> {
        let streams = if self.stream_to_console {
            ProgressStreams::stdout()
        } else {
            ProgressStreams::new()
        };
        let prefix = format!(
            "stackflow-{}-{}-",
            operation,
            file_safe(&stack.name().project)
        );
        Ok(streams.with_log_file(self.log_dir.as_deref(), &prefix)?)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackflow_engine::{Deployment, MockEngine, StackSource};

    fn env() -> Environment {
        Environment {
            region: "us-east-2".to_string(),
            organization: "acme".to_string(),
            stack_name: "qa".to_string(),
            base_project: Project::new("infra/base", "base"),
            platform_project: Project::new("https://github.com/acme/infra.git", "platform")
                .with_path("platform")
                .with_branch("release"),
            data_project: None,
            app_project: Project::new("/srv/app", "app"),
            remote_deployment: false,
            forward_env: Some(vec![]),
            setup_command: None,
            remove_on_destroy: false,
        }
    }

    fn driver(env: Environment) -> StackDriver {
        StackDriver::new(Arc::new(MockEngine::new()), env)
    }

    #[test]
    fn test_local_spec_resolves_against_base_dir() {
        let driver = driver(env()).with_base_dir("/work/config");
        let spec = driver.stack_spec(&driver.environment().base_project);

        assert_eq!(spec.name.fully_qualified(), "acme/base/qa");
        assert_eq!(
            spec.source,
            StackSource::Local {
                dir: PathBuf::from("/work/config/infra/base")
            }
        );
        assert_eq!(spec.deployment, Deployment::Local);

        let app = driver.stack_spec(&driver.environment().app_project);
        assert_eq!(
            app.source,
            StackSource::Local {
                dir: PathBuf::from("/srv/app")
            }
        );
    }

    #[test]
    fn test_git_spec_carries_branch_and_subpath() {
        let driver = driver(env());
        let spec = driver.stack_spec(&driver.environment().platform_project);

        match spec.source {
            StackSource::Git(git) => {
                assert_eq!(git.url, "https://github.com/acme/infra.git");
                assert_eq!(git.branch, "release");
                assert_eq!(git.subpath.as_deref(), Some("platform"));
                assert_eq!(git.setup_command, vec!["npm", "install"]);
            }
            other => panic!("expected git source, got {:?}", other),
        }
    }

    #[test]
    fn test_remote_deployment_forwards_region() {
        let mut env = env();
        env.remote_deployment = true;
        let driver = driver(env);
        let spec = driver.stack_spec(&driver.environment().platform_project);

        match spec.deployment {
            Deployment::Remote { env } => {
                assert_eq!(env.len(), 1);
                assert_eq!(env[0].name, "AWS_REGION");
                assert_eq!(env[0].value, "us-east-2");
                assert!(!env[0].secret);
            }
            Deployment::Local => panic!("expected remote deployment"),
        }
    }

    #[test]
    fn test_file_safe() {
        assert_eq!(file_safe("web-api_v2"), "web-api_v2");
        assert_eq!(file_safe("a/b c"), "a-b-c");
    }
}
