//! Automation engine backed by the `pulumi` CLI.
//!
//! Stack programs may live in a local directory, in a git repository that is
//! cloned into a temporary workspace, or be executed by the Pulumi deployment
//! service (`--remote`). Output from long-running operations is streamed line
//! by line to the caller's [`ProgressStreams`].

use std::io::Write;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{ConfigValue, Deployment, EngineOptions, StackSource, StackSpec};
use crate::engine::{AutomationEngine, Operation, OperationResult, RemoteTarget, StackHandle};
use crate::error::{EngineError, EngineResult};
use crate::git::GitCheckout;
use crate::progress::ProgressStreams;

/// Prefix of the variables carrying secret config into remote deployments.
const SECRET_CONFIG_VAR: &str = "STACKFLOW_SECRET_CONFIG";

/// Placeholder shown in logs instead of secret values.
const REDACTED: &str = "[secret]";

/// Arguments for one engine invocation, with the values that must not be logged.
#[derive(Debug, Clone, Default)]
struct Invocation {
    args: Vec<String>,
    sensitive: Vec<String>,
}

impl Invocation {
    fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            sensitive: Vec::new(),
        }
    }

    fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn secret_arg(mut self, arg: impl Into<String>, secret: &str) -> Self {
        self.args.push(arg.into());
        if !secret.is_empty() {
            self.sensitive.push(secret.to_string());
        }
        self
    }

    /// Command line for logging, secrets replaced.
    fn display(&self, binary: &str) -> String {
        let mut cmd = binary.to_string();
        for arg in &self.args {
            let mut shown = arg.clone();
            for secret in &self.sensitive {
                shown = shown.replace(secret.as_str(), REDACTED);
            }
            if shown.contains(' ') {
                cmd.push_str(&format!(" '{}'", shown));
            } else {
                cmd.push(' ');
                cmd.push_str(&shown);
            }
        }
        cmd
    }
}

/// Captured output of a finished engine command.
#[derive(Debug, Default)]
struct CommandOutput {
    exit_code: i32,
    stdout: String,
    stderr: String,
}

impl CommandOutput {
    fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Engine that shells out to the `pulumi` binary.
pub struct PulumiCli {
    options: EngineOptions,
}

impl PulumiCli {
    /// Create an engine, failing if the binary cannot be run.
    pub async fn new(options: EngineOptions) -> EngineResult<Self> {
        if !options.dry_run && !Self::is_binary_available(&options).await {
            return Err(EngineError::NotAvailable(format!(
                "`{} version` could not be run; is the Pulumi CLI installed?",
                options.binary
            )));
        }
        info!("Using automation engine: {}", options.binary);
        Ok(Self { options })
    }

    /// Create an engine without probing the binary.
    pub fn with_options(options: EngineOptions) -> Self {
        Self { options }
    }

    async fn is_binary_available(options: &EngineOptions) -> bool {
        Command::new(&options.binary)
            .args(&options.global_args)
            .arg("version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Arguments shared by refresh, update and destroy.
    fn lifecycle_invocation(subcommand: &str, stack: &StackHandle) -> Invocation {
        let invocation = Invocation::new([
            subcommand,
            "--yes",
            "--skip-preview",
            "--non-interactive",
            "--stack",
        ])
        .arg(stack.name().fully_qualified());

        match stack.remote_target() {
            Some(target) => {
                let invocation = Self::with_remote_args(invocation, target);
                Self::with_staged_config(invocation, stack)
            }
            None => invocation,
        }
    }

    fn with_remote_args(invocation: Invocation, target: &RemoteTarget) -> Invocation {
        let mut invocation = invocation
            .arg("--remote")
            .arg("--remote-git-url")
            .arg(target.git.url.clone())
            .arg("--remote-git-branch")
            .arg(target.git.branch_ref());

        if let Some(dir) = target.git.subpath.as_deref().filter(|d| !d.is_empty()) {
            invocation = invocation.arg("--remote-git-repo-dir").arg(dir);
        }

        for var in &target.env {
            let pair = format!("{}={}", var.name, var.value);
            invocation = if var.secret {
                invocation
                    .arg("--remote-env-secret")
                    .secret_arg(pair, &var.value)
            } else {
                invocation.arg("--remote-env").arg(pair)
            };
        }
        invocation
    }

    /// Replay staged config inside the deployment's own checkout before the
    /// operation runs. Secret values travel as secret environment variables.
    fn with_staged_config(mut invocation: Invocation, stack: &StackHandle) -> Invocation {
        let fq = stack.name().fully_qualified();

        for (index, (key, value)) in stack.staged_config().into_iter().enumerate() {
            let command = if value.secret {
                let var = format!("{}_{}", SECRET_CONFIG_VAR, index);
                invocation = invocation
                    .arg("--remote-env-secret")
                    .secret_arg(format!("{}={}", var, value.value), &value.value);
                format!(
                    "pulumi config set --stack {} --secret {} \"${}\"",
                    fq,
                    shell_quote(&key),
                    var
                )
            } else {
                format!(
                    "pulumi config set --stack {} --plaintext {} {}",
                    fq,
                    shell_quote(&key),
                    shell_quote(&value.value)
                )
            };
            invocation = invocation.arg("--remote-pre-run-command").arg(command);
        }
        invocation
    }

    fn config_invocation(stack: &StackHandle, key: &str, value: &ConfigValue) -> Invocation {
        let invocation = Invocation::new(["config", "set", key])
            .secret_arg(value.value.clone(), if value.secret { value.value.as_str() } else { "" })
            .arg("--stack")
            .arg(stack.name().fully_qualified())
            .arg("--non-interactive");

        if value.secret {
            invocation.arg("--secret")
        } else {
            invocation.arg("--plaintext")
        }
    }

    /// Run the engine, streaming stdout to `progress` when given.
    async fn run(
        &self,
        invocation: &Invocation,
        workdir: Option<&Path>,
        mut progress: Option<&mut ProgressStreams>,
    ) -> EngineResult<CommandOutput> {
        let shown = invocation.display(&self.options.binary);

        if self.options.dry_run {
            info!("[dry-run] {}", shown);
            if let Some(progress) = progress.as_deref_mut() {
                writeln!(progress, "[dry-run] {}", shown)?;
                progress.flush()?;
            }
            return Ok(CommandOutput::default());
        }

        debug!("Executing: {}", shown);

        let mut cmd = Command::new(&self.options.binary);
        cmd.args(&self.options.global_args)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| EngineError::Spawn {
            binary: self.options.binary.clone(),
            source: e,
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::ExecutionFailed("stdout was not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::ExecutionFailed("stderr was not captured".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut output = String::new();
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(progress) = progress.as_deref_mut() {
                writeln!(progress, "{}", line)?;
            }
            output.push_str(&line);
            output.push('\n');
        }
        if let Some(progress) = progress.as_deref_mut() {
            progress.flush()?;
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();

        Ok(CommandOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout: output,
            stderr,
        })
    }

    /// Run and turn a non-zero exit into [`EngineError::CommandFailed`].
    async fn run_checked(
        &self,
        operation: &str,
        invocation: &Invocation,
        workdir: Option<&Path>,
        progress: Option<&mut ProgressStreams>,
    ) -> EngineResult<CommandOutput> {
        let output = self.run(invocation, workdir, progress).await?;
        if !output.success() {
            return Err(EngineError::CommandFailed {
                command: format!("{} {}", self.options.binary, operation),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    async fn lifecycle(
        &self,
        operation: Operation,
        subcommand: &str,
        stack: &StackHandle,
        progress: &mut ProgressStreams,
    ) -> EngineResult<OperationResult> {
        let started_at = Utc::now();
        let invocation = Self::lifecycle_invocation(subcommand, stack);
        let output = self
            .run_checked(subcommand, &invocation, stack.workdir(), Some(progress))
            .await?;
        Ok(OperationResult::new(
            operation,
            stack.name(),
            output.stdout,
            started_at,
        ))
    }

    async fn select_local(&self, spec: &StackSpec, dir: &Path) -> EngineResult<()> {
        let invocation = Invocation::new(["stack", "select", "--create", "--non-interactive", "--stack"])
            .arg(spec.name.fully_qualified());
        self.run_checked("stack select", &invocation, Some(dir), None)
            .await
            .map(|_| ())
    }

    /// Initialise a remote stack from a shallow checkout of its program, so
    /// the engine sees the project it belongs to.
    async fn upsert_remote(&self, spec: &StackSpec, target: RemoteTarget) -> EngineResult<StackHandle> {
        let invocation = Invocation::new(["stack", "init", "--non-interactive"])
            .arg(spec.name.fully_qualified());

        let handle = if self.options.dry_run {
            StackHandle::remote(spec.name.clone(), target)
        } else {
            let checkout = GitCheckout::clone(&target.git).await?;
            let (dir, program_dir) = checkout.into_parts();
            StackHandle::remote(spec.name.clone(), target).with_checkout(program_dir, dir)
        };
        let output = self.run(&invocation, handle.workdir(), None).await?;

        if !output.success() {
            if output.stderr.contains("already exists") {
                debug!("Stack {} already exists, selecting it", spec.name);
            } else {
                return Err(EngineError::CommandFailed {
                    command: format!("{} stack init", self.options.binary),
                    exit_code: output.exit_code,
                    stderr: output.stderr.trim().to_string(),
                });
            }
        }
        Ok(handle)
    }
}

#[async_trait]
impl AutomationEngine for PulumiCli {
    async fn is_available(&self) -> EngineResult<bool> {
        let output = self.run(&Invocation::new(["version"]), None, None).await;
        Ok(output.map(|o| o.success()).unwrap_or(false))
    }

    async fn version(&self) -> EngineResult<String> {
        let output = self
            .run_checked("version", &Invocation::new(["version"]), None, None)
            .await?;
        Ok(output.stdout.trim().to_string())
    }

    async fn upsert_stack(&self, spec: &StackSpec) -> EngineResult<StackHandle> {
        info!("Creating or selecting stack {}", spec.name);

        match (&spec.deployment, &spec.source) {
            (Deployment::Remote { env }, StackSource::Git(git)) => {
                let target = RemoteTarget {
                    git: git.clone(),
                    env: env.clone(),
                };
                self.upsert_remote(spec, target).await
            }
            (Deployment::Remote { .. }, StackSource::Local { dir }) => {
                Err(EngineError::InvalidSource(format!(
                    "remote deployment of {} needs a git source, got local directory {:?}",
                    spec.name, dir
                )))
            }
            (Deployment::Local, StackSource::Local { dir }) => {
                if !self.options.dry_run && !dir.is_dir() {
                    return Err(EngineError::SourceNotFound(format!("{}", dir.display())));
                }
                self.select_local(spec, dir).await?;
                Ok(StackHandle::local(spec.name.clone(), dir.clone()))
            }
            (Deployment::Local, StackSource::Git(git)) => {
                if self.options.dry_run {
                    info!(
                        "[dry-run] git clone --branch {} {} && {}",
                        git.branch,
                        git.url,
                        git.setup_command.join(" ")
                    );
                    return Ok(StackHandle::detached(spec.name.clone()));
                }
                let checkout = GitCheckout::clone(git).await?;
                checkout.run_setup(&git.setup_command).await?;
                self.select_local(spec, checkout.program_dir()).await?;

                let (dir, program_dir) = checkout.into_parts();
                Ok(StackHandle::checked_out(spec.name.clone(), program_dir, dir))
            }
        }
    }

    async fn set_config(
        &self,
        stack: &StackHandle,
        key: &str,
        value: &ConfigValue,
    ) -> EngineResult<()> {
        if stack.is_remote() {
            debug!("Staging {} for remote operations on {}", key, stack.name());
            stack.stage_config(key, value);
            return Ok(());
        }

        debug!("Setting {} on {}", key, stack.name());
        let invocation = Self::config_invocation(stack, key, value);
        self.run_checked("config set", &invocation, stack.workdir(), None)
            .await
            .map(|_| ())
    }

    async fn refresh(
        &self,
        stack: &StackHandle,
        progress: &mut ProgressStreams,
    ) -> EngineResult<OperationResult> {
        self.lifecycle(Operation::Refresh, "refresh", stack, progress)
            .await
    }

    async fn update(
        &self,
        stack: &StackHandle,
        progress: &mut ProgressStreams,
    ) -> EngineResult<OperationResult> {
        self.lifecycle(Operation::Update, "up", stack, progress).await
    }

    async fn destroy(
        &self,
        stack: &StackHandle,
        progress: &mut ProgressStreams,
    ) -> EngineResult<OperationResult> {
        self.lifecycle(Operation::Destroy, "destroy", stack, progress)
            .await
    }

    async fn remove_stack(&self, stack: &StackHandle) -> EngineResult<()> {
        let invocation = Invocation::new(["stack", "rm", "--yes", "--non-interactive", "--stack"])
            .arg(stack.name().fully_qualified());
        let result = self
            .run_checked("stack rm", &invocation, stack.workdir(), None)
            .await;
        if let Err(e) = &result {
            warn!("Failed to remove stack {}: {}", stack.name(), e);
        }
        result.map(|_| ())
    }
}

/// Quote a word for the POSIX shell that runs remote pre-run commands.
fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', "'\\''"))
}
