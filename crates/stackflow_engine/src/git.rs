//! Git checkouts for stacks whose programs live in a remote repository.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;

use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::GitSource;
use crate::error::{EngineError, EngineResult};

/// A shallow clone of a single branch in a temporary directory.
///
/// The directory is removed when the checkout is dropped.
#[derive(Debug)]
pub struct GitCheckout {
    dir: TempDir,
    program_dir: PathBuf,
}

impl GitCheckout {
    /// Check if Git is available on the system.
    pub async fn is_git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Clone `source` and locate its program directory.
    pub async fn clone(source: &GitSource) -> EngineResult<Self> {
        let subpath = validate_subpath(source.subpath.as_deref())?;
        if !Self::is_git_available().await {
            return Err(EngineError::Git(format!(
                "git is required to check out {} but could not be run",
                source.url
            )));
        }

        let dir = tempfile::Builder::new().prefix("stackflow-src-").tempdir()?;
        info!(
            "Cloning {} (branch {}) into {:?}",
            source.url,
            source.branch,
            dir.path()
        );

        let output = Command::new("git")
            .args(["clone", "--depth", "1", "--single-branch", "--branch"])
            .arg(&source.branch)
            .arg("--")
            .arg(&source.url)
            .arg(dir.path())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| EngineError::Git(format!("Failed to run git clone: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Git(format!(
                "git clone of {} failed: {}",
                source.url,
                stderr.trim()
            )));
        }

        let program_dir = match subpath {
            Some(sub) => dir.path().join(sub),
            None => dir.path().to_path_buf(),
        };
        if !program_dir.is_dir() {
            return Err(EngineError::SourceNotFound(format!(
                "{} has no directory {:?}",
                source.url,
                source.subpath.as_deref().unwrap_or_default()
            )));
        }

        Ok(Self { dir, program_dir })
    }

    /// Directory holding the stack's program.
    pub fn program_dir(&self) -> &Path {
        &self.program_dir
    }

    /// Run the workspace setup command (e.g. `npm install`) in the program directory.
    pub async fn run_setup(&self, command: &[String]) -> EngineResult<()> {
        run_setup_in(&self.program_dir, command).await
    }

    /// Split into the temporary directory and program path.
    pub fn into_parts(self) -> (TempDir, PathBuf) {
        (self.dir, self.program_dir)
    }
}

/// Run a setup command in `dir`. An empty command does nothing.
async fn run_setup_in(dir: &Path, command: &[String]) -> EngineResult<()> {
    let Some((program, args)) = command.split_first() else {
        debug!("No setup command configured");
        return Ok(());
    };

    info!("Running setup `{}` in {:?}", command.join(" "), dir);
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| EngineError::SetupFailed(format!("Failed to run {}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EngineError::SetupFailed(format!(
            "`{}` exited with {}: {}",
            command.join(" "),
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

/// Reject subpaths that would escape the clone.
fn validate_subpath(subpath: Option<&str>) -> EngineResult<Option<&Path>> {
    let Some(sub) = subpath.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let path = Path::new(sub);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(EngineError::InvalidSource(format!(
            "project path must be relative to the repository root: {}",
            sub
        )));
    }
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_subpath() {
        assert_eq!(validate_subpath(None).unwrap(), None);
        assert_eq!(validate_subpath(Some("  ")).unwrap(), None);
        assert_eq!(
            validate_subpath(Some("infra/base")).unwrap(),
            Some(Path::new("infra/base"))
        );
        assert!(validate_subpath(Some("../outside")).is_err());
        assert!(validate_subpath(Some("/etc")).is_err());
    }

    #[tokio::test]
    async fn test_empty_setup_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        run_setup_in(dir.path(), &[]).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_setup_failure_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = vec!["sh".to_string(), "-c".to_string(), "echo nope >&2; exit 2".to_string()];
        let err = run_setup_in(dir.path(), &cmd).await.unwrap_err();
        assert!(matches!(err, EngineError::SetupFailed(ref m) if m.contains("nope")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_setup_runs_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = vec!["sh".to_string(), "-c".to_string(), "touch installed".to_string()];
        run_setup_in(dir.path(), &cmd).await.unwrap();
        assert!(dir.path().join("installed").exists());
    }
}
