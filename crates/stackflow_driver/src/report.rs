//! Run modes and execution reports.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use stackflow_config::StackKind;
use stackflow_engine::Operation;

/// What a run does to the stacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Set config, refresh and update every stack
    #[default]
    Apply,
    /// Destroy every stack in reverse order
    Destroy,
}

impl RunMode {
    /// `destroy` selects [`RunMode::Destroy`]; anything else, or nothing, applies.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            Some("destroy") => Self::Destroy,
            _ => Self::Apply,
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Apply => write!(f, "apply"),
            Self::Destroy => write!(f, "destroy"),
        }
    }
}

/// One completed engine call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub operation: Operation,
    pub kind: StackKind,
    /// Fully qualified stack name
    pub stack: String,
    pub nickname: String,
    /// Config key, for `set_config`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub duration_ms: u64,
    /// Progress log written during the call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

/// Everything a successful run did, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub operations: Vec<OperationRecord>,
}

impl RunReport {
    pub fn new(mode: RunMode) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            mode,
            started_at: Utc::now(),
            finished_at: None,
            operations: Vec::new(),
        }
    }

    pub fn record(&mut self, record: OperationRecord) {
        self.operations.push(record);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Records of one operation type, in order.
    pub fn operations_of(&self, operation: Operation) -> Vec<&OperationRecord> {
        self.operations
            .iter()
            .filter(|r| r.operation == operation)
            .collect()
    }

    /// Progress log files written during the run.
    pub fn log_files(&self) -> Vec<&Path> {
        self.operations
            .iter()
            .filter_map(|r| r.log_file.as_deref())
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        debug!("Saved run report to {:?}", path);
        Ok(())
    }
}
