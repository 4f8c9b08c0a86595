//! Mock automation engine for testing.
//!
//! Records every call in order and returns canned results, so lifecycle
//! sequencing can be verified without a real engine or cloud account.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::config::{ConfigValue, StackSpec};
use crate::engine::{AutomationEngine, Operation, OperationResult, StackHandle, StackName};
use crate::error::{EngineError, EngineResult};
use crate::progress::ProgressStreams;

/// Captured call information for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedCall {
    pub operation: Operation,
    /// Fully qualified stack name
    pub stack: String,
    /// Config key, for `set_config`
    pub key: Option<String>,
    /// Config value, for `set_config`
    pub value: Option<ConfigValue>,
    /// Whether the stack was set up for remote deployment, for `upsert`
    pub remote: bool,
}

impl CapturedCall {
    fn new(operation: Operation, stack: &StackName) -> Self {
        Self {
            operation,
            stack: stack.fully_qualified(),
            key: None,
            value: None,
            remote: false,
        }
    }

    /// Project segment of the stack name.
    pub fn project(&self) -> &str {
        self.stack.split('/').nth(1).unwrap_or_default()
    }
}

/// A failure to inject: the first call matching operation and project fails.
#[derive(Debug, Clone)]
struct InjectedFailure {
    operation: Operation,
    project: String,
    message: String,
}

/// Mock automation engine.
#[derive(Clone)]
pub struct MockEngine {
    available: Arc<RwLock<bool>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    failures: Arc<RwLock<Vec<InjectedFailure>>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            available: Arc::new(RwLock::new(true)),
            captured_calls: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Set whether the engine is available.
    pub fn set_available(self, available: bool) -> Self {
        *self.available.write() = available;
        self
    }

    /// Fail `operation` on the stack whose project segment is `project`.
    pub fn fail_on(self, operation: Operation, project: impl Into<String>) -> Self {
        let project = project.into();
        self.failures.write().push(InjectedFailure {
            operation,
            message: format!("simulated {} failure for {}", operation, project),
            project,
        });
        self
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Check if an operation was called at all.
    pub fn was_called(&self, operation: Operation) -> bool {
        self.captured_calls
            .read()
            .iter()
            .any(|c| c.operation == operation)
    }

    /// Get calls of a specific operation.
    pub fn get_operation_calls(&self, operation: Operation) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.operation == operation)
            .cloned()
            .collect()
    }

    /// `(operation, project)` pairs in call order.
    pub fn sequence(&self) -> Vec<(Operation, String)> {
        self.captured_calls
            .read()
            .iter()
            .map(|c| (c.operation, c.project().to_string()))
            .collect()
    }

    /// Config entries set on a project, in call order.
    pub fn config_for(&self, project: &str) -> Vec<(String, ConfigValue)> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.operation == Operation::SetConfig && c.project() == project)
            .filter_map(|c| Some((c.key.clone()?, c.value.clone()?)))
            .collect()
    }

    fn record(&self, call: CapturedCall) -> EngineResult<()> {
        let operation = call.operation;
        let project = call.project().to_string();
        self.captured_calls.write().push(call);

        let failure = self
            .failures
            .read()
            .iter()
            .find(|f| f.operation == operation && f.project == project)
            .cloned();
        match failure {
            Some(f) => Err(EngineError::ExecutionFailed(f.message)),
            None => Ok(()),
        }
    }

    fn lifecycle(
        &self,
        operation: Operation,
        stack: &StackHandle,
        progress: &mut ProgressStreams,
    ) -> EngineResult<OperationResult> {
        let started_at = Utc::now();
        self.record(CapturedCall::new(operation, stack.name()))?;

        let output = format!("mock {} of {}\n", operation, stack.name());
        progress.write_all(output.as_bytes())?;
        progress.flush()?;
        Ok(OperationResult::new(operation, stack.name(), output, started_at))
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AutomationEngine for MockEngine {
    async fn is_available(&self) -> EngineResult<bool> {
        Ok(*self.available.read())
    }

    async fn version(&self) -> EngineResult<String> {
        Ok("mock-engine 1.0.0".to_string())
    }

    async fn upsert_stack(&self, spec: &StackSpec) -> EngineResult<StackHandle> {
        let mut call = CapturedCall::new(Operation::Upsert, &spec.name);
        call.remote = spec.is_remote();
        self.record(call)?;
        Ok(StackHandle::detached(spec.name.clone()))
    }

    async fn set_config(
        &self,
        stack: &StackHandle,
        key: &str,
        value: &ConfigValue,
    ) -> EngineResult<()> {
        let mut call = CapturedCall::new(Operation::SetConfig, stack.name());
        call.key = Some(key.to_string());
        call.value = Some(value.clone());
        self.record(call)
    }

    async fn refresh(
        &self,
        stack: &StackHandle,
        progress: &mut ProgressStreams,
    ) -> EngineResult<OperationResult> {
        self.lifecycle(Operation::Refresh, stack, progress)
    }

    async fn update(
        &self,
        stack: &StackHandle,
        progress: &mut ProgressStreams,
    ) -> EngineResult<OperationResult> {
        self.lifecycle(Operation::Update, stack, progress)
    }

    async fn destroy(
        &self,
        stack: &StackHandle,
        progress: &mut ProgressStreams,
    ) -> EngineResult<OperationResult> {
        self.lifecycle(Operation::Destroy, stack, progress)
    }

    async fn remove_stack(&self, stack: &StackHandle) -> EngineResult<()> {
        self.record(CapturedCall::new(Operation::Remove, stack.name()))
    }
}
