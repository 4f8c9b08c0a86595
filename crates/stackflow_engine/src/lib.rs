//! # stackflow_engine
//!
//! Wrapper around the external infrastructure-as-code automation engine.
//!
//! The engine owns every piece of real provisioning work: state storage,
//! diffing, planning and locking. This crate only knows how to ask it to
//! create or select a stack, set configuration on it, and refresh, update or
//! destroy it, streaming the engine's progress output to any number of sinks.
//!
//! # Features
//!
//! - **Engine trait**: [`AutomationEngine`] is the seam the lifecycle driver calls
//! - **Pulumi CLI**: [`PulumiCli`] drives the `pulumi` binary for local, git and remote-deployment sources
//! - **Git sources**: shallow clones into a temporary workspace plus an optional setup command
//! - **Progress streams**: tee engine output to the console and a per-operation log file
//! - **Dry-run mode**: log engine commands without executing them
//! - **Mock engine**: records calls and injects failures for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use stackflow_engine::{
//!     AutomationEngine, EngineOptions, ProgressStreams, PulumiCli, StackName, StackSpec,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = PulumiCli::new(EngineOptions::default()).await?;
//!
//!     let spec = StackSpec::local(StackName::new("acme", "base", "dev"), "../base");
//!     let stack = engine.upsert_stack(&spec).await?;
//!
//!     let mut progress = ProgressStreams::stdout();
//!     let result = engine.refresh(&stack, &mut progress).await?;
//!     println!("refresh took {}ms", result.duration_ms);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod git;
pub mod mock;
pub mod progress;
pub mod pulumi;

pub use config::{
    ConfigValue, Deployment, EngineOptions, EnvVarValue, GitSource, StackSource, StackSpec,
};
pub use engine::{
    AutomationEngine, Operation, OperationResult, RemoteTarget, StackHandle, StackName,
};
pub use error::{EngineError, EngineResult};
pub use git::GitCheckout;
pub use mock::{CapturedCall, MockEngine};
pub use progress::{MemorySink, ProgressStreams};
pub use pulumi::PulumiCli;
