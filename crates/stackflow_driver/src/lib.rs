//! # stackflow_driver
//!
//! Stack lifecycle driver for stackflow.
//!
//! The driver turns an [`Environment`](stackflow_config::Environment) into a
//! fixed sequence of engine calls:
//!
//! 1. create or select every configured stack, in dependency order
//!    (base, platform, data, app);
//! 2. **apply**: for each stack in that order, set its configuration
//!    (including the names of its upstream stacks), refresh, then update;
//! 3. **destroy**: destroy each stack in exactly the reverse order.
//!
//! The first failure stops the run; nothing after it is attempted and nothing
//! already done is rolled back.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use stackflow_config::ConfigLoader;
//! use stackflow_driver::{RunMode, StackDriver};
//! use stackflow_engine::{EngineOptions, PulumiCli};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let env = ConfigLoader::load("config.yaml")?;
//!     let engine = Arc::new(PulumiCli::new(EngineOptions::default()).await?);
//!
//!     let report = StackDriver::new(engine, env).run(RunMode::Apply).await?;
//!     println!("{} operations", report.operations.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod lifecycle;
pub mod report;
pub mod wiring;

pub use error::{DriverError, DriverResult};
pub use lifecycle::{ManagedStack, StackDriver};
pub use report::{OperationRecord, RunMode, RunReport};
pub use wiring::{remote_env_vars, ConfigEntry, StackWiring, REGION_ENV_VAR, REGION_KEY};
