//! # stackflow_config
//!
//! Environment configuration for stackflow.
//!
//! An [`Environment`] describes the region, organization and stack-name suffix
//! shared by every stack, plus one [`Project`] per stack kind. It is read once
//! per run from a YAML file (`config.yaml` by default) and never mutated.
//!
//! ## Example
//!
//! ```rust,no_run
//! use stackflow_config::{ConfigLoader, StackKind};
//!
//! let env = ConfigLoader::load("config.yaml").unwrap();
//! for (kind, project) in env.projects() {
//!     println!("{kind}: {} ({})", project.name, project.branch());
//! }
//! assert!(env.project(StackKind::Base).is_some());
//! ```

pub mod error;
pub mod loader;
pub mod models;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use models::{
    Environment, Project, StackKind, DEFAULT_BRANCH, DEFAULT_CONFIG_FILE, DEFAULT_FORWARD_ENV,
    DEFAULT_SETUP_COMMAND,
};
