//! Error types for the lifecycle driver.

use stackflow_engine::EngineError;
use thiserror::Error;

/// Result type alias for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// A failed stack operation. Each variant names the stack by its nickname.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Error encountered setting up {stack} stack")]
    Setup {
        stack: String,
        #[source]
        source: EngineError,
    },

    #[error("Error encountered setting {key} on {stack} stack")]
    ConfigSet {
        stack: String,
        key: String,
        #[source]
        source: EngineError,
    },

    #[error("Error encountered refreshing {stack} stack")]
    Refresh {
        stack: String,
        #[source]
        source: EngineError,
    },

    #[error("Error encountered updating {stack} stack")]
    Update {
        stack: String,
        #[source]
        source: EngineError,
    },

    #[error("Error encountered deleting {stack} stack")]
    Destroy {
        stack: String,
        #[source]
        source: EngineError,
    },

    #[error("Error encountered removing {stack} stack")]
    Remove {
        stack: String,
        #[source]
        source: EngineError,
    },
}

impl DriverError {
    /// Nickname of the stack the failure happened on.
    pub fn stack(&self) -> &str {
        match self {
            Self::Setup { stack, .. }
            | Self::ConfigSet { stack, .. }
            | Self::Refresh { stack, .. }
            | Self::Update { stack, .. }
            | Self::Destroy { stack, .. }
            | Self::Remove { stack, .. } => stack,
        }
    }
}
