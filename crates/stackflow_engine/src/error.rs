//! Error types for the engine module.

use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while driving the automation engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine not available: {0}")]
    NotAvailable(String),

    #[error("Failed to spawn {binary}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with status {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Stack source not found: {0}")]
    SourceNotFound(String),

    #[error("Invalid stack source: {0}")]
    InvalidSource(String),

    #[error("Git checkout failed: {0}")]
    Git(String),

    #[error("Workspace setup failed: {0}")]
    SetupFailed(String),

    #[error("Engine execution failed: {0}")]
    ExecutionFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
