//! Runtime error types.

use thiserror::Error;

use monie_plugin::PluginError;

/// Errors produced by the runtime in this crate.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Underlying I/O error on the protocol stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame writer has been closed.
    #[error("writer closed")]
    WriterClosed,

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The CPU worker pool failed to build or to run a task.
    #[error("worker pool error: {0}")]
    Pool(String),

    /// Plugin loading failed.
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// `start` was called on a server that already ran.
    #[error("server already started")]
    AlreadyStarted,
}

/// Convenience alias for results in this crate.
pub type Result<T> = std::result::Result<T, RuntimeError>;
