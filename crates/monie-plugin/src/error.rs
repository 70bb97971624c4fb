//! Plugin error types.
//!
//! Defines [`PluginError`], the unified error type for capability loading
//! and invocation. Every variant maps to a stable `errorType` string via
//! [`PluginError::error_type`] so the runtime can report it to the host.

use monie_types::ErrorResponse;
use thiserror::Error;

/// Errors produced by plugin operations.
#[derive(Debug, Error)]
pub enum PluginError {
    /// A module or class could not be loaded (import failure, missing
    /// default export, wrong constructor).
    #[error("plugin load failed: {0}")]
    LoadFailed(String),

    /// Plugin execution failed at runtime.
    #[error("plugin execution failed: {0}")]
    ExecutionFailed(String),

    /// A requested provider, model, tool, strategy or endpoint is not
    /// registered.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was well-formed JSON but semantically invalid.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Credential validation rejected the supplied credentials.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Requested capability or feature is not implemented.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// I/O error during plugin operation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PluginError {
    /// Stable kind name reported as `errorType`.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::LoadFailed(_) => "LoadFailed",
            Self::ExecutionFailed(_) => "ExecutionFailed",
            Self::NotFound(_) => "NotFound",
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::InvalidCredentials(_) => "InvalidCredentials",
            Self::NotImplemented(_) => "NotImplemented",
            Self::Io(_) => "IoError",
            Self::Serialization(_) => "SerializationError",
        }
    }

    /// Convert into the structured error sent to the host.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.error_type(), self.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_load_failed() {
        let err = PluginError::LoadFailed("module ./tools/echo not registered".into());
        assert_eq!(
            err.to_string(),
            "plugin load failed: module ./tools/echo not registered"
        );
    }

    #[test]
    fn error_display_not_found() {
        let err = PluginError::NotFound("tool provider: search".into());
        assert_eq!(err.to_string(), "not found: tool provider: search");
    }

    #[test]
    fn error_display_invalid_credentials() {
        let err = PluginError::InvalidCredentials("api_key is empty".into());
        assert_eq!(err.to_string(), "invalid credentials: api_key is empty");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = PluginError::from(io_err);
        assert!(matches!(err, PluginError::Io(_)));
        assert_eq!(err.error_type(), "IoError");
    }

    #[test]
    fn error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = PluginError::from(json_err);
        assert!(matches!(err, PluginError::Serialization(_)));
        assert_eq!(err.error_type(), "SerializationError");
    }

    #[test]
    fn to_response_carries_kind_and_message() {
        let resp = PluginError::ExecutionFailed("upstream 502".into()).to_response();
        assert_eq!(resp.error_type, "ExecutionFailed");
        assert_eq!(resp.message, "plugin execution failed: upstream 502");
        assert!(resp.args.is_none());
    }
}
