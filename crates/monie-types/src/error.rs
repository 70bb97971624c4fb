//! Structured error payload reported to the host.

use serde::{Deserialize, Serialize};

/// Error kinds raised by the runtime itself (as opposed to plugin errors,
/// which carry their own kind name).
pub mod kind {
    /// The request payload did not match the route's request shape.
    pub const DECODE_ERROR: &str = "DecodeError";
    /// No registered route accepted the request.
    pub const ROUTE_NOT_FOUND: &str = "RouteNotFound";
    /// A handler panicked.
    pub const PANIC_ERROR: &str = "PanicError";
    /// The CPU worker pool failed to run the task.
    pub const WORKER_ERROR: &str = "WorkerError";
}

/// A structured error frame body: `{errorType, message, args?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Machine-readable error kind (e.g. `"DecodeError"`, `"NotFound"`).
    pub error_type: String,

    /// Human-readable description.
    pub message: String,

    /// Optional structured arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ErrorResponse {
    /// Create an error response with no extra arguments.
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            args: None,
        }
    }

    /// Attach a structured argument.
    pub fn with_arg(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.args
            .get_or_insert_with(serde_json::Map::new)
            .insert(key.into(), value);
        self
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}
