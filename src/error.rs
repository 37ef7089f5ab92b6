//! A2A error types — JSON-RPC error codes + A2A-specific errors.
//!
//! One variant per protocol error, plus client-side transport/timeout/JSON
//! variants, a `.code()` method mapping every variant to a JSON-RPC error
//! code, and `impl From<A2AError> for JsonRpcError`.
//!
//! The protocol error taxonomy is deliberately narrow: only the five codes
//! this runtime's JSON-RPC surface actually produces (`-32700`, `-32601`,
//! `-32602`, `-32000`, `-32001`). There is no push-notification or
//! extended-card feature here, so there are no codes for them either.

use crate::types::JsonRpcError;

// ---------------------------------------------------------------------------
// JSON-RPC error codes
// ---------------------------------------------------------------------------

/// Invalid JSON was received by the server.
pub const PARSE_ERROR: i64 = -32700;

/// The method does not exist, or the peer lacks the required capability
/// (e.g. a `message/stream` call against a non-streaming conversation).
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Invalid method parameter(s).
pub const INVALID_PARAMS: i64 = -32602;

/// Internal error: conversation-opener failure, or a task-store failure
/// encountered before a task exists to hold it.
pub const INTERNAL_ERROR: i64 = -32000;

/// The requested task was not found.
pub const TASK_NOT_FOUND: i64 = -32001;

// ---------------------------------------------------------------------------
// A2AError enum
// ---------------------------------------------------------------------------

/// Unified error type for all A2A and JSON-RPC errors.
///
/// Each protocol-side variant carries a human-readable message and an
/// optional structured `data` payload. Client/transport-side variants are
/// not part of the A2A protocol error taxonomy but round out the type as a
/// single error enum for the whole crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum A2AError {
    /// Invalid JSON payload (code -32700). No `id` is echoed for this error,
    /// since the request couldn't be parsed far enough to find one.
    #[error("Parse error: {message}")]
    ParseError {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Method not found, or an advertised capability is missing (code -32601).
    #[error("Method not found: {message}")]
    MethodNotFound {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Invalid parameters (code -32602).
    #[error("Invalid params: {message}")]
    InvalidParams {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Internal error (code -32000): conversation-opener failure, or a
    /// task-store error surfaced before any task exists to absorb it.
    #[error("Internal error: {message}")]
    InternalError {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Task not found (code -32001).
    #[error("Task not found: {message}")]
    TaskNotFound {
        message: String,
        data: Option<serde_json::Value>,
    },

    // -- Client/transport-side errors (not A2A protocol error codes) --
    /// Transport-level error (connection failed, request failed, etc.).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request or stream timed out.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// HTTP error with status code and response body.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Invalid JSON received from remote (parse or deserialization failure).
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// A JSON-RPC error response was received from the remote agent. Kept
    /// distinct from transport errors so callers can branch on it
    /// (`matches!(err, A2AError::JsonRpc { .. })`).
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Catch-all for errors that don't fit other categories.
    #[error("{0}")]
    Other(String),
}

/// Convenience result type for A2A operations.
pub type A2AResult<T> = Result<T, A2AError>;

impl A2AError {
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self::MethodNotFound {
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
            data: None,
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
            data: None,
        }
    }

    pub fn task_not_found(message: impl Into<String>) -> Self {
        Self::TaskNotFound {
            message: message.into(),
            data: None,
        }
    }

    /// Returns the JSON-RPC error code for this error variant.
    ///
    /// Client-side transport errors have no protocol code; they map to
    /// `INTERNAL_ERROR` so a `JsonRpcError` can always be constructed, but
    /// callers should generally branch on the `A2AError` variant itself
    /// rather than on this code for client-side errors.
    pub fn code(&self) -> i64 {
        match self {
            A2AError::ParseError { .. } => PARSE_ERROR,
            A2AError::MethodNotFound { .. } => METHOD_NOT_FOUND,
            A2AError::InvalidParams { .. } => INVALID_PARAMS,
            A2AError::InternalError { .. } => INTERNAL_ERROR,
            A2AError::TaskNotFound { .. } => TASK_NOT_FOUND,
            A2AError::Transport(_)
            | A2AError::Timeout(_)
            | A2AError::Http { .. }
            | A2AError::InvalidJson(_)
            | A2AError::Other(_) => INTERNAL_ERROR,
            A2AError::JsonRpc { code, .. } => *code,
        }
    }
}

impl From<A2AError> for JsonRpcError {
    fn from(err: A2AError) -> Self {
        let code = err.code();
        let message = err.to_string();
        let data = match &err {
            A2AError::ParseError { data, .. }
            | A2AError::MethodNotFound { data, .. }
            | A2AError::InvalidParams { data, .. }
            | A2AError::InternalError { data, .. }
            | A2AError::TaskNotFound { data, .. }
            | A2AError::JsonRpc { data, .. } => data.clone(),
            _ => None,
        };
        JsonRpcError {
            code,
            message,
            data,
        }
    }
}

impl From<serde_json::Error> for A2AError {
    fn from(err: serde_json::Error) -> Self {
        A2AError::ParseError {
            message: err.to_string(),
            data: None,
        }
    }
}

/// Errors the task store surfaces to the server before they are translated
/// into [`A2AError`]s at the JSON-RPC boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TaskStoreError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("task already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("task is in a terminal state: {state}")]
    Terminal { state: String },
}

impl From<TaskStoreError> for A2AError {
    fn from(err: TaskStoreError) -> Self {
        match err {
            TaskStoreError::NotFound(id) => A2AError::task_not_found(id),
            // AlreadyExists/InvalidTransition/Terminal have no more specific
            // protocol code — they surface as internal errors.
            other => A2AError::internal_error(other.to_string()),
        }
    }
}
