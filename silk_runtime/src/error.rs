use thiserror::Error;

/// Stable error codes carried in the `error.code` field of a response
/// envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    PermissionDenied,
    MethodNotFound,
    InternalError,
    BridgeUnavailable,
    BridgeProtocol,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::MethodNotFound => "METHOD_NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::BridgeUnavailable => "BRIDGE_UNAVAILABLE",
            ErrorCode::BridgeProtocol => "BRIDGE_PROTOCOL",
        }
    }
}

/// A handler failure, converted by the router into an error response.
///
/// Handlers fail by returning this; nothing unwinds across the dispatch
/// thread.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CommandError {
    pub code: ErrorCode,
    pub message: String,
}

impl CommandError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// A plain handler failure, coded `INTERNAL_ERROR`.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }
}
