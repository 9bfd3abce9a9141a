use crate::types::SessionId;

/// Core error type for the toolrelay system.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("push channel closed for session {0}")]
    ChannelClosed(SessionId),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("tool execution failed: {0}")]
    ToolFailed(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Standard JSON-RPC error codes.
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

impl Error {
    /// The JSON-RPC code used when this error is pushed back to a caller.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::MalformedEnvelope(_) => INVALID_REQUEST,
            Self::ToolNotFound(_) => METHOD_NOT_FOUND,
            Self::InvalidArguments(_) => INVALID_PARAMS,
            Self::SessionNotFound(_)
            | Self::ChannelClosed(_)
            | Self::ToolFailed(_)
            | Self::Upstream(_)
            | Self::Internal(_) => INTERNAL_ERROR,
        }
    }
}
