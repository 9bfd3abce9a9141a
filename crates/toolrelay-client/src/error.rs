use toolrelay_core::MessageId;

/// Errors surfaced to callers of [`crate::Client`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("push channel closed")]
    ChannelClosed,

    #[error("push channel error: {0}")]
    Stream(String),

    #[error("message id {0} is already outstanding")]
    DuplicateMessageId(MessageId),

    #[error("call {0} timed out")]
    Timeout(MessageId),

    #[error("remote error {code}: {message}")]
    Remote { code: i32, message: String },

    #[error("invalid reply: {0}")]
    Decode(String),
}
