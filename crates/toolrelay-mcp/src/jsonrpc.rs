use serde::{Deserialize, Serialize};
use serde_json::Value;

use toolrelay_core::{Error, MessageId, SessionId};

pub use toolrelay_core::error::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};

pub const JSONRPC_VERSION: &str = "2.0";

/// Method name of the first frame on every push channel.
pub const SESSION_NOTIFICATION: &str = "notifications/session";

/// Methods accepted on the request channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "tools/call")]
    ToolsCall,
    #[serde(rename = "tools/list")]
    ToolsList,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ToolsCall => f.write_str("tools/call"),
            Self::ToolsList => f.write_str("tools/list"),
        }
    }
}

/// Parameters of a request envelope. `sessionId` travels alongside the tool
/// name and arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    #[serde(
        rename = "sessionId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<SessionId>,
}

/// A JSON-RPC 2.0 request posted to the request channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub jsonrpc: String,
    pub method: Method,
    #[serde(default)]
    pub params: RequestParams,
    pub id: MessageId,
}

/// A validated request, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List,
    Invoke { name: String, arguments: Value },
}

impl RequestEnvelope {
    /// Build a `tools/call` envelope.
    pub fn tools_call(
        session_id: SessionId,
        id: MessageId,
        name: impl Into<String>,
        arguments: Value,
    ) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: Method::ToolsCall,
            params: RequestParams {
                name: Some(name.into()),
                arguments: Some(arguments),
                session_id: Some(session_id),
            },
            id,
        }
    }

    /// Build a `tools/list` envelope.
    pub fn tools_list(session_id: SessionId, id: MessageId) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: Method::ToolsList,
            params: RequestParams {
                session_id: Some(session_id),
                ..RequestParams::default()
            },
            id,
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.params.session_id.as_ref()
    }

    /// Check the envelope shape and extract the call it describes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedEnvelope`] for a wrong protocol version or a
    /// `tools/call` without a tool name.
    pub fn validate(&self) -> Result<Call, Error> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Err(Error::MalformedEnvelope(format!(
                "unsupported jsonrpc version '{}'",
                self.jsonrpc
            )));
        }

        match self.method {
            Method::ToolsList => Ok(Call::List),
            Method::ToolsCall => {
                let name = self
                    .params
                    .name
                    .as_deref()
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| Error::MalformedEnvelope("missing params.name".to_string()))?;
                let arguments = self
                    .params
                    .arguments
                    .clone()
                    .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
                Ok(Call::Invoke {
                    name: name.to_string(),
                    arguments,
                })
            }
        }
    }
}

/// Parameters of the session announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionParams {
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
}

/// First frame on a push channel: carries the session id, no message id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAnnouncement {
    pub jsonrpc: String,
    pub method: String,
    pub params: SessionParams,
}

/// Successful reply to a call, tagged with its message id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResultFrame {
    pub jsonrpc: String,
    pub id: MessageId,
    pub result: Value,
}

/// Failed reply to a call, tagged with its message id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorFrame {
    pub jsonrpc: String,
    pub id: MessageId,
    pub error: JsonRpcError,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Everything the server may write to a push channel.
///
/// Exactly one variant matches any well-formed frame; a frame carrying both
/// `result` and `error` matches none and fails to parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PushEnvelope {
    Session(SessionAnnouncement),
    Result(ResultFrame),
    Error(ErrorFrame),
}

impl PushEnvelope {
    pub fn session(session_id: SessionId) -> Self {
        Self::Session(SessionAnnouncement {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: SESSION_NOTIFICATION.to_string(),
            params: SessionParams { session_id },
        })
    }

    pub fn result(id: MessageId, result: Value) -> Self {
        Self::Result(ResultFrame {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result,
        })
    }

    pub fn error(id: MessageId, code: i32, message: impl Into<String>) -> Self {
        Self::Error(ErrorFrame {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            error: JsonRpcError {
                code,
                message: message.into(),
                data: None,
            },
        })
    }

    /// Error frame for a failure raised while dispatching a call.
    pub fn from_error(id: MessageId, err: &Error) -> Self {
        Self::error(id, err.code(), err.to_string())
    }

    /// Message id of a tagged frame; `None` for the session announcement.
    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            Self::Session(_) => None,
            Self::Result(frame) => Some(&frame.id),
            Self::Error(frame) => Some(&frame.id),
        }
    }
}
