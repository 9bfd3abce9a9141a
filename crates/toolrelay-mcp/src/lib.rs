pub mod jsonrpc;
pub mod tools;

pub use jsonrpc::{
    Call, ErrorFrame, JsonRpcError, Method, PushEnvelope, RequestEnvelope, RequestParams,
    ResultFrame, SessionAnnouncement,
};
pub use tools::{parse_arguments, Content, ToolDefinition, ToolHandler, ToolOutput, ToolRegistry};
