use std::sync::Arc;

use tokio::task::JoinHandle;

use toolrelay_core::{Error, MessageId};
use toolrelay_mcp::jsonrpc::INTERNAL_ERROR;
use toolrelay_mcp::{Call, PushEnvelope, ToolRegistry};

use crate::session::PushChannel;

/// Run `call` in the background and push exactly one tagged frame with its
/// outcome onto `channel`.
pub fn spawn(
    tools: Arc<ToolRegistry>,
    channel: PushChannel,
    id: MessageId,
    call: Call,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let envelope = execute(tools, id.clone(), call).await;
        if !channel.send(envelope).await {
            tracing::warn!(message_id = %id, "push channel closed, reply dropped");
        }
    })
}

/// Produce the reply frame for one call.
///
/// Handler failures, including panics, become error frames carrying `id`.
pub async fn execute(tools: Arc<ToolRegistry>, id: MessageId, call: Call) -> PushEnvelope {
    match call {
        Call::List => PushEnvelope::result(
            id,
            serde_json::json!({ "tools": tools.definitions() }),
        ),
        Call::Invoke { name, arguments } => {
            tracing::debug!(message_id = %id, tool = %name, "dispatching tool call");

            let tool = name.clone();
            let outcome = tokio::spawn(async move { tools.call(&tool, arguments).await }).await;

            match outcome {
                Ok(Ok(output)) => match serde_json::to_value(&output) {
                    Ok(result) => PushEnvelope::result(id, result),
                    Err(e) => PushEnvelope::from_error(id, &Error::Internal(e.to_string())),
                },
                Ok(Err(err)) => {
                    tracing::debug!(message_id = %id, tool = %name, error = %err, "tool call failed");
                    PushEnvelope::from_error(id, &err)
                }
                Err(join_err) => {
                    tracing::error!(message_id = %id, tool = %name, "tool task aborted: {join_err}");
                    PushEnvelope::error(id, INTERNAL_ERROR, format!("tool '{name}' panicked"))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use toolrelay_mcp::jsonrpc::{INVALID_PARAMS, METHOD_NOT_FOUND};
    use toolrelay_mcp::ToolOutput;

    use super::*;

    fn tools() -> Arc<ToolRegistry> {
        let mut tools = ToolRegistry::new();
        tools
            .register("ok", "Succeeds.", serde_json::json!({}), |_args: Value| async {
                Ok::<_, Error>(ToolOutput::text("done"))
            })
            .register("bad_args", "Rejects.", serde_json::json!({}), |_args: Value| async {
                Err::<ToolOutput, _>(Error::InvalidArguments("nope".to_string()))
            })
            .register("panics", "Panics.", serde_json::json!({}), |args: Value| async move {
                if args.is_object() {
                    panic!("handler blew up");
                }
                Ok::<_, Error>(ToolOutput::default())
            });
        Arc::new(tools)
    }

    fn invoke(name: &str) -> Call {
        Call::Invoke {
            name: name.to_string(),
            arguments: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn success_becomes_result_frame() {
        let frame = execute(tools(), MessageId::from("m1"), invoke("ok")).await;
        let PushEnvelope::Result(frame) = frame else {
            panic!("expected result frame");
        };
        assert_eq!(frame.id, MessageId::from("m1"));
        assert_eq!(frame.result["content"][0]["text"], "done");
    }

    #[tokio::test]
    async fn handler_error_becomes_error_frame() {
        let frame = execute(tools(), MessageId::from("m2"), invoke("bad_args")).await;
        let PushEnvelope::Error(frame) = frame else {
            panic!("expected error frame");
        };
        assert_eq!(frame.id, MessageId::from("m2"));
        assert_eq!(frame.error.code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_frame() {
        let frame = execute(tools(), MessageId::from("m3"), invoke("missing")).await;
        let PushEnvelope::Error(frame) = frame else {
            panic!("expected error frame");
        };
        assert_eq!(frame.error.code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn panic_becomes_error_frame() {
        let frame = execute(tools(), MessageId::from("m4"), invoke("panics")).await;
        let PushEnvelope::Error(frame) = frame else {
            panic!("expected error frame");
        };
        assert_eq!(frame.id, MessageId::from("m4"));
        assert_eq!(frame.error.code, INTERNAL_ERROR);
    }

    #[tokio::test]
    async fn list_returns_definitions() {
        let frame = execute(tools(), MessageId::from("m5"), Call::List).await;
        let PushEnvelope::Result(frame) = frame else {
            panic!("expected result frame");
        };
        assert_eq!(frame.result["tools"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn spawn_pushes_exactly_one_frame() {
        let (channel, mut rx) = PushChannel::new();
        spawn(tools(), channel, MessageId::from("m6"), invoke("ok"))
            .await
            .unwrap();

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.message_id(), Some(&MessageId::from("m6")));
        // The only sender was moved into the task, so the channel is now drained and closed.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn spawn_tolerates_closed_channel() {
        let (channel, rx) = PushChannel::new();
        drop(rx);
        spawn(tools(), channel, MessageId::from("m7"), invoke("ok"))
            .await
            .unwrap();
    }
}
