use std::sync::Arc;
use std::time::Duration;

use reqwest_eventsource::{Event, EventSource, RequestBuilderExt};
use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

use toolrelay_core::{MessageId, SessionId};
use toolrelay_mcp::{PushEnvelope, RequestEnvelope, ToolDefinition, ToolOutput};

use crate::error::ClientError;
use crate::pending::{CallOutcome, PendingCalls};

/// Client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Path of the push channel, relative to the base URL.
    pub sse_path: String,
    /// Path of the request channel, relative to the base URL.
    pub messages_path: String,
    /// Give up on a [`Client::call`] after this long. `None` waits until the
    /// reply arrives or the channel closes.
    pub call_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            sse_path: "/sse".to_string(),
            messages_path: "/messages".to_string(),
            call_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Lifecycle of a client's push-channel subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Subscribed, session id not announced yet.
    Connecting,
    /// Session id received; calls may be sent.
    Ready(SessionId),
    /// Subscription ended. Terminal.
    Closed,
}

/// State shared between the client handle and its reader task.
#[derive(Debug)]
struct Shared {
    pending: PendingCalls,
    state: watch::Sender<ConnectionState>,
}

impl Shared {
    fn new() -> Self {
        Self {
            pending: PendingCalls::new(),
            state: watch::Sender::new(ConnectionState::Connecting),
        }
    }

    /// Route one push-channel frame.
    fn handle_frame(&self, data: &str) {
        let envelope: PushEnvelope = match serde_json::from_str(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("discarding malformed frame: {e}");
                return;
            }
        };

        match envelope {
            PushEnvelope::Session(announcement) => {
                let session_id = announcement.params.session_id;
                let accepted = self.state.send_if_modified(|state| {
                    if *state == ConnectionState::Connecting {
                        *state = ConnectionState::Ready(session_id.clone());
                        true
                    } else {
                        false
                    }
                });
                if accepted {
                    tracing::info!(session_id = %session_id, "session ready");
                } else {
                    tracing::warn!(session_id = %session_id, "ignoring repeated session announcement");
                }
            }
            PushEnvelope::Result(frame) => self.deliver(&frame.id, Ok(frame.result)),
            PushEnvelope::Error(frame) => self.deliver(
                &frame.id,
                Err(ClientError::Remote {
                    code: frame.error.code,
                    message: frame.error.message,
                }),
            ),
        }
    }

    fn deliver(&self, id: &MessageId, outcome: CallOutcome) {
        if !self.pending.resolve(id, outcome) {
            tracing::warn!(message_id = %id, "discarding reply for unknown message id");
        }
    }

    /// Move to `Closed` and reject everything still pending.
    fn shutdown(&self) {
        self.state.send_replace(ConnectionState::Closed);
        let failed = self.pending.fail_all();
        if failed > 0 {
            tracing::info!(failed, "rejected pending calls on close");
        }
    }

    fn is_closed(&self) -> bool {
        *self.state.borrow() == ConnectionState::Closed
    }
}

/// Handle to a call whose reply has not arrived yet.
#[derive(Debug)]
pub struct PendingReply {
    id: MessageId,
    rx: oneshot::Receiver<CallOutcome>,
}

impl PendingReply {
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// Wait for the reply's `result` payload.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`] for an error frame and
    /// [`ClientError::ChannelClosed`] if the client closed first.
    pub async fn wait(self) -> CallOutcome {
        self.rx.await.unwrap_or(Err(ClientError::ChannelClosed))
    }

    /// Run `callback` once with the outcome, on a background task.
    pub fn on_complete<F>(self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(MessageId, CallOutcome) + Send + 'static,
    {
        tokio::spawn(async move {
            let id = self.id.clone();
            let outcome = self.wait().await;
            callback(id, outcome);
        })
    }
}

/// Client correlator for one push-channel subscription.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    config: ClientConfig,
    shared: Arc<Shared>,
    reader: JoinHandle<()>,
}

impl Client {
    /// Subscribe to the push channel at `base_url`.
    ///
    /// Returns as soon as the subscription task is running; use
    /// [`Client::wait_ready`] to wait for the session id. Calls wait for it
    /// on their own.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Stream`] if the subscription request cannot be built.
    #[allow(clippy::unused_async)]
    pub async fn connect(base_url: &str, config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::new();
        let base_url = base_url.trim_end_matches('/').to_string();
        let sse_url = format!("{base_url}{}", config.sse_path);
        tracing::info!("connecting to push channel: {sse_url}");

        let events = http
            .get(&sse_url)
            .eventsource()
            .map_err(|e| ClientError::Stream(e.to_string()))?;

        let shared = Arc::new(Shared::new());
        let reader = tokio::spawn(read_events(events, Arc::clone(&shared)));

        Ok(Self {
            http,
            base_url,
            config,
            shared,
            reader,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.borrow().clone()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        match &*self.shared.state.borrow() {
            ConnectionState::Ready(id) => Some(id.clone()),
            _ => None,
        }
    }

    /// Number of calls still waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    /// Wait until the session id has been announced.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ChannelClosed`] if the subscription ends first.
    pub async fn wait_ready(&self) -> Result<SessionId, ClientError> {
        let mut rx = self.shared.state.subscribe();
        let state = rx
            .wait_for(|state| *state != ConnectionState::Connecting)
            .await
            .map_err(|_| ClientError::ChannelClosed)?;
        match &*state {
            ConnectionState::Ready(id) => Ok(id.clone()),
            _ => Err(ClientError::ChannelClosed),
        }
    }

    /// Send a `tools/call` tagged with `message_id` and return a handle to
    /// its reply.
    ///
    /// # Errors
    ///
    /// Fails without leaving a pending entry if the id is already outstanding,
    /// the client is closed, or the request channel rejects the envelope.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Value,
        message_id: MessageId,
    ) -> Result<PendingReply, ClientError> {
        self.submit(message_id, |session, id| {
            RequestEnvelope::tools_call(session, id, name, arguments)
        })
        .await
    }

    /// Call a tool and wait for its output.
    ///
    /// # Errors
    ///
    /// Any error from [`Client::invoke`], the remote error of an error
    /// frame, [`ClientError::Timeout`], or [`ClientError::Decode`] for a
    /// result that is not tool output.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<ToolOutput, ClientError> {
        let reply = self.invoke(name, arguments, MessageId::new()).await?;
        let result = self.await_reply(reply).await?;
        serde_json::from_value(result).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// List the tools the server exposes.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Client::call`].
    pub async fn fetch_tools(&self) -> Result<Vec<ToolDefinition>, ClientError> {
        let reply = self
            .submit(MessageId::new(), RequestEnvelope::tools_list)
            .await?;
        decode_tools(self.await_reply(reply).await?)
    }

    /// End the subscription. Calls still pending are rejected with
    /// [`ClientError::ChannelClosed`].
    pub fn close(&self) {
        self.reader.abort();
        self.shared.shutdown();
    }

    async fn submit<F>(&self, message_id: MessageId, build: F) -> Result<PendingReply, ClientError>
    where
        F: FnOnce(SessionId, MessageId) -> RequestEnvelope,
    {
        let session_id = self.wait_ready().await?;
        let rx = self.shared.pending.register(message_id.clone())?;

        // The reader may have closed between the gate and the registration.
        if self.shared.is_closed() {
            self.shared.pending.cancel(&message_id);
            return Err(ClientError::ChannelClosed);
        }

        let envelope = build(session_id, message_id.clone());
        if let Err(e) = self.post(&envelope).await {
            self.shared.pending.cancel(&message_id);
            return Err(e);
        }

        Ok(PendingReply { id: message_id, rx })
    }

    async fn await_reply(&self, reply: PendingReply) -> CallOutcome {
        let Some(limit) = self.config.call_timeout else {
            return reply.wait().await;
        };
        let id = reply.id.clone();
        if let Ok(outcome) = tokio::time::timeout(limit, reply.wait()).await {
            outcome
        } else {
            self.shared.pending.cancel(&id);
            Err(ClientError::Timeout(id))
        }
    }

    async fn post(&self, envelope: &RequestEnvelope) -> Result<(), ClientError> {
        let url = format!("{}{}", self.base_url, self.config.messages_path);
        let resp = self.http.post(&url).json(envelope).send().await?;

        let status = resp.status();
        if status.is_success() {
            tracing::debug!(message_id = %envelope.id, method = %envelope.method, "request acknowledged");
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND {
            Err(ClientError::SessionNotFound(body))
        } else {
            Err(ClientError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

/// Extract the tool list from a `tools/list` result payload.
fn decode_tools(mut result: Value) -> Result<Vec<ToolDefinition>, ClientError> {
    let tools = result
        .get_mut("tools")
        .map(Value::take)
        .ok_or_else(|| ClientError::Decode("missing tools".to_string()))?;
    serde_json::from_value(tools).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Reader task: feed every frame to `shared` until the stream fails or ends.
///
/// The event source is closed on the first error instead of retrying, since
/// a reconnect would be a different session.
async fn read_events(mut events: EventSource, shared: Arc<Shared>) {
    while let Some(event) = events.next().await {
        match event {
            Ok(Event::Open) => tracing::debug!("push channel open"),
            Ok(Event::Message(msg)) => shared.handle_frame(&msg.data),
            Err(reqwest_eventsource::Error::StreamEnded) => {
                tracing::info!("push channel ended by server");
                break;
            }
            Err(err) => {
                tracing::error!("push channel error: {err}");
                break;
            }
        }
    }
    events.close();
    shared.shutdown();
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const SESSION_FRAME: &str =
        r#"{"jsonrpc":"2.0","method":"notifications/session","params":{"sessionId":"s1"}}"#;

    #[tokio::test]
    async fn session_announcement_opens_gate() {
        let shared = Shared::new();
        let mut rx = shared.state.subscribe();
        assert_eq!(*rx.borrow(), ConnectionState::Connecting);

        shared.handle_frame(SESSION_FRAME);

        let state = rx
            .wait_for(|s| *s != ConnectionState::Connecting)
            .await
            .unwrap()
            .clone();
        assert_eq!(state, ConnectionState::Ready(SessionId::from("s1")));
    }

    #[test]
    fn repeated_announcement_keeps_first_session() {
        let shared = Shared::new();
        shared.handle_frame(SESSION_FRAME);
        shared.handle_frame(
            r#"{"jsonrpc":"2.0","method":"notifications/session","params":{"sessionId":"s2"}}"#,
        );
        assert_eq!(
            *shared.state.borrow(),
            ConnectionState::Ready(SessionId::from("s1"))
        );
    }

    #[tokio::test]
    async fn tagged_frames_resolve_matching_calls() {
        let shared = Shared::new();
        let rx_ok = shared.pending.register(MessageId::from("m1")).unwrap();
        let rx_err = shared.pending.register(MessageId::from("m2")).unwrap();

        shared.handle_frame(
            r#"{"jsonrpc":"2.0","id":"m2","error":{"code":-32603,"message":"boom"}}"#,
        );
        assert!(shared.pending.contains(&MessageId::from("m1")));

        shared.handle_frame(
            r#"{"jsonrpc":"2.0","id":"m1","result":{"content":[{"type":"text","text":"5"}]}}"#,
        );
        assert!(shared.pending.is_empty());

        let ok = rx_ok.await.unwrap().unwrap();
        assert_eq!(ok["content"][0]["text"], "5");

        match rx_err.await.unwrap() {
            Err(ClientError::Remote { code, message }) => {
                assert_eq!(code, -32603);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn unknown_and_malformed_frames_are_discarded() {
        let shared = Shared::new();
        let _rx = shared.pending.register(MessageId::from("m1")).unwrap();

        shared.handle_frame(r#"{"jsonrpc":"2.0","id":"late","result":{}}"#);
        shared.handle_frame("not json");
        shared.handle_frame(r#"{"jsonrpc":"2.0","id":"m1","result":{},"error":{"code":1,"message":"x"}}"#);

        assert!(shared.pending.contains(&MessageId::from("m1")));
        assert_eq!(*shared.state.borrow(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn duplicate_delivery_fires_once() {
        let shared = Shared::new();
        let rx = shared.pending.register(MessageId::from("m1")).unwrap();

        shared.handle_frame(r#"{"jsonrpc":"2.0","id":"m1","result":1}"#);
        shared.handle_frame(r#"{"jsonrpc":"2.0","id":"m1","result":2}"#);

        assert_eq!(rx.await.unwrap().unwrap(), serde_json::json!(1));
    }

    #[tokio::test]
    async fn shutdown_rejects_pending_and_closes_gate() {
        let shared = Shared::new();
        let rx = shared.pending.register(MessageId::from("m1")).unwrap();

        shared.shutdown();

        assert!(shared.is_closed());
        assert!(matches!(rx.await.unwrap(), Err(ClientError::ChannelClosed)));
    }

    #[tokio::test]
    async fn non_object_tools_list_result_is_a_decode_error() {
        let shared = Shared::new();
        let rx = shared.pending.register(MessageId::from("list-1")).unwrap();

        shared.handle_frame(r#"{"jsonrpc":"2.0","id":"list-1","result":[1,2]}"#);
        let result = rx.await.unwrap().unwrap();

        assert!(matches!(decode_tools(result), Err(ClientError::Decode(_))));
        for bad in [json!("tools"), json!(7), json!(null), json!({}), json!({ "tools": 3 })] {
            assert!(matches!(decode_tools(bad), Err(ClientError::Decode(_))));
        }
    }

    #[test]
    fn tools_list_result_decodes() {
        let tools = decode_tools(json!({
            "tools": [{ "name": "add", "description": "Adds.", "inputSchema": { "type": "object" } }]
        }))
        .unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "add");
    }

    #[tokio::test]
    async fn pending_reply_reports_closed_when_sender_dropped() {
        let (tx, rx) = oneshot::channel();
        drop(tx);
        let reply = PendingReply {
            id: MessageId::from("m1"),
            rx,
        };
        assert!(matches!(reply.wait().await, Err(ClientError::ChannelClosed)));
    }
}
