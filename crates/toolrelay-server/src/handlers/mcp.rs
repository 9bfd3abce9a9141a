use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive},
    response::Sse,
    Json,
};
use serde_json::Value;
use tokio_stream::StreamExt;

use toolrelay_core::Error;
use toolrelay_mcp::RequestEnvelope;

use crate::app_state::AppState;
use crate::dispatch;
use crate::session::PushStream;

type Rejection = (StatusCode, Json<Value>);

fn reject(status: StatusCode, message: impl Into<String>) -> Rejection {
    let message = message.into();
    tracing::warn!(%status, "request rejected: {message}");
    (status, Json(serde_json::json!({ "error": message })))
}

/// Push channel for one client.
///
/// 1. Server allocates a session and sends it as the first `message` event
/// 2. Client POSTs envelopes carrying that session id to `/messages`
/// 3. Server sends each reply back on this stream, tagged with its message id
pub async fn push_channel(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let stream = PushStream::open(Arc::clone(&state.sessions)).map(|envelope| {
        Ok(Event::default()
            .event("message")
            .json_data(&envelope)
            .unwrap_or_else(|_| Event::default().data("error serializing frame")))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Request channel: validate, route by session, dispatch, acknowledge.
///
/// The acknowledgement carries no tool result; that arrives later on the
/// session's push channel.
#[allow(clippy::missing_errors_doc)]
pub async fn post_message(
    State(state): State<AppState>,
    payload: Result<Json<RequestEnvelope>, JsonRejection>,
) -> Result<Json<Value>, Rejection> {
    let Json(envelope) =
        payload.map_err(|e| reject(StatusCode::BAD_REQUEST, e.body_text()))?;
    let call = envelope
        .validate()
        .map_err(|e| reject(StatusCode::BAD_REQUEST, e.to_string()))?;

    let Some(session_id) = envelope.session_id() else {
        return Err(reject(
            StatusCode::NOT_FOUND,
            Error::SessionNotFound("missing params.sessionId".to_string()).to_string(),
        ));
    };

    let channel = state.sessions.lookup(session_id.as_str()).ok_or_else(|| {
        reject(
            StatusCode::NOT_FOUND,
            Error::SessionNotFound(session_id.to_string()).to_string(),
        )
    })?;

    if channel.is_closed() {
        state.sessions.close(session_id.as_str());
        return Err(reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            Error::ChannelClosed(session_id.clone()).to_string(),
        ));
    }

    tracing::debug!(
        session_id = %session_id,
        message_id = %envelope.id,
        method = %envelope.method,
        "accepted request"
    );
    dispatch::spawn(
        Arc::clone(&state.tools),
        channel,
        envelope.id.clone(),
        call,
    );

    Ok(Json(serde_json::json!({
        "id": envelope.id,
        "accepted": true,
    })))
}
