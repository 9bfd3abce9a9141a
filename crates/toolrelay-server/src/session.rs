use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_stream::Stream;

use toolrelay_core::SessionId;
use toolrelay_mcp::PushEnvelope;

/// Frames buffered per push channel before dispatch tasks wait for the
/// subscriber to catch up.
const CHANNEL_CAPACITY: usize = 100;

/// Write half of a push channel.
#[derive(Debug, Clone)]
pub struct PushChannel {
    tx: mpsc::Sender<PushEnvelope>,
}

impl PushChannel {
    /// Create a channel and the receiver that feeds its event stream.
    #[must_use]
    pub fn new() -> (Self, mpsc::Receiver<PushEnvelope>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }

    /// Queue a frame for the subscriber.
    ///
    /// Returns false if the subscriber is gone; the frame is dropped.
    pub async fn send(&self, envelope: PushEnvelope) -> bool {
        self.tx.send(envelope).await.is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A live pairing between a subscriber and its push channel.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub channel: PushChannel,
    pub created_at: DateTime<Utc>,
}

/// Maps session ids to the push channels of connected subscribers.
///
/// The registry holds the only long-lived sender of each channel, so removing
/// an entry also ends that channel's event stream.
#[derive(Debug, Default)]
pub struct TransportRegistry {
    sessions: DashMap<SessionId, Session>,
}

impl TransportRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel under a fresh session id.
    pub fn open(&self, channel: PushChannel) -> SessionId {
        loop {
            let id = SessionId::new();
            if let Entry::Vacant(slot) = self.sessions.entry(id.clone()) {
                slot.insert(Session {
                    id: id.clone(),
                    channel,
                    created_at: Utc::now(),
                });
                return id;
            }
        }
    }

    /// Find the channel for a session.
    pub fn lookup(&self, session_id: &str) -> Option<PushChannel> {
        self.sessions
            .get(session_id)
            .map(|session| session.channel.clone())
    }

    /// Remove a session. Unknown ids are ignored.
    ///
    /// Returns true if an entry was removed.
    pub fn close(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    /// Remove every session, ending all push channels.
    pub fn close_all(&self) -> usize {
        let count = self.sessions.len();
        self.sessions.clear();
        count
    }

    pub fn created_at(&self, session_id: &str) -> Option<DateTime<Utc>> {
        self.sessions.get(session_id).map(|session| session.created_at)
    }

    /// Number of open push channels.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Event stream of one push channel.
///
/// Yields the session announcement first, then whatever dispatch writes to
/// the channel. Dropping the stream (subscriber gone, transport error) closes
/// the session in the registry.
pub struct PushStream {
    announcement: Option<PushEnvelope>,
    rx: mpsc::Receiver<PushEnvelope>,
    registry: Arc<TransportRegistry>,
    session_id: SessionId,
}

impl PushStream {
    /// Open a new session in `registry` and return its stream.
    pub fn open(registry: Arc<TransportRegistry>) -> Self {
        let (channel, rx) = PushChannel::new();
        let session_id = registry.open(channel);
        tracing::info!(session_id = %session_id, "push channel opened");

        Self {
            announcement: Some(PushEnvelope::session(session_id.clone())),
            rx,
            registry,
            session_id,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }
}

impl Stream for PushStream {
    type Item = PushEnvelope;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(announcement) = self.announcement.take() {
            return Poll::Ready(Some(announcement));
        }
        self.rx.poll_recv(cx)
    }
}

impl Drop for PushStream {
    fn drop(&mut self) {
        self.registry.close(self.session_id.as_str());
        tracing::info!(session_id = %self.session_id, "push channel closed");
    }
}
