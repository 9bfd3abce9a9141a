use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use toolrelay_core::MessageId;

use crate::error::ClientError;

/// What a pending call eventually resolves to: the `result` payload of its
/// reply frame, or the error that ended it.
pub type CallOutcome = Result<Value, ClientError>;

#[derive(Debug)]
struct PendingCall {
    tx: oneshot::Sender<CallOutcome>,
    created_at: Instant,
}

/// Outstanding calls of one client, keyed by message id.
///
/// Each entry is consumed exactly once: by a matching reply, by
/// [`PendingCalls::cancel`], or by [`PendingCalls::fail_all`].
#[derive(Debug, Default)]
pub struct PendingCalls {
    calls: DashMap<MessageId, PendingCall>,
}

impl PendingCalls {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call and return the receiver its outcome will be sent on.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::DuplicateMessageId`] if `id` is already outstanding.
    pub fn register(&self, id: MessageId) -> Result<oneshot::Receiver<CallOutcome>, ClientError> {
        match self.calls.entry(id) {
            Entry::Occupied(slot) => Err(ClientError::DuplicateMessageId(slot.key().clone())),
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.insert(PendingCall {
                    tx,
                    created_at: Instant::now(),
                });
                Ok(rx)
            }
        }
    }

    /// Deliver `outcome` to the call registered under `id` and remove it.
    ///
    /// Returns false if no such call is outstanding.
    pub fn resolve(&self, id: &MessageId, outcome: CallOutcome) -> bool {
        let Some((_, call)) = self.calls.remove(id) else {
            return false;
        };
        tracing::trace!(
            message_id = %id,
            elapsed = ?call.created_at.elapsed(),
            "resolved pending call"
        );
        // The caller may have stopped waiting; that is not an error here.
        let _ = call.tx.send(outcome);
        true
    }

    /// Forget a call without resolving it.
    pub fn cancel(&self, id: &MessageId) -> bool {
        self.calls.remove(id).is_some()
    }

    /// Reject every outstanding call with [`ClientError::ChannelClosed`].
    pub fn fail_all(&self) -> usize {
        let ids: Vec<MessageId> = self.calls.iter().map(|entry| entry.key().clone()).collect();
        ids.iter()
            .filter(|id| self.resolve(id, Err(ClientError::ChannelClosed)))
            .count()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.calls.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_fires_once_and_removes() {
        let pending = PendingCalls::new();
        let rx = pending.register(MessageId::from("a")).unwrap();

        assert!(pending.resolve(&MessageId::from("a"), Ok(serde_json::json!(1))));
        assert!(!pending.resolve(&MessageId::from("a"), Ok(serde_json::json!(2))));
        assert!(pending.is_empty());

        assert_eq!(rx.await.unwrap().unwrap(), serde_json::json!(1));
    }

    #[tokio::test]
    async fn distinct_ids_resolve_independently() {
        let pending = PendingCalls::new();
        let rx_a = pending.register(MessageId::from("a")).unwrap();
        let mut rx_b = pending.register(MessageId::from("b")).unwrap();

        pending.resolve(&MessageId::from("a"), Ok(serde_json::json!("A")));

        assert!(pending.contains(&MessageId::from("b")));
        assert!(!pending.contains(&MessageId::from("a")));
        assert!(rx_b.try_recv().is_err());
        assert_eq!(rx_a.await.unwrap().unwrap(), serde_json::json!("A"));

        pending.resolve(&MessageId::from("b"), Ok(serde_json::json!("B")));
        assert_eq!(rx_b.await.unwrap().unwrap(), serde_json::json!("B"));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let pending = PendingCalls::new();
        let _rx = pending.register(MessageId::from("a")).unwrap();
        let err = pending.register(MessageId::from("a")).unwrap_err();
        assert!(matches!(err, ClientError::DuplicateMessageId(id) if id.as_str() == "a"));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn resolve_unknown_id_is_harmless() {
        let pending = PendingCalls::new();
        assert!(!pending.resolve(&MessageId::from("ghost"), Ok(Value::Null)));
    }

    #[test]
    fn resolve_after_receiver_dropped_still_consumes() {
        let pending = PendingCalls::new();
        drop(pending.register(MessageId::from("a")).unwrap());
        assert!(pending.resolve(&MessageId::from("a"), Ok(Value::Null)));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn fail_all_rejects_everything() {
        let pending = PendingCalls::new();
        let rx_a = pending.register(MessageId::from("a")).unwrap();
        let rx_b = pending.register(MessageId::from("b")).unwrap();

        assert_eq!(pending.fail_all(), 2);
        assert!(pending.is_empty());
        assert!(matches!(rx_a.await.unwrap(), Err(ClientError::ChannelClosed)));
        assert!(matches!(rx_b.await.unwrap(), Err(ClientError::ChannelClosed)));
    }

    #[tokio::test]
    async fn concurrent_registrations_on_distinct_keys() {
        let pending = std::sync::Arc::new(PendingCalls::new());
        let handles: Vec<_> = (0..50)
            .map(|i| {
                let pending = std::sync::Arc::clone(&pending);
                tokio::spawn(async move { pending.register(MessageId::from(format!("m{i}"))) })
            })
            .collect();

        let mut receivers = Vec::new();
        for handle in handles {
            receivers.push(handle.await.unwrap().unwrap());
        }
        assert_eq!(pending.len(), 50);
    }
}
