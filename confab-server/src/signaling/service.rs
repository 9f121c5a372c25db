use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use axum::extract::ws::Message;
use confab_core::{ParticipantId, ServerMessage};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, warn};

/// Depth of the per-session outbound queue. A session that falls this far
/// behind starts losing messages rather than growing an unbounded buffer.
pub(crate) const SESSION_QUEUE_DEPTH: usize = 64;

struct SignalingInner {
    sessions: DashMap<ParticipantId, mpsc::Sender<Message>>,
}

/// Process-wide table of live sessions and their outbound queues.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                sessions: DashMap::new(),
            }),
        }
    }

    pub fn register(&self, participant_id: ParticipantId, tx: mpsc::Sender<Message>) {
        self.inner.sessions.insert(participant_id, tx);
    }

    pub fn unregister(&self, participant_id: &ParticipantId) {
        self.inner.sessions.remove(participant_id);
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    fn send_message(&self, participant_id: &ParticipantId, message: &ServerMessage) {
        let Some(tx) = self
            .inner
            .sessions
            .get(participant_id)
            .map(|entry| entry.value().clone())
        else {
            warn!("Dropping message for unknown session {}", participant_id);
            return;
        };

        match serde_json::to_string(message) {
            Ok(json) => {
                // One attempt only; a full queue or a closed session loses
                // the message and the client is expected to reconnect.
                if let Err(e) = tx.try_send(Message::Text(json.into())) {
                    warn!("Dropping message for {}: {}", participant_id, e);
                }
            }
            Err(e) => error!("Failed to serialize message for {}: {}", participant_id, e),
        }
    }
}

impl Default for SignalingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalingOutput for SignalingService {
    async fn send(&self, participant_id: &ParticipantId, message: ServerMessage) {
        self.send_message(participant_id, &message);
    }
}
