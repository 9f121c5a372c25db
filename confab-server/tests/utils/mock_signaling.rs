use async_trait::async_trait;
use confab_core::{ParticipantId, ServerMessage};
use confab_server::signaling::SignalingOutput;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Captures every message the coordinator pushes toward clients.
#[derive(Clone, Default)]
pub struct MockSignalingOutput {
    messages: Arc<Mutex<Vec<(ParticipantId, ServerMessage)>>>,
}

impl MockSignalingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages_for(&self, participant_id: &ParticipantId) -> Vec<ServerMessage> {
        self.messages
            .lock()
            .await
            .iter()
            .filter(|(id, _)| id == participant_id)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub async fn total_count(&self) -> usize {
        self.messages.lock().await.len()
    }

    /// Poll until a participant has received at least `count` messages.
    /// Returns false on timeout.
    pub async fn wait_for_count(
        &self,
        participant_id: &ParticipantId,
        count: usize,
        timeout_ms: u64,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if self.messages_for(participant_id).await.len() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Poll until a message matching `predicate` arrives for the participant.
    pub async fn wait_for<F>(
        &self,
        participant_id: &ParticipantId,
        timeout_ms: u64,
        predicate: F,
    ) -> Option<ServerMessage>
    where
        F: Fn(&ServerMessage) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if let Some(found) = self
                .messages_for(participant_id)
                .await
                .into_iter()
                .find(&predicate)
            {
                return Some(found);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl SignalingOutput for MockSignalingOutput {
    async fn send(&self, participant_id: &ParticipantId, message: ServerMessage) {
        tracing::debug!("[MockSignaling] {} <- {:?}", participant_id, message);
        self.messages
            .lock()
            .await
            .push((participant_id.clone(), message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_messages_per_participant() {
        let signaling = MockSignalingOutput::new();
        let a = ParticipantId::generate();
        let b = ParticipantId::generate();

        signaling.send(&a, ServerMessage::Pong).await;

        assert_eq!(signaling.messages_for(&a).await.len(), 1);
        assert!(signaling.messages_for(&b).await.is_empty());
        assert!(signaling.wait_for_count(&a, 1, 100).await);
        assert!(!signaling.wait_for_count(&b, 1, 50).await);
    }
}
