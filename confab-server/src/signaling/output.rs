use async_trait::async_trait;
use confab_core::{ParticipantId, ServerMessage};

/// Outbound half of the signaling plane.
///
/// The room coordinator publishes replies and fan-out events through this
/// trait; the production implementation writes to live WebSocket sessions and
/// tests capture the traffic instead.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Deliver a message to one participant's session. Best-effort: a message
    /// for a session that is gone or not writable is dropped.
    async fn send(&self, participant_id: &ParticipantId, message: ServerMessage);
}
