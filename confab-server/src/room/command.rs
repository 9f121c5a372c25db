use confab_core::{MediaKind, ParticipantId};
use serde_json::Value;

/// Commands entering a room coordinator from the signaling plane.
///
/// One session's commands arrive in the order its frames were read; the
/// coordinator processes commands from all members one at a time.
#[derive(Debug)]
pub enum RoomCommand {
    /// Either phase of the join handshake; the capabilities distinguish them.
    Join {
        participant_id: ParticipantId,
        rtp_capabilities: Option<Value>,
    },

    /// Client-initiated leave, session disconnect or forced termination.
    Leave { participant_id: ParticipantId },

    ConnectTransport {
        participant_id: ParticipantId,
        transport_id: String,
        dtls_parameters: Value,
    },

    Produce {
        participant_id: ParticipantId,
        transport_id: String,
        kind: MediaKind,
        rtp_parameters: Value,
    },

    RequestConsume {
        participant_id: ParticipantId,
        producer_id: String,
        rtp_capabilities: Value,
        /// Owner of the producer, as named by the requester.
        source: Option<ParticipantId>,
    },

    NicknameChange {
        participant_id: ParticipantId,
        nickname: String,
        previous_name: Option<String>,
    },

    SetKilled {
        participant_id: ParticipantId,
        killed: bool,
    },
}
