use crate::model::media::MediaKind;
use crate::model::participant::ParticipantId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames arriving from clients on the signaling socket.
///
/// Every frame is a JSON object tagged by `type`. RTP and DTLS blobs are
/// opaque sub-trees: the server forwards them between client and media engine
/// without inspecting their contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// First join (no capabilities) attaches the participant to a room and
    /// answers with `welcome`; the follow-up join carries `rtpCapabilities`
    /// and unlocks media operations.
    #[serde(rename_all = "camelCase")]
    Join {
        #[serde(default)]
        room_id: Option<String>,
        #[serde(default)]
        rtp_capabilities: Option<Value>,
    },
    Leave,
    #[serde(rename_all = "camelCase")]
    ConnectTransport {
        transport_id: String,
        dtls_parameters: Value,
    },
    #[serde(rename_all = "camelCase")]
    Produce {
        transport_id: String,
        kind: MediaKind,
        rtp_parameters: Value,
    },
    /// Ask to receive a remote producer. `participant_id` names the producer's
    /// owner and is echoed back for the client's bookkeeping.
    #[serde(rename_all = "camelCase")]
    RequestConsume {
        producer_id: String,
        rtp_capabilities: Value,
        #[serde(default)]
        participant_id: Option<ParticipantId>,
    },
    #[serde(rename_all = "camelCase")]
    NicknameChange {
        nickname: String,
        #[serde(default)]
        previous_name: Option<String>,
    },
    ParticipantKilled {
        killed: bool,
    },
    Ping,
}

/// Frames the server pushes to clients.
///
/// Responses wrap their payload in a `data` object; `disconnect` and `error`
/// carry their fields at the top level. Clients tolerate both shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    Welcome { data: WelcomeData },
    NewProducer { data: ProducerAnnouncement },
    ProduceResponse { data: ProducerCreated },
    ConsumeResponse { data: ConsumerCreated },
    ProducerClosed { data: ProducerAnnouncement },
    #[serde(rename_all = "camelCase")]
    Disconnect { participant_id: ParticipantId },
    NicknameChange { data: NicknameData },
    ParticipantKilled { data: KilledData },
    Pong,
    Error { error: String },
}

/// Reply to the first join: everything the client needs to set up its
/// send-side device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeData {
    pub router_rtp_capabilities: Value,
    pub web_rtc_transport_options: TransportOptions,
}

/// Parameters a client needs to connect to one engine-side transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportOptions {
    pub id: String,
    pub ice_parameters: Value,
    pub ice_candidates: Value,
    pub dtls_parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerAnnouncement {
    pub producer_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<ParticipantId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerCreated {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerCreated {
    pub consumer_id: String,
    pub producer_id: String,
    pub kind: MediaKind,
    pub rtp_parameters: Value,
    pub transport_options: TransportOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<ParticipantId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NicknameData {
    pub participant_id: ParticipantId,
    pub nickname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_name: Option<String>,
    /// Present (and `true`) only on the echo back to the participant that
    /// changed its own nickname.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_local_change: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KilledData {
    pub participant_id: ParticipantId,
    pub killed: bool,
}
