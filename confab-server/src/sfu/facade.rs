use async_trait::async_trait;
use confab_core::{MediaKind, ParticipantId, TransportOptions};
use serde_json::Value;

/// A consumer freshly created by the media engine.
#[derive(Debug, Clone)]
pub struct NewConsumer {
    pub id: String,
    pub producer_id: String,
    pub kind: MediaKind,
    pub rtp_parameters: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum SfuError {
    #[error("transport {0} not found")]
    TransportNotFound(String),

    #[error("producer {0} not found")]
    ProducerNotFound(String),

    #[error("participant {0} has no receive transport")]
    NoRecvTransport(ParticipantId),

    #[error("invalid RTP/DTLS payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("media engine: {0}")]
    Engine(String),
}

/// The single seam between the signaling core and the media engine.
///
/// The coordinator holds engine objects by identifier only; the
/// implementation owns the heavyweight transports, producers and consumers
/// and releases them when asked. Every operation may suspend.
#[async_trait]
pub trait Sfu: Send + Sync {
    /// Capabilities advertised by the router, forwarded verbatim to clients
    /// inside `welcome`.
    fn router_rtp_capabilities(&self) -> Value;

    /// Create the send-side transport for a participant. One per participant;
    /// a second call replaces the previous transport.
    async fn create_send_transport(
        &self,
        participant_id: &ParticipantId,
    ) -> Result<TransportOptions, SfuError>;

    /// Create the receive-side transport for a participant. Idempotent:
    /// repeated calls return the parameters of the same transport.
    async fn create_recv_transport(
        &self,
        participant_id: &ParticipantId,
    ) -> Result<TransportOptions, SfuError>;

    /// Finish the DTLS handshake of a previously created transport.
    async fn connect_transport(
        &self,
        transport_id: &str,
        dtls_parameters: Value,
    ) -> Result<(), SfuError>;

    /// Start publishing media on a connected send transport. Returns the
    /// engine-assigned producer id.
    async fn produce(
        &self,
        transport_id: &str,
        kind: MediaKind,
        rtp_parameters: Value,
    ) -> Result<String, SfuError>;

    /// Attach a consumer for `producer_id` to the participant's receive
    /// transport. The returned consumer is started, not paused.
    async fn consume(
        &self,
        participant_id: &ParticipantId,
        producer_id: &str,
        rtp_capabilities: Value,
    ) -> Result<NewConsumer, SfuError>;

    /// Close a producer and every consumer attached to it. Silent when the
    /// producer is unknown.
    async fn close_producer(&self, producer_id: &str);

    /// Release every engine resource belonging to a participant: consumers,
    /// send transport, receive transport.
    async fn remove_participant(&self, participant_id: &ParticipantId);

    /// Tear down all engine state ahead of process exit.
    async fn shutdown(&self);
}
