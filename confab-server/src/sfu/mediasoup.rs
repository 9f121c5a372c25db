use crate::config::ServerConfig;
use crate::sfu::{NewConsumer, Sfu, SfuError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use confab_core::{MediaKind, ParticipantId, TransportOptions};
use mediasoup::consumer::{Consumer, ConsumerOptions};
use mediasoup::data_structures::{DtlsParameters, TransportListenIp};
use mediasoup::producer::{Producer, ProducerOptions};
use mediasoup::router::{Router, RouterOptions};
use mediasoup::rtp_parameters::{
    MediaKind as EngineMediaKind, MimeTypeAudio, MimeTypeVideo, RtcpFeedback, RtpCapabilities,
    RtpCodecCapability, RtpCodecParametersParameters, RtpParameters,
};
use mediasoup::transport::Transport;
use mediasoup::webrtc_transport::{
    TransportListenIps, WebRtcTransport, WebRtcTransportOptions, WebRtcTransportRemoteParameters,
};
use mediasoup::worker::{Worker, WorkerSettings};
use mediasoup::worker_manager::WorkerManager;
use serde_json::Value;
use std::collections::HashMap;
use std::net::IpAddr;
use std::num::{NonZeroU32, NonZeroU8, NonZeroUsize};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

const MAX_WORKERS: usize = 4;
const WORKER_DEATH_GRACE: Duration = Duration::from_secs(2);

#[derive(Default)]
struct ParticipantSlot {
    send_transport: Option<WebRtcTransport>,
    recv_transport: Option<WebRtcTransport>,
    consumers: HashMap<String, Consumer>,
}

struct ProducerEntry {
    producer: Producer,
    owner: ParticipantId,
}

/// Media engine backed by mediasoup: a small worker pool and one router
/// hosting every room's media.
///
/// The engine objects are reference-counted handles; dropping the last handle
/// closes the underlying resource, so forgetting an entry from these maps is
/// what releases it.
pub struct MediasoupSfu {
    _worker_manager: WorkerManager,
    _workers: Vec<Worker>,
    router: Router,
    router_rtp_capabilities: Value,
    listen_ip: IpAddr,
    announced_ip: Option<IpAddr>,
    slots: Mutex<HashMap<ParticipantId, ParticipantSlot>>,
    producers: Mutex<HashMap<String, ProducerEntry>>,
}

impl MediasoupSfu {
    /// Spawn the worker pool and create the router. Failure here is fatal;
    /// the process cannot run without a media engine.
    pub async fn new(config: &ServerConfig) -> Result<Self> {
        let worker_count = worker_pool_size();
        info!("Starting media engine: {} workers", worker_count);

        let worker_manager = WorkerManager::new();
        let mut workers = Vec::with_capacity(worker_count);

        for _ in 0..worker_count {
            let worker = worker_manager
                .create_worker({
                    let mut settings = WorkerSettings::default();
                    settings.rtc_ports_range = config.rtc_min_port..=config.rtc_max_port;
                    settings
                })
                .await
                .context("failed to spawn media worker")?;

            // Router state is not recoverable after a worker death; hand
            // control back to the supervisor instead of limping along.
            worker
                .on_died(|_| {
                    error!("media worker died, exiting");
                    std::thread::sleep(WORKER_DEATH_GRACE);
                    std::process::exit(1);
                })
                .detach();

            workers.push(worker);
        }

        let router = workers[0]
            .create_router(RouterOptions::new(media_codecs()))
            .await
            .context("failed to create router")?;
        let router_rtp_capabilities = serde_json::to_value(router.rtp_capabilities())
            .context("failed to serialize router capabilities")?;

        Ok(Self {
            _worker_manager: worker_manager,
            _workers: workers,
            router,
            router_rtp_capabilities,
            listen_ip: config.bind_addr,
            announced_ip: config.announced_ip,
            slots: Mutex::new(HashMap::new()),
            producers: Mutex::new(HashMap::new()),
        })
    }

    fn listen_ips(&self) -> TransportListenIps {
        TransportListenIps::new(TransportListenIp {
            ip: self.listen_ip,
            announced_ip: self.announced_ip,
        })
    }

    async fn create_transport(&self) -> Result<WebRtcTransport, SfuError> {
        self.router
            .create_webrtc_transport(WebRtcTransportOptions::new(self.listen_ips()))
            .await
            .map_err(|e| SfuError::Engine(e.to_string()))
    }

    /// Transports are keyed per participant; a lookup by bare id scans the
    /// slots.
    async fn find_transport(&self, transport_id: &str) -> Option<WebRtcTransport> {
        let slots = self.slots.lock().await;
        for slot in slots.values() {
            for transport in [slot.send_transport.as_ref(), slot.recv_transport.as_ref()]
                .into_iter()
                .flatten()
            {
                if transport.id().to_string() == transport_id {
                    return Some(transport.clone());
                }
            }
        }
        None
    }

    async fn find_send_transport(
        &self,
        transport_id: &str,
    ) -> Option<(ParticipantId, WebRtcTransport)> {
        let slots = self.slots.lock().await;
        for (participant_id, slot) in slots.iter() {
            if let Some(transport) = &slot.send_transport {
                if transport.id().to_string() == transport_id {
                    return Some((participant_id.clone(), transport.clone()));
                }
            }
        }
        None
    }
}

#[async_trait]
impl Sfu for MediasoupSfu {
    fn router_rtp_capabilities(&self) -> Value {
        self.router_rtp_capabilities.clone()
    }

    async fn create_send_transport(
        &self,
        participant_id: &ParticipantId,
    ) -> Result<TransportOptions, SfuError> {
        let transport = self.create_transport().await?;
        let options = describe_transport(&transport)?;

        let mut slots = self.slots.lock().await;
        let slot = slots.entry(participant_id.clone()).or_default();
        if let Some(old) = slot.send_transport.replace(transport) {
            warn!(
                "Replacing send transport {} of {}",
                old.id(),
                participant_id
            );
        }

        Ok(options)
    }

    async fn create_recv_transport(
        &self,
        participant_id: &ParticipantId,
    ) -> Result<TransportOptions, SfuError> {
        {
            let slots = self.slots.lock().await;
            if let Some(transport) = slots
                .get(participant_id)
                .and_then(|slot| slot.recv_transport.as_ref())
            {
                return describe_transport(transport);
            }
        }

        let transport = self.create_transport().await?;

        let mut slots = self.slots.lock().await;
        let slot = slots.entry(participant_id.clone()).or_default();
        // Lost a race against a concurrent create: keep the first transport,
        // the new one closes on drop.
        if let Some(existing) = &slot.recv_transport {
            return describe_transport(existing);
        }
        let options = describe_transport(&transport)?;
        slot.recv_transport = Some(transport);

        Ok(options)
    }

    async fn connect_transport(
        &self,
        transport_id: &str,
        dtls_parameters: Value,
    ) -> Result<(), SfuError> {
        let dtls_parameters: DtlsParameters = serde_json::from_value(dtls_parameters)?;
        let transport = self
            .find_transport(transport_id)
            .await
            .ok_or_else(|| SfuError::TransportNotFound(transport_id.to_string()))?;

        transport
            .connect(WebRtcTransportRemoteParameters { dtls_parameters })
            .await
            .map_err(|e| SfuError::Engine(e.to_string()))
    }

    async fn produce(
        &self,
        transport_id: &str,
        kind: MediaKind,
        rtp_parameters: Value,
    ) -> Result<String, SfuError> {
        let rtp_parameters: RtpParameters = serde_json::from_value(rtp_parameters)?;
        let (owner, transport) = self
            .find_send_transport(transport_id)
            .await
            .ok_or_else(|| SfuError::TransportNotFound(transport_id.to_string()))?;

        let producer = transport
            .produce(ProducerOptions::new(to_engine_kind(kind), rtp_parameters))
            .await
            .map_err(|e| SfuError::Engine(e.to_string()))?;

        let producer_id = producer.id().to_string();
        debug!("Producer {} created for {}", producer_id, owner);
        self.producers
            .lock()
            .await
            .insert(producer_id.clone(), ProducerEntry { producer, owner });

        Ok(producer_id)
    }

    async fn consume(
        &self,
        participant_id: &ParticipantId,
        producer_id: &str,
        rtp_capabilities: Value,
    ) -> Result<NewConsumer, SfuError> {
        let rtp_capabilities: RtpCapabilities = serde_json::from_value(rtp_capabilities)?;

        let transport = {
            let slots = self.slots.lock().await;
            slots
                .get(participant_id)
                .and_then(|slot| slot.recv_transport.clone())
        }
        .ok_or_else(|| SfuError::NoRecvTransport(participant_id.clone()))?;

        let producer = {
            let producers = self.producers.lock().await;
            producers
                .get(producer_id)
                .map(|entry| entry.producer.clone())
        }
        .ok_or_else(|| SfuError::ProducerNotFound(producer_id.to_string()))?;

        let consumer = transport
            .consume(ConsumerOptions::new(producer.id(), rtp_capabilities))
            .await
            .map_err(|e| SfuError::Engine(e.to_string()))?;

        let info = NewConsumer {
            id: consumer.id().to_string(),
            producer_id: producer_id.to_string(),
            kind: from_engine_kind(consumer.kind()),
            rtp_parameters: serde_json::to_value(consumer.rtp_parameters())?,
        };

        let mut slots = self.slots.lock().await;
        slots
            .entry(participant_id.clone())
            .or_default()
            .consumers
            .insert(info.id.clone(), consumer);

        Ok(info)
    }

    async fn close_producer(&self, producer_id: &str) {
        let Some(entry) = self.producers.lock().await.remove(producer_id) else {
            return;
        };

        let mut slots = self.slots.lock().await;
        for slot in slots.values_mut() {
            slot.consumers
                .retain(|_, consumer| consumer.producer_id() != entry.producer.id());
        }
        drop(slots);

        debug!("Closed producer {} of {}", producer_id, entry.owner);
    }

    async fn remove_participant(&self, participant_id: &ParticipantId) {
        let Some(slot) = self.slots.lock().await.remove(participant_id) else {
            return;
        };

        // The coordinator closes producers before removing the participant;
        // purging by owner here covers the paths that never got that far.
        self.producers
            .lock()
            .await
            .retain(|_, entry| entry.owner != *participant_id);

        debug!(
            "Released media resources of {} ({} consumers)",
            participant_id,
            slot.consumers.len()
        );
    }

    async fn shutdown(&self) {
        info!("Shutting down media engine");
        self.producers.lock().await.clear();
        self.slots.lock().await.clear();
        // Workers close when the manager drops with the process.
    }
}

fn describe_transport(transport: &WebRtcTransport) -> Result<TransportOptions, SfuError> {
    Ok(TransportOptions {
        id: transport.id().to_string(),
        ice_parameters: serde_json::to_value(transport.ice_parameters())?,
        ice_candidates: serde_json::to_value(transport.ice_candidates())?,
        dtls_parameters: serde_json::to_value(transport.dtls_parameters())?,
    })
}

fn worker_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .min(MAX_WORKERS)
}

fn to_engine_kind(kind: MediaKind) -> EngineMediaKind {
    match kind {
        MediaKind::Audio => EngineMediaKind::Audio,
        MediaKind::Video => EngineMediaKind::Video,
    }
}

fn from_engine_kind(kind: EngineMediaKind) -> MediaKind {
    match kind {
        EngineMediaKind::Audio => MediaKind::Audio,
        EngineMediaKind::Video => MediaKind::Video,
    }
}

/// Codec set advertised by the router: VP8, VP9, H.264 in two profiles, and
/// stereo Opus.
fn media_codecs() -> Vec<RtpCodecCapability> {
    let video_feedback = vec![
        RtcpFeedback::Nack,
        RtcpFeedback::NackPli,
        RtcpFeedback::CcmFir,
        RtcpFeedback::GoogRemb,
        RtcpFeedback::TransportCc,
    ];

    vec![
        RtpCodecCapability::Audio {
            mime_type: MimeTypeAudio::Opus,
            preferred_payload_type: None,
            clock_rate: NonZeroU32::new(48_000).unwrap(),
            channels: NonZeroU8::new(2).unwrap(),
            parameters: RtpCodecParametersParameters::default(),
            rtcp_feedback: vec![RtcpFeedback::TransportCc],
        },
        RtpCodecCapability::Video {
            mime_type: MimeTypeVideo::Vp8,
            preferred_payload_type: None,
            clock_rate: NonZeroU32::new(90_000).unwrap(),
            parameters: RtpCodecParametersParameters::from([(
                "x-google-start-bitrate",
                1000_u32.into(),
            )]),
            rtcp_feedback: video_feedback.clone(),
        },
        RtpCodecCapability::Video {
            mime_type: MimeTypeVideo::Vp9,
            preferred_payload_type: None,
            clock_rate: NonZeroU32::new(90_000).unwrap(),
            parameters: RtpCodecParametersParameters::from([(
                "x-google-start-bitrate",
                1000_u32.into(),
            )]),
            rtcp_feedback: video_feedback.clone(),
        },
        RtpCodecCapability::Video {
            mime_type: MimeTypeVideo::H264,
            preferred_payload_type: None,
            clock_rate: NonZeroU32::new(90_000).unwrap(),
            parameters: RtpCodecParametersParameters::from([
                ("packetization-mode", 1_u32.into()),
                ("profile-level-id", "42e01f".into()),
                ("level-asymmetry-allowed", 1_u32.into()),
                ("x-google-start-bitrate", 1000_u32.into()),
            ]),
            rtcp_feedback: video_feedback.clone(),
        },
        RtpCodecCapability::Video {
            mime_type: MimeTypeVideo::H264,
            preferred_payload_type: None,
            clock_rate: NonZeroU32::new(90_000).unwrap(),
            parameters: RtpCodecParametersParameters::from([
                ("packetization-mode", 1_u32.into()),
                ("profile-level-id", "4d0032".into()),
                ("level-asymmetry-allowed", 1_u32.into()),
                ("x-google-start-bitrate", 1000_u32.into()),
            ]),
            rtcp_feedback: video_feedback,
        },
    ]
}
