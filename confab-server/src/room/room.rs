use crate::room::{Participant, ProducerSlot, RoomCommand};
use crate::sfu::Sfu;
use crate::signaling::SignalingOutput;
use confab_core::{
    KilledData, MediaKind, NicknameData, ParticipantId, ProducerAnnouncement, ProducerCreated,
    RoomId, ServerMessage, WelcomeData,
};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Coordinator actor for a single room.
///
/// All room state is owned by this task and mutated one command at a time;
/// replies and fan-out events leave through the signaling output, media
/// operations go through the SFU facade.
pub struct Room {
    id: RoomId,
    participants: HashMap<ParticipantId, Participant>,
    command_rx: mpsc::Receiver<RoomCommand>,
    membership: Arc<DashMap<ParticipantId, RoomId>>,
    sfu: Arc<dyn Sfu>,
    signaling: Arc<dyn SignalingOutput>,
}

impl Room {
    pub fn new(
        id: RoomId,
        command_rx: mpsc::Receiver<RoomCommand>,
        membership: Arc<DashMap<ParticipantId, RoomId>>,
        sfu: Arc<dyn Sfu>,
        signaling: Arc<dyn SignalingOutput>,
    ) -> Self {
        Self {
            id,
            participants: HashMap::new(),
            command_rx,
            membership,
            sfu,
            signaling,
        }
    }

    /// Run the room's event loop until the registry drops the command sender.
    pub async fn run(mut self) {
        info!("Room {} event loop started", self.id);

        while let Some(command) = self.command_rx.recv().await {
            self.handle_command(command).await;
        }

        info!("Room {} event loop finished", self.id);
    }

    async fn handle_command(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join {
                participant_id,
                rtp_capabilities,
            } => self.handle_join(participant_id, rtp_capabilities).await,

            RoomCommand::Leave { participant_id } => self.handle_leave(participant_id).await,

            RoomCommand::ConnectTransport {
                participant_id,
                transport_id,
                dtls_parameters,
            } => {
                self.handle_connect_transport(participant_id, transport_id, dtls_parameters)
                    .await;
            }

            RoomCommand::Produce {
                participant_id,
                transport_id,
                kind,
                rtp_parameters,
            } => {
                self.handle_produce(participant_id, transport_id, kind, rtp_parameters)
                    .await;
            }

            RoomCommand::RequestConsume {
                participant_id,
                producer_id,
                rtp_capabilities,
                source,
            } => {
                self.handle_request_consume(participant_id, producer_id, rtp_capabilities, source)
                    .await;
            }

            RoomCommand::NicknameChange {
                participant_id,
                nickname,
                previous_name,
            } => {
                self.handle_nickname_change(participant_id, nickname, previous_name)
                    .await;
            }

            RoomCommand::SetKilled {
                participant_id,
                killed,
            } => self.handle_set_killed(participant_id, killed).await,
        }
    }

    /// Two-phase join. The first join (no capabilities) attaches the
    /// participant, allocates its send transport and answers with `welcome`.
    /// The second join stores the capabilities and replays the room's
    /// producers and killed flags, which is what guarantees a newcomer sees
    /// every producer exactly once.
    async fn handle_join(
        &mut self,
        participant_id: ParticipantId,
        rtp_capabilities: Option<Value>,
    ) {
        if let Some(participant) = self.participants.get_mut(&participant_id) {
            match rtp_capabilities {
                Some(capabilities) if participant.rtp_capabilities.is_none() => {
                    participant.rtp_capabilities = Some(capabilities);
                    info!("Participant {} active in room {}", participant_id, self.id);
                    self.replay_room_state(&participant_id).await;
                }
                Some(_) => self.protocol_error(&participant_id, "Already active").await,
                None => self.protocol_error(&participant_id, "Already joined").await,
            }
            return;
        }

        if rtp_capabilities.is_some() {
            self.protocol_error(&participant_id, "Capabilities sent before welcome")
                .await;
            return;
        }

        if self.membership.contains_key(&participant_id) {
            self.protocol_error(&participant_id, "Already in a room")
                .await;
            return;
        }

        let transport = match self.sfu.create_send_transport(&participant_id).await {
            Ok(transport) => transport,
            Err(e) => {
                error!("Send transport for {} failed: {}", participant_id, e);
                self.protocol_error(
                    &participant_id,
                    &format!("Transport creation failed: {e}"),
                )
                .await;
                return;
            }
        };

        info!("Participant {} joined room {}", participant_id, self.id);
        self.participants
            .insert(participant_id.clone(), Participant::default());
        self.membership
            .insert(participant_id.clone(), self.id.clone());

        self.signaling
            .send(
                &participant_id,
                ServerMessage::Welcome {
                    data: WelcomeData {
                        router_rtp_capabilities: self.sfu.router_rtp_capabilities(),
                        web_rtc_transport_options: transport,
                    },
                },
            )
            .await;
    }

    /// Bring a participant that has just declared its capabilities up to date:
    /// one `new-producer` per live producer, plus the killed flag of each
    /// producing participant that carries it.
    async fn replay_room_state(&self, joiner: &ParticipantId) {
        for (id, other) in &self.participants {
            if id == joiner {
                continue;
            }
            let Some(producer) = &other.producer else {
                continue;
            };

            self.signaling
                .send(
                    joiner,
                    ServerMessage::NewProducer {
                        data: ProducerAnnouncement {
                            producer_id: producer.id.clone(),
                            participant_id: Some(id.clone()),
                        },
                    },
                )
                .await;

            if other.is_killed {
                self.signaling
                    .send(
                        joiner,
                        ServerMessage::ParticipantKilled {
                            data: KilledData {
                                participant_id: id.clone(),
                                killed: true,
                            },
                        },
                    )
                    .await;
            }
        }
    }

    async fn handle_leave(&mut self, participant_id: ParticipantId) {
        let Some(participant) = self.participants.remove(&participant_id) else {
            return;
        };
        self.membership.remove(&participant_id);
        info!("Participant {} left room {}", participant_id, self.id);

        if let Some(producer) = participant.producer {
            self.sfu.close_producer(&producer.id).await;
            self.fan_out(
                &participant_id,
                ServerMessage::ProducerClosed {
                    data: ProducerAnnouncement {
                        producer_id: producer.id,
                        participant_id: Some(participant_id.clone()),
                    },
                },
            )
            .await;
        }

        self.fan_out(
            &participant_id,
            ServerMessage::Disconnect {
                participant_id: participant_id.clone(),
            },
        )
        .await;

        self.sfu.remove_participant(&participant_id).await;
    }

    async fn handle_connect_transport(
        &mut self,
        participant_id: ParticipantId,
        transport_id: String,
        dtls_parameters: Value,
    ) {
        if !self.ensure_active(&participant_id).await {
            return;
        }

        if let Err(e) = self
            .sfu
            .connect_transport(&transport_id, dtls_parameters)
            .await
        {
            warn!(
                "Connect transport {} for {} failed: {}",
                transport_id, participant_id, e
            );
            self.protocol_error(&participant_id, &format!("Connect transport failed: {e}"))
                .await;
        }
    }

    async fn handle_produce(
        &mut self,
        participant_id: ParticipantId,
        transport_id: String,
        kind: MediaKind,
        rtp_parameters: Value,
    ) {
        if !self.ensure_active(&participant_id).await {
            return;
        }

        // One producer per participant: a camera restart replaces the old
        // publication instead of piling up a second one.
        let previous = self
            .participants
            .get(&participant_id)
            .and_then(|p| p.producer.clone());
        if let Some(previous) = previous {
            self.sfu.close_producer(&previous.id).await;
            if let Some(participant) = self.participants.get_mut(&participant_id) {
                participant.producer = None;
            }
            self.fan_out(
                &participant_id,
                ServerMessage::ProducerClosed {
                    data: ProducerAnnouncement {
                        producer_id: previous.id,
                        participant_id: Some(participant_id.clone()),
                    },
                },
            )
            .await;
        }

        let producer_id = match self.sfu.produce(&transport_id, kind, rtp_parameters).await {
            Ok(producer_id) => producer_id,
            Err(e) => {
                warn!("Produce for {} failed: {}", participant_id, e);
                self.protocol_error(&participant_id, &format!("Produce failed: {e}"))
                    .await;
                return;
            }
        };

        info!(
            "Participant {} producing {} ({}) in room {}",
            participant_id, producer_id, kind, self.id
        );
        if let Some(participant) = self.participants.get_mut(&participant_id) {
            participant.producer = Some(ProducerSlot {
                id: producer_id.clone(),
                kind,
            });
        }

        self.signaling
            .send(
                &participant_id,
                ServerMessage::ProduceResponse {
                    data: ProducerCreated {
                        id: producer_id.clone(),
                    },
                },
            )
            .await;

        self.fan_out(
            &participant_id,
            ServerMessage::NewProducer {
                data: ProducerAnnouncement {
                    producer_id,
                    participant_id: Some(participant_id.clone()),
                },
            },
        )
        .await;
    }

    async fn handle_request_consume(
        &mut self,
        participant_id: ParticipantId,
        producer_id: String,
        rtp_capabilities: Value,
        source: Option<ParticipantId>,
    ) {
        if !self.ensure_active(&participant_id).await {
            return;
        }

        let transport = match self.sfu.create_recv_transport(&participant_id).await {
            Ok(transport) => transport,
            Err(e) => {
                error!("Receive transport for {} failed: {}", participant_id, e);
                self.protocol_error(
                    &participant_id,
                    &format!("Transport creation failed: {e}"),
                )
                .await;
                return;
            }
        };

        match self
            .sfu
            .consume(&participant_id, &producer_id, rtp_capabilities)
            .await
        {
            Ok(consumer) => {
                self.signaling
                    .send(
                        &participant_id,
                        ServerMessage::ConsumeResponse {
                            data: confab_core::ConsumerCreated {
                                consumer_id: consumer.id,
                                producer_id: consumer.producer_id,
                                kind: consumer.kind,
                                rtp_parameters: consumer.rtp_parameters,
                                transport_options: transport,
                                participant_id: source,
                            },
                        },
                    )
                    .await;
            }
            Err(e) => {
                warn!(
                    "Consume of {} for {} failed: {}",
                    producer_id, participant_id, e
                );
                self.protocol_error(&participant_id, &format!("Consume failed: {e}"))
                    .await;

                // The producer is gone or unusable; tell the requester so it
                // can drop its speculative state.
                let owner = source.or_else(|| self.find_producer_owner(&producer_id));
                self.signaling
                    .send(
                        &participant_id,
                        ServerMessage::ProducerClosed {
                            data: ProducerAnnouncement {
                                producer_id,
                                participant_id: owner,
                            },
                        },
                    )
                    .await;
            }
        }
    }

    async fn handle_nickname_change(
        &mut self,
        participant_id: ParticipantId,
        nickname: String,
        previous_name: Option<String>,
    ) {
        if !self.participants.contains_key(&participant_id) {
            self.protocol_error(&participant_id, "Not in a room").await;
            return;
        }

        // Nicknames are presence metadata only; nothing is stored.
        self.fan_out(
            &participant_id,
            ServerMessage::NicknameChange {
                data: NicknameData {
                    participant_id: participant_id.clone(),
                    nickname: nickname.clone(),
                    previous_name: previous_name.clone(),
                    is_local_change: None,
                },
            },
        )
        .await;

        self.signaling
            .send(
                &participant_id,
                ServerMessage::NicknameChange {
                    data: NicknameData {
                        participant_id: participant_id.clone(),
                        nickname,
                        previous_name,
                        is_local_change: Some(true),
                    },
                },
            )
            .await;
    }

    async fn handle_set_killed(&mut self, participant_id: ParticipantId, killed: bool) {
        let Some(participant) = self.participants.get_mut(&participant_id) else {
            self.protocol_error(&participant_id, "Not in a room").await;
            return;
        };
        participant.is_killed = killed;

        self.fan_out(
            &participant_id,
            ServerMessage::ParticipantKilled {
                data: KilledData {
                    participant_id: participant_id.clone(),
                    killed,
                },
            },
        )
        .await;
    }

    /// Deliver an event to every active participant except the originator.
    ///
    /// Participants still in the first join phase are skipped; they pick up
    /// the room's state when their capabilities arrive.
    async fn fan_out(&self, origin: &ParticipantId, message: ServerMessage) {
        for (id, participant) in &self.participants {
            if id != origin && participant.is_active() {
                self.signaling.send(id, message.clone()).await;
            }
        }
    }

    fn find_producer_owner(&self, producer_id: &str) -> Option<ParticipantId> {
        self.participants.iter().find_map(|(id, participant)| {
            participant
                .producer
                .as_ref()
                .filter(|producer| producer.id == producer_id)
                .map(|_| id.clone())
        })
    }

    /// Media-plane operations require a completed two-phase join.
    async fn ensure_active(&self, participant_id: &ParticipantId) -> bool {
        match self.participants.get(participant_id) {
            Some(participant) if participant.is_active() => true,
            Some(_) => {
                self.protocol_error(participant_id, "Join handshake not complete")
                    .await;
                false
            }
            None => {
                self.protocol_error(participant_id, "Not in a room").await;
                false
            }
        }
    }

    async fn protocol_error(&self, participant_id: &ParticipantId, message: &str) {
        warn!("Protocol error for {}: {}", participant_id, message);
        self.signaling
            .send(
                participant_id,
                ServerMessage::Error {
                    error: message.to_string(),
                },
            )
            .await;
    }
}
