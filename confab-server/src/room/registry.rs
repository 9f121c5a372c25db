use crate::room::{Room, RoomCommand};
use crate::sfu::Sfu;
use crate::signaling::SignalingOutput;
use confab_core::{ClientMessage, ParticipantId, RoomId, ServerMessage};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

const ROOM_QUEUE_DEPTH: usize = 100;

/// Process-wide table of rooms plus the participant-to-room binding.
///
/// Rooms are created on demand and retained for the life of the process; the
/// default room exists from startup. The membership table both routes frames
/// to the coordinator owning a participant and enforces that a participant
/// is in at most one room.
pub struct RoomRegistry {
    rooms: DashMap<RoomId, mpsc::Sender<RoomCommand>>,
    membership: Arc<DashMap<ParticipantId, RoomId>>,
    sfu: Arc<dyn Sfu>,
    signaling: Arc<dyn SignalingOutput>,
}

impl RoomRegistry {
    pub fn new(sfu: Arc<dyn Sfu>, signaling: Arc<dyn SignalingOutput>) -> Arc<Self> {
        let registry = Arc::new(Self {
            rooms: DashMap::new(),
            membership: Arc::new(DashMap::new()),
            sfu,
            signaling,
        });
        registry.get_or_create(&RoomId::default_room());
        registry
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn get_or_create(&self, room_id: &RoomId) -> mpsc::Sender<RoomCommand> {
        self.rooms
            .entry(room_id.clone())
            .or_insert_with(|| {
                info!("Creating room: {}", room_id);
                let (tx, rx) = mpsc::channel(ROOM_QUEUE_DEPTH);
                let room = Room::new(
                    room_id.clone(),
                    rx,
                    self.membership.clone(),
                    self.sfu.clone(),
                    self.signaling.clone(),
                );
                tokio::spawn(room.run());
                tx
            })
            .value()
            .clone()
    }

    fn bound_room(&self, participant_id: &ParticipantId) -> Option<mpsc::Sender<RoomCommand>> {
        let room_id = self
            .membership
            .get(participant_id)
            .map(|entry| entry.value().clone())?;
        self.rooms.get(&room_id).map(|entry| entry.value().clone())
    }

    /// Route one parsed frame from a session to the coordinator that owns the
    /// participant. Frames that need a room while the participant has none
    /// are answered with an error; a leave without a room is a no-op.
    pub async fn dispatch(&self, participant_id: &ParticipantId, message: ClientMessage) {
        match message {
            ClientMessage::Join {
                room_id,
                rtp_capabilities,
            } => {
                // A bound participant stays with its coordinator (the second
                // join phase); otherwise the requested room is resolved,
                // falling back to the default room.
                let room = match self.bound_room(participant_id) {
                    Some(room) => room,
                    None => {
                        let room_id = room_id
                            .map(RoomId::from)
                            .unwrap_or_else(RoomId::default_room);
                        self.get_or_create(&room_id)
                    }
                };
                let _ = room
                    .send(RoomCommand::Join {
                        participant_id: participant_id.clone(),
                        rtp_capabilities,
                    })
                    .await;
            }

            ClientMessage::Leave => {
                if let Some(room) = self.bound_room(participant_id) {
                    let _ = room
                        .send(RoomCommand::Leave {
                            participant_id: participant_id.clone(),
                        })
                        .await;
                }
            }

            ClientMessage::ConnectTransport {
                transport_id,
                dtls_parameters,
            } => {
                self.route(
                    participant_id,
                    RoomCommand::ConnectTransport {
                        participant_id: participant_id.clone(),
                        transport_id,
                        dtls_parameters,
                    },
                )
                .await;
            }

            ClientMessage::Produce {
                transport_id,
                kind,
                rtp_parameters,
            } => {
                self.route(
                    participant_id,
                    RoomCommand::Produce {
                        participant_id: participant_id.clone(),
                        transport_id,
                        kind,
                        rtp_parameters,
                    },
                )
                .await;
            }

            ClientMessage::RequestConsume {
                producer_id,
                rtp_capabilities,
                participant_id: source,
            } => {
                self.route(
                    participant_id,
                    RoomCommand::RequestConsume {
                        participant_id: participant_id.clone(),
                        producer_id,
                        rtp_capabilities,
                        source,
                    },
                )
                .await;
            }

            ClientMessage::NicknameChange {
                nickname,
                previous_name,
            } => {
                self.route(
                    participant_id,
                    RoomCommand::NicknameChange {
                        participant_id: participant_id.clone(),
                        nickname,
                        previous_name,
                    },
                )
                .await;
            }

            ClientMessage::ParticipantKilled { killed } => {
                self.route(
                    participant_id,
                    RoomCommand::SetKilled {
                        participant_id: participant_id.clone(),
                        killed,
                    },
                )
                .await;
            }

            // The gateway answers pings inline; this arm keeps dispatch total
            // for callers that do not.
            ClientMessage::Ping => {
                self.signaling
                    .send(participant_id, ServerMessage::Pong)
                    .await;
            }
        }
    }

    /// Session teardown funnels here regardless of cause.
    pub async fn handle_disconnect(&self, participant_id: &ParticipantId) {
        if let Some(room) = self.bound_room(participant_id) {
            let _ = room
                .send(RoomCommand::Leave {
                    participant_id: participant_id.clone(),
                })
                .await;
        }
    }

    async fn route(&self, participant_id: &ParticipantId, command: RoomCommand) {
        match self.bound_room(participant_id) {
            Some(room) => {
                let _ = room.send(command).await;
            }
            None => {
                self.signaling
                    .send(
                        participant_id,
                        ServerMessage::Error {
                            error: "Not in a room".to_string(),
                        },
                    )
                    .await;
            }
        }
    }
}
