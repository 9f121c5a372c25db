use crate::room::RoomRegistry;
use crate::signaling::{SignalingService, SESSION_QUEUE_DEPTH};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use confab_core::{ClientMessage, ParticipantId, ServerMessage};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Interval of the protocol-level liveness probe. A session that misses two
/// consecutive probes is force-terminated.
pub(crate) const LIVENESS_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct GatewayState {
    pub service: SignalingService,
    pub registry: Arc<RoomRegistry>,
}

/// Accept any incoming connection; no origin restriction.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: GatewayState) {
    let participant_id = ParticipantId::generate();
    info!("New session: {}", participant_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel(SESSION_QUEUE_DEPTH);
    state.service.register(participant_id.clone(), tx);

    let mut liveness = tokio::time::interval(LIVENESS_INTERVAL);
    liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick completes immediately.
    liveness.tick().await;

    let mut alive = true;
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Ping) => {
                                // Application-level liveness for clients whose
                                // intermediaries strip control frames.
                                last_activity = Instant::now();
                                state.service.send(&participant_id, ServerMessage::Pong).await;
                            }
                            Ok(message) => {
                                state.registry.dispatch(&participant_id, message).await;
                            }
                            Err(e) => {
                                warn!("Unparseable frame from {}: {}", participant_id, e);
                                state.service.send(&participant_id, ServerMessage::Error {
                                    error: format!("Invalid message: {e}"),
                                }).await;
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) => alive = true,
                    Some(Ok(Message::Close(_))) | None => break,
                    // The WebSocket layer answers protocol pings itself;
                    // binary frames have no meaning here.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Socket error for {}: {}", participant_id, e);
                        break;
                    }
                }
            }

            outbound = rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if sender.send(frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            _ = liveness.tick() => {
                if !alive {
                    warn!(
                        "Session {} missed two liveness probes (idle {:?}), closing",
                        participant_id,
                        last_activity.elapsed()
                    );
                    break;
                }
                alive = false;
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    // Same cleanup for client-initiated leave, disconnect and forced
    // termination: the coordinator's leave handler runs, then the session
    // table entry goes away and the socket closes on drop.
    state.registry.handle_disconnect(&participant_id).await;
    state.service.unregister(&participant_id);
    info!("Session closed: {}", participant_id);
}
