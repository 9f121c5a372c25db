use crate::integration::create_test_server;
use crate::utils::{complete_join, produce_video, settle, WAIT_MS};
use confab_core::{ClientMessage, ParticipantId, ServerMessage};
use serde_json::json;

#[tokio::test]
async fn test_all_resources_released_when_sessions_end() {
    let server = create_test_server();
    let a = ParticipantId::generate();
    let b = ParticipantId::generate();
    let c = ParticipantId::generate();

    complete_join(&server.registry, &server.signaling, &a, Some("r1")).await;
    complete_join(&server.registry, &server.signaling, &b, Some("r1")).await;
    complete_join(&server.registry, &server.signaling, &c, Some("r2")).await;

    let producer_id = produce_video(&server.registry, &server.signaling, &a).await;
    produce_video(&server.registry, &server.signaling, &c).await;

    server
        .registry
        .dispatch(
            &b,
            ClientMessage::RequestConsume {
                producer_id,
                rtp_capabilities: json!({"codecs": []}),
                participant_id: Some(a.clone()),
            },
        )
        .await;
    server
        .signaling
        .wait_for(&b, WAIT_MS, |m| {
            matches!(m, ServerMessage::ConsumeResponse { .. })
        })
        .await
        .expect("consume-response expected");

    // A leaves explicitly, B and C drop their sessions.
    server.registry.dispatch(&a, ClientMessage::Leave).await;
    server.registry.handle_disconnect(&b).await;
    server.registry.handle_disconnect(&c).await;
    settle().await;

    assert_eq!(server.sfu.live_object_count().await, 0);
    let removed = server.sfu.removed_participants().await;
    for participant_id in [&a, &b, &c] {
        assert!(
            removed.contains(participant_id),
            "{participant_id} still holds engine resources"
        );
    }
}
