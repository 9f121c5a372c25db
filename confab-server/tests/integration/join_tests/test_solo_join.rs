use crate::integration::create_test_server;
use crate::utils::{begin_join, declare_capabilities, settle};
use confab_core::{ParticipantId, ServerMessage};

#[tokio::test]
async fn test_solo_join() {
    let server = create_test_server();
    let a = ParticipantId::generate();

    begin_join(&server.registry, &server.signaling, &a, Some("r1")).await;

    let messages = server.signaling.messages_for(&a).await;
    assert_eq!(messages.len(), 1, "first join answers with welcome only");
    match &messages[0] {
        ServerMessage::Welcome { data } => {
            assert!(data.router_rtp_capabilities.is_object());
            assert!(!data.web_rtc_transport_options.id.is_empty());
        }
        other => panic!("expected welcome, got {other:?}"),
    }

    declare_capabilities(&server.registry, &a, Some("r1")).await;
    settle().await;

    // Alone in the room: the capabilities join has nothing to replay and is
    // not acknowledged.
    assert_eq!(server.signaling.messages_for(&a).await.len(), 1);

    server.registry.handle_disconnect(&a).await;
    settle().await;

    assert_eq!(
        server.signaling.messages_for(&a).await.len(),
        1,
        "no fan-out in an otherwise empty room"
    );
    assert_eq!(server.sfu.removed_participants().await, vec![a]);
    assert_eq!(server.sfu.live_object_count().await, 0);
}
