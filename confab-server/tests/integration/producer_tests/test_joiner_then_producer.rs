use crate::integration::create_test_server;
use crate::utils::{complete_join, count_matching, produce_video, settle};
use confab_core::{ParticipantId, ServerMessage};

#[tokio::test]
async fn test_joiner_then_producer() {
    let server = create_test_server();
    let a = ParticipantId::generate();
    let b = ParticipantId::generate();

    complete_join(&server.registry, &server.signaling, &b, Some("r1")).await;
    complete_join(&server.registry, &server.signaling, &a, Some("r1")).await;

    // A producer created after B became active is fanned out to B.
    let producer_id = produce_video(&server.registry, &server.signaling, &a).await;
    assert!(
        server
            .signaling
            .wait_for(&b, 2000, |m| matches!(
                m,
                ServerMessage::NewProducer { data }
                    if data.producer_id == producer_id
                        && data.participant_id.as_ref() == Some(&a)
            ))
            .await
            .is_some()
    );

    // A's disconnect closes the producer and announces the departure, each
    // exactly once.
    server.registry.handle_disconnect(&a).await;
    settle().await;

    let b_messages = server.signaling.messages_for(&b).await;
    assert_eq!(
        count_matching(&b_messages, |m| matches!(
            m,
            ServerMessage::NewProducer { .. }
        )),
        1
    );
    assert_eq!(
        count_matching(&b_messages, |m| matches!(
            m,
            ServerMessage::ProducerClosed { data }
                if data.producer_id == producer_id
                    && data.participant_id.as_ref() == Some(&a)
        )),
        1
    );
    assert_eq!(
        count_matching(&b_messages, |m| matches!(
            m,
            ServerMessage::Disconnect { participant_id } if *participant_id == a
        )),
        1
    );

    assert!(!server.sfu.has_producer(&producer_id).await);
    assert!(server.sfu.removed_participants().await.contains(&a));
}
