use crate::integration::create_test_server;
use crate::utils::{complete_join, count_matching, settle, WAIT_MS};
use confab_core::{ClientMessage, ParticipantId, ServerMessage};

#[tokio::test]
async fn test_nickname_echo() {
    let server = create_test_server();
    let a = ParticipantId::generate();
    let b = ParticipantId::generate();
    let c = ParticipantId::generate();

    complete_join(&server.registry, &server.signaling, &a, Some("r1")).await;
    complete_join(&server.registry, &server.signaling, &b, Some("r1")).await;
    complete_join(&server.registry, &server.signaling, &c, Some("r2")).await;

    server
        .registry
        .dispatch(
            &a,
            ClientMessage::NicknameChange {
                nickname: "x".into(),
                previous_name: Some("y".into()),
            },
        )
        .await;

    // The sender gets its own change back, marked local.
    let echo = server
        .signaling
        .wait_for(&a, WAIT_MS, |m| {
            matches!(m, ServerMessage::NicknameChange { .. })
        })
        .await
        .expect("echo expected");
    match echo {
        ServerMessage::NicknameChange { data } => {
            assert_eq!(data.participant_id, a);
            assert_eq!(data.nickname, "x");
            assert_eq!(data.previous_name.as_deref(), Some("y"));
            assert_eq!(data.is_local_change, Some(true));
        }
        _ => unreachable!(),
    }

    // Room members get it without the local marker.
    let remote = server
        .signaling
        .wait_for(&b, WAIT_MS, |m| {
            matches!(m, ServerMessage::NicknameChange { .. })
        })
        .await
        .expect("fan-out expected");
    match remote {
        ServerMessage::NicknameChange { data } => {
            assert_eq!(data.participant_id, a);
            assert_eq!(data.nickname, "x");
            assert!(data.is_local_change.is_none());
        }
        _ => unreachable!(),
    }

    settle().await;
    assert_eq!(
        count_matching(
            &server.signaling.messages_for(&a).await,
            |m| matches!(m, ServerMessage::NicknameChange { .. })
        ),
        1
    );
    assert_eq!(
        count_matching(
            &server.signaling.messages_for(&c).await,
            |m| matches!(m, ServerMessage::NicknameChange { .. })
        ),
        0,
        "presence events never cross rooms"
    );
}
