use crate::integration::create_test_server;
use crate::utils::{complete_join, send_transport_id, settle, WAIT_MS};
use confab_core::{ClientMessage, ParticipantId, ServerMessage};
use serde_json::json;

#[tokio::test]
async fn test_connect_transport_passthrough() {
    let server = create_test_server();
    let a = ParticipantId::generate();

    complete_join(&server.registry, &server.signaling, &a, Some("r1")).await;
    let transport_id = send_transport_id(&server.signaling, &a).await;

    server
        .registry
        .dispatch(
            &a,
            ClientMessage::ConnectTransport {
                transport_id: transport_id.clone(),
                dtls_parameters: json!({"role": "client", "fingerprints": []}),
            },
        )
        .await;
    settle().await;

    assert!(server.sfu.is_connected(&transport_id).await);
    // A successful connect is not acknowledged.
    assert_eq!(server.signaling.messages_for(&a).await.len(), 1);

    server
        .registry
        .dispatch(
            &a,
            ClientMessage::ConnectTransport {
                transport_id: "no-such-transport".into(),
                dtls_parameters: json!({}),
            },
        )
        .await;
    server
        .signaling
        .wait_for(&a, WAIT_MS, |m| {
            matches!(m, ServerMessage::Error { error } if error.starts_with("Connect transport failed"))
        })
        .await
        .expect("unknown transport must be reported");
}
