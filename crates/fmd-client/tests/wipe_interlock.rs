//! Device commands and the two-step wipe interlock.

mod common;

use common::{connected_client, connected_client_with, test_config};
use fmd_client::{Camera, ClientError, CommandKind, LocationSource, ServerError};
use std::time::Duration;

#[tokio::test]
async fn test_wipe_refused_when_not_armed() {
    let (server, client) = connected_client().await;

    let result = client.execute_wipe("1234567890abcdef").await;
    assert!(matches!(result, Err(ClientError::NotArmed)));
    assert_eq!(server.calls("command"), 0);
}

#[tokio::test]
async fn test_invalid_pin_refused_even_when_armed() {
    let (server, client) = connected_client().await;
    client.arm_wipe();

    for pin in ["12 34", "pin!", "", "1234;reboot"] {
        let result = client.execute_wipe(pin).await;
        assert!(
            matches!(result, Err(ClientError::InvalidPin(_))),
            "{pin:?} should be rejected"
        );
    }
    assert_eq!(server.calls("command"), 0);
    assert!(client.gateway().wipe_status().armed);
}

#[tokio::test]
async fn test_armed_wipe_sends_signed_delete_once() {
    let (server, client) = connected_client().await;
    let status = client.arm_wipe();
    assert!(status.armed);

    let ack = client.execute_wipe("abcdef0123456789").await.unwrap();
    assert_eq!(ack.command, "delete");
    assert_eq!(server.commands(), vec!["delete abcdef0123456789".to_string()]);

    let again = client.execute_wipe("abcdef0123456789").await;
    assert!(matches!(again, Err(ClientError::NotArmed)));
    assert_eq!(server.calls("command"), 1);
}

#[tokio::test]
async fn test_disarm_cancels_wipe() {
    let (server, client) = connected_client().await;
    client.arm_wipe();
    assert!(client.disarm_wipe());
    assert!(!client.disarm_wipe());

    let result = client.execute_wipe("abcdef0123456789").await;
    assert!(matches!(result, Err(ClientError::NotArmed)));
    assert_eq!(server.calls("command"), 0);
}

#[tokio::test]
async fn test_arm_expires_after_timeout() {
    let mut config = test_config();
    config.gateway.wipe_arm_timeout_secs = 30;
    let (server, client) = connected_client_with(config).await;

    tokio::time::pause();
    let status = client.arm_wipe();
    assert!(status.auto_disarm_at.is_some());
    tokio::time::sleep(Duration::from_secs(31)).await;

    assert!(!client.gateway().wipe_status().armed);
    let result = client.execute_wipe("abcdef0123456789").await;
    assert!(matches!(result, Err(ClientError::NotArmed)));
    assert_eq!(server.calls("command"), 0);
}

#[tokio::test]
async fn test_failed_wipe_dispatch_consumes_arm() {
    let (server, client) = connected_client().await;
    server.fail_commands(Some(ServerError::Transient("gateway down".into())));
    client.arm_wipe();

    let result = client.execute_wipe("abcdef0123456789").await;
    assert!(matches!(result, Err(ClientError::TransientNetwork(_))));
    assert_eq!(server.calls("command"), 1);

    server.fail_commands(None);
    let retry = client.execute_wipe("abcdef0123456789").await;
    assert!(matches!(retry, Err(ClientError::NotArmed)));
    assert_eq!(server.calls("command"), 1);
}

#[tokio::test]
async fn test_commands_are_signed_and_formatted() {
    let (server, client) = connected_client().await;

    client.send_command(CommandKind::Ring).await.unwrap();
    client
        .send_command(CommandKind::Lock {
            message: Some("call me; $HOME \"now\"".into()),
        })
        .await
        .unwrap();
    client.gateway().camera(Camera::Front).await.unwrap();
    client.gateway().locate(LocationSource::Gps).await.unwrap();
    client.gateway().bluetooth(false).await.unwrap();

    assert_eq!(
        server.commands(),
        vec![
            "ring".to_string(),
            "lock call me HOME now".to_string(),
            "camera front".to_string(),
            "locate gps".to_string(),
            "bluetooth off".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_command_not_replayed_after_token_rejection() {
    let (server, client) = connected_client().await;
    server.expire_tokens();

    let result = client.send_command(CommandKind::Ring).await;
    assert!(matches!(result, Err(ClientError::TransientNetwork(_))));
    assert_eq!(server.calls("command"), 1);
    assert_eq!(server.calls("request_access"), 2);
    assert!(server.commands().is_empty());

    client.send_command(CommandKind::Ring).await.unwrap();
    assert_eq!(server.commands(), vec!["ring".to_string()]);
}
