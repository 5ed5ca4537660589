//! Login, resumption and token renewal against the in-memory server.

mod common;

use common::{connected_client, credentials, location_json, test_config, MockServer, PASSWORD};
use fmd_client::{ClientError, Credentials, FmdClient, LocationSource, SessionState};
use std::time::Duration;

#[tokio::test]
async fn test_authenticate_and_read_location() {
    let (server, client) = connected_client().await;
    server.push_location(location_json("gps", 1_700_000_000_000));

    let record = client
        .get_latest_location(false, LocationSource::All)
        .await
        .unwrap();
    assert_eq!(record.provider, "gps");
    assert_eq!(record.date_ms, 1_700_000_000_000);
    assert_eq!(server.calls("request_access"), 1);
    assert_eq!(client.session().state().await, SessionState::Authenticated);
}

#[tokio::test]
async fn test_wrong_password_is_auth_error_without_retry() {
    let server = MockServer::new();
    let creds = Credentials::new(common::BASE_URL, common::FMD_ID, "not the password");

    let result = FmdClient::authenticate_with(server.clone(), &creds, test_config()).await;
    assert!(matches!(result, Err(ClientError::Auth(_))));
    assert_eq!(server.calls("request_access"), 1);
    assert_eq!(server.calls("key"), 0);
}

#[tokio::test]
async fn test_unknown_account_is_auth_error() {
    let server = MockServer::new();
    let creds = Credentials::new(common::BASE_URL, "someone-else", PASSWORD);

    let result = FmdClient::authenticate_with(server.clone(), &creds, test_config()).await;
    assert!(matches!(result, Err(ClientError::Auth(_))));
    assert_eq!(server.calls("request_access"), 0);
}

#[tokio::test]
async fn test_artifacts_never_contain_password() {
    let server = MockServer::new();
    let (_client, artifacts) =
        FmdClient::authenticate_with(server.clone(), &credentials(), test_config())
            .await
            .unwrap();

    let json = serde_json::to_string(&artifacts).unwrap();
    assert!(!json.contains(PASSWORD));
    assert!(artifacts.can_renew());
    assert!(artifacts.private_key.contains("PRIVATE KEY"));
    assert!(!format!("{artifacts:?}").contains(&artifacts.access_token));
}

#[tokio::test]
async fn test_resume_uses_stored_token() {
    let server = MockServer::new();
    server.push_location(location_json("network", 42));
    let (_client, artifacts) =
        FmdClient::authenticate_with(server.clone(), &credentials(), test_config())
            .await
            .unwrap();

    let resumed = FmdClient::resume_with(server.clone(), &artifacts, test_config())
        .await
        .unwrap();
    let record = resumed
        .get_latest_location(false, LocationSource::All)
        .await
        .unwrap();
    assert_eq!(record.date_ms, 42);
    assert_eq!(server.calls("request_access"), 1);
    assert_eq!(server.calls("salt"), 1);
}

#[tokio::test]
async fn test_resume_renews_rejected_token() {
    let server = MockServer::new();
    let (_client, artifacts) =
        FmdClient::authenticate_with(server.clone(), &credentials(), test_config())
            .await
            .unwrap();
    server.expire_tokens();

    let resumed = FmdClient::resume_with(server.clone(), &artifacts, test_config())
        .await
        .unwrap();
    assert_eq!(server.calls("request_access"), 2);

    let renewed = resumed.export_artifacts().await.unwrap();
    assert_ne!(renewed.access_token, artifacts.access_token);
    assert!(renewed.token_issued_at >= artifacts.token_issued_at);
}

#[tokio::test]
async fn test_resumed_token_keeps_its_granted_lifetime() {
    let server = MockServer::new();
    let mut short = test_config();
    short.session_duration_secs = 600;
    let (_client, artifacts) = FmdClient::authenticate_with(server.clone(), &credentials(), short)
        .await
        .unwrap();
    assert_eq!(artifacts.session_duration_secs, 600);

    let mut long = test_config();
    long.session_duration_secs = 86_400;
    let resumed = FmdClient::resume_with(server.clone(), &artifacts, long)
        .await
        .unwrap();
    let exported = resumed.export_artifacts().await.unwrap();
    assert_eq!(exported.access_token, artifacts.access_token);
    assert_eq!(exported.session_duration_secs, 600);
    assert_eq!(exported.token_issued_at, artifacts.token_issued_at);

    // Only a newly issued token gets the configured lifetime.
    server.expire_tokens();
    resumed.locations().recent(1).await.unwrap();
    let renewed = resumed.export_artifacts().await.unwrap();
    assert_ne!(renewed.access_token, artifacts.access_token);
    assert_eq!(renewed.session_duration_secs, 86_400);
}

#[tokio::test]
async fn test_resume_renews_clock_expired_token_without_probe() {
    let server = MockServer::new();
    let (_client, mut artifacts) =
        FmdClient::authenticate_with(server.clone(), &credentials(), test_config())
            .await
            .unwrap();
    artifacts.token_issued_at = 0;

    FmdClient::resume_with(server.clone(), &artifacts, test_config())
        .await
        .unwrap();
    assert_eq!(server.calls("request_access"), 2);
    assert_eq!(server.calls("location_count"), 0);
}

#[tokio::test]
async fn test_resume_without_hash_requires_reauth() {
    let server = MockServer::new();
    let (_client, mut artifacts) =
        FmdClient::authenticate_with(server.clone(), &credentials(), test_config())
            .await
            .unwrap();
    artifacts.password_hash = None;
    server.expire_tokens();

    let result = FmdClient::resume_with(server.clone(), &artifacts, test_config()).await;
    assert!(matches!(result, Err(ClientError::ReauthRequired)));
    assert_eq!(server.calls("request_access"), 1);
}

#[tokio::test]
async fn test_resume_rejects_artifacts_for_other_server() {
    let server = MockServer::new();
    let (_client, mut artifacts) =
        FmdClient::authenticate_with(server.clone(), &credentials(), test_config())
            .await
            .unwrap();
    artifacts.base_url = "https://elsewhere.example".into();

    let result = FmdClient::resume_with(server.clone(), &artifacts, test_config()).await;
    assert!(matches!(result, Err(ClientError::InvalidInput(_))));
}

#[tokio::test]
async fn test_resume_rejects_incomplete_artifacts() {
    let server = MockServer::new();
    let (_client, mut artifacts) =
        FmdClient::authenticate_with(server.clone(), &credentials(), test_config())
            .await
            .unwrap();
    artifacts.private_key.clear();

    let result = FmdClient::resume_with(server.clone(), &artifacts, test_config()).await;
    assert!(matches!(result, Err(ClientError::InvalidInput(_))));
}

#[tokio::test]
async fn test_expired_token_renewed_transparently_mid_session() {
    let (server, client) = connected_client().await;
    server.push_location(location_json("gps", 7));
    server.expire_tokens();

    let record = client
        .get_latest_location(false, LocationSource::All)
        .await
        .unwrap();
    assert_eq!(record.date_ms, 7);
    assert_eq!(server.calls("request_access"), 2);
}

#[tokio::test]
async fn test_concurrent_rejections_trigger_single_renewal() {
    let (server, client) = connected_client().await;
    server.push_location(location_json("gps", 7));
    server.expire_tokens();
    server.set_request_access_delay(Duration::from_millis(50));

    let locations = client.locations().clone();
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let locations = locations.clone();
            tokio::spawn(async move { locations.recent(1).await })
        })
        .collect();

    for task in tasks {
        let batch = task.await.unwrap().unwrap();
        assert_eq!(batch.records.len(), 1);
    }
    assert_eq!(server.calls("request_access"), 2);
}

#[tokio::test]
async fn test_rejected_renewal_marks_session_unauthenticated() {
    let (server, client) = connected_client().await;
    let mut artifacts = client.export_artifacts().await.unwrap();
    artifacts.password_hash = Some("$argon2id$v=19$m=64,t=1,p=1$c2FsdA$bm90LXRoZS1oYXNo".into());
    let resumed = FmdClient::resume_with(server.clone(), &artifacts, test_config())
        .await
        .unwrap();
    server.expire_tokens();

    let result = resumed.locations().recent(1).await;
    assert!(matches!(result, Err(ClientError::ReauthRequired)));
    assert_eq!(resumed.session().state().await, SessionState::Unauthenticated);
}
