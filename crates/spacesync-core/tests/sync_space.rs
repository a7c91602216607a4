use std::path::Path;

use chrono::Utc;
use httpmock::prelude::*;
use serde_json::json;
use spacesync_core::{sync_space, Config, CredentialStore, RunOptions, SyncError};
use tempfile::TempDir;

fn config(server: &MockServer, dir: &Path) -> Config {
    Config {
        space_id: "room-1".to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        api_base: server.url("/v1"),
        token_file: dir.join("tokens.json"),
        excluded_emails_file: dir.join("excluded_emails.txt"),
        excluded_departments_file: dir.join("excluded_departments.txt"),
    }
}

/// Token file whose access token expired yesterday but whose refresh token
/// is still good for months
fn write_expired_token(path: &Path) {
    let expires_at = Utc::now().timestamp() - 86_400;
    let token = json!({
        "access_token": "old-access",
        "refresh_token": "old-refresh",
        "expires_in": 1209600,
        "expires_at": expires_at as f64 + 0.5,
        "refresh_token_expires_in": 7776000,
        "token_type": "Bearer"
    });
    std::fs::write(path, token.to_string()).unwrap();
}

#[tokio::test]
async fn test_missing_token_requires_login_before_any_membership_call() {
    let server = MockServer::start_async().await;
    let dir = TempDir::new().unwrap();
    let any_call = server
        .mock_async(|when, then| {
            when.path_contains("/v1/");
            then.status(200).json_body(json!({"items": []}));
        })
        .await;

    let err = sync_space(&config(&server, dir.path()), RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::ReauthenticationRequired));
    any_call.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_full_run_refreshes_token_and_reconciles() {
    let server = MockServer::start_async().await;
    let dir = TempDir::new().unwrap();
    let cfg = config(&server, dir.path());
    write_expired_token(&cfg.token_file);
    std::fs::write(&cfg.excluded_emails_file, "bot@x.com\n").unwrap();
    std::fs::write(&cfg.excluded_departments_file, "Contract\n").unwrap();

    let refresh = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/access_token")
                .body_contains("refresh_token=old-refresh");
            then.status(200).json_body(json!({
                "access_token": "new-access",
                "expires_in": 1209600,
                "refresh_token": "new-refresh",
                "refresh_token_expires_in": 7776000
            }));
        })
        .await;
    let people = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/people")
                .header("Authorization", "Bearer new-access");
            then.status(200).json_body(json!({
                "items": [
                    {"id": "ann", "displayName": "Ann", "emails": ["ann@x.com"], "loginEnabled": true, "invitePending": false, "department": "Eng"},
                    {"id": "bot", "displayName": "Bot", "emails": ["bot@x.com"], "loginEnabled": true, "invitePending": false},
                    {"id": "cy", "displayName": "Cy", "emails": ["cy@x.com"], "loginEnabled": true, "invitePending": false, "department": "Contractors"},
                    {"id": "dee", "displayName": "Dee", "emails": ["dee@x.com"], "loginEnabled": true, "invitePending": true}
                ]
            }));
        })
        .await;
    let members = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/memberships")
                .query_param("roomId", "room-1")
                .header("Authorization", "Bearer new-access");
            then.status(200).json_body(json!({
                "items": [
                    {"id": "m-bot", "roomId": "room-1", "personId": "bot"},
                    {"id": "m-zed", "roomId": "room-1", "personId": "zed"}
                ]
            }));
        })
        .await;
    let add_ann = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/memberships")
                .json_body(json!({"roomId": "room-1", "personId": "ann"}));
            then.status(200).json_body(json!({"id": "m-ann"}));
        })
        .await;
    let remove_bot = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/v1/memberships/m-bot");
            then.status(204);
        })
        .await;
    // a failed removal is reported but does not stop the run
    let remove_zed = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/v1/memberships/m-zed");
            then.status(403).body("{\"message\":\"not allowed\"}");
        })
        .await;

    let summary = sync_space(&cfg, RunOptions::default()).await.unwrap();

    refresh.assert_async().await;
    people.assert_async().await;
    members.assert_async().await;
    add_ann.assert_async().await;
    remove_bot.assert_async().await;
    remove_zed.assert_async().await;

    assert_eq!(summary.directory_count, 4);
    assert_eq!(summary.eligible_count, 1);
    assert_eq!(summary.filtered.excluded_email, 1);
    assert_eq!(summary.filtered.excluded_department, 1);
    assert_eq!(summary.filtered.invite_pending, 1);
    let applied = summary.applied.unwrap();
    assert_eq!(applied.added, 1);
    assert_eq!(applied.removed, 1);
    assert_eq!(applied.failed_removes, vec!["zed".to_string()]);

    let stored = CredentialStore::new(&cfg.token_file).load().unwrap().unwrap();
    assert_eq!(stored.access_token, "new-access");
    assert_eq!(stored.refresh_token, "new-refresh");
    assert!(stored.expires_at > Utc::now());
}

#[tokio::test]
async fn test_dry_run_does_not_mutate_space() {
    let server = MockServer::start_async().await;
    let dir = TempDir::new().unwrap();
    let cfg = config(&server, dir.path());

    let valid = json!({
        "access_token": "live-access",
        "refresh_token": "live-refresh",
        "expires_in": 1209600,
        "expires_at": Utc::now().timestamp() + 3600,
        "refresh_token_expires_in": 7776000
    });
    std::fs::write(&cfg.token_file, valid.to_string()).unwrap();

    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/people");
            then.status(200).json_body(json!({
                "items": [{"id": "ann", "emails": ["ann@x.com"], "loginEnabled": true, "invitePending": false}]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/memberships");
            then.status(200).json_body(json!({"items": [{"id": "m-zed", "personId": "zed"}]}));
        })
        .await;
    let add = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/memberships");
            then.status(200);
        })
        .await;
    let remove = server
        .mock_async(|when, then| {
            when.method(DELETE).path_contains("/v1/memberships/");
            then.status(204);
        })
        .await;
    let refresh = server
        .mock_async(|when, then| {
            when.path("/v1/access_token");
            then.status(200);
        })
        .await;

    let summary = sync_space(&cfg, RunOptions { dry_run: true }).await.unwrap();

    assert_eq!(summary.planned_adds, 1);
    assert_eq!(summary.planned_removes, 1);
    assert!(summary.applied.is_none());
    add.assert_hits_async(0).await;
    remove.assert_hits_async(0).await;
    refresh.assert_hits_async(0).await;
}
