mod common;

use common::{spawn, InMemoryConfigRepo};
use services::config_store::IdentityProviderConfig;

#[tokio::test]
async fn test_check_reports_nothing_configured() {
    let app = spawn(InMemoryConfigRepo::default()).await;

    let response = app.server.get("/v1/auth-config/check").await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["clientId"], false);
    assert_eq!(body["tenant"], false);
    assert_eq!(body["source"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_get_without_config_is_not_found() {
    let app = spawn(InMemoryConfigRepo::default()).await;

    let response = app.server.get("/v1/auth-config").await;

    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_save_rejects_incomplete_config() {
    let app = spawn(InMemoryConfigRepo::default()).await;

    let response = app
        .server
        .post("/v1/auth-config")
        .json(&serde_json::json!({ "clientId": "abc123", "tenant": "" }))
        .await;

    assert_eq!(response.status_code(), 400);
    assert!(app.repo.rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_save_then_load_round_trip() {
    let app = spawn(InMemoryConfigRepo::default()).await;

    let response = app
        .server
        .post("/v1/auth-config")
        .json(&serde_json::json!({
            "clientId": "abc123",
            "tenant": "contoso",
            "clientSecret": "s3cret"
        }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["saved"], true);
    assert_eq!(body["persistedRemotely"], true);

    let loaded: serde_json::Value = app.server.get("/v1/auth-config").await.json();
    assert_eq!(loaded["clientId"], "abc123");
    assert_eq!(loaded["tenant"], "contoso");
    assert_eq!(loaded["source"], "database");

    let check: serde_json::Value = app.server.get("/v1/auth-config/check").await.json();
    assert_eq!(check["clientId"], true);
    assert_eq!(check["tenant"], true);
    assert_eq!(check["clientSecret"], true);
}

#[tokio::test]
async fn test_save_degrades_to_local_when_store_fails() {
    let app = spawn(InMemoryConfigRepo {
        fail: true,
        ..Default::default()
    })
    .await;

    let response = app
        .server
        .post("/v1/auth-config")
        .json(&serde_json::json!({ "clientId": "abc123", "tenant": "contoso" }))
        .await;

    // Still reported saved: the local cache is authoritative for
    // client-side gating
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["saved"], true);
    assert_eq!(body["persistedRemotely"], false);

    // And the cached values are now servable
    let loaded: serde_json::Value = app.server.get("/v1/auth-config").await.json();
    assert_eq!(loaded["source"], "local");
    assert_eq!(loaded["clientId"], "abc123");
}

#[tokio::test]
async fn test_seeded_store_is_served_as_database_source() {
    let app = spawn(InMemoryConfigRepo {
        rows: std::sync::Mutex::new(vec![IdentityProviderConfig {
            client_id: "abc123".to_string(),
            tenant: "contoso".to_string(),
            client_secret: None,
        }]),
        ..Default::default()
    })
    .await;

    let loaded: serde_json::Value = app.server.get("/v1/auth-config").await.json();
    assert_eq!(loaded["source"], "database");
    assert_eq!(loaded["tenant"], "contoso");
}
