mod common;

use common::{spawn, InMemoryConfigRepo};
use services::config_store::IdentityProviderConfig;

fn seeded_repo() -> InMemoryConfigRepo {
    InMemoryConfigRepo {
        rows: std::sync::Mutex::new(vec![IdentityProviderConfig {
            client_id: "abc123".to_string(),
            tenant: "contoso".to_string(),
            client_secret: None,
        }]),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_login_unavailable_without_config() {
    let app = spawn(InMemoryConfigRepo::default()).await;

    let response = app.server.get("/v1/auth/login").await;

    assert_eq!(response.status_code(), 503);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "signin_unavailable");
}

#[tokio::test]
async fn test_session_settles_quiescent_without_config() {
    let app = spawn(InMemoryConfigRepo::default()).await;

    let body: serde_json::Value = app.server.get("/v1/auth/session").await.json();

    assert_eq!(body["isAuthenticated"], false);
    assert_eq!(body["isLoading"], false);
}

#[tokio::test]
async fn test_guard_redirects_to_config_when_unconfigured() {
    let app = spawn(InMemoryConfigRepo::default()).await;

    let body: serde_json::Value = app
        .server
        .get("/v1/auth/guard")
        .add_query_param("path", "/reports")
        .await
        .json();

    assert_eq!(body["decision"], "redirect_to_config");
}

#[tokio::test]
async fn test_guard_allows_admin_paths_unauthenticated() {
    let app = spawn(InMemoryConfigRepo::default()).await;

    let body: serde_json::Value = app
        .server
        .get("/v1/auth/guard")
        .add_query_param("path", "/admin/auth-config")
        .await
        .json();

    assert_eq!(body["decision"], "render");
}

#[tokio::test]
async fn test_guard_redirects_to_login_once_configured() {
    let app = spawn(seeded_repo()).await;

    let body: serde_json::Value = app
        .server
        .get("/v1/auth/guard")
        .add_query_param("path", "/reports")
        .await
        .json();

    assert_eq!(body["decision"], "redirect_to_login");
}

#[tokio::test]
async fn test_login_redirect_once_configured() {
    let app = spawn(seeded_repo()).await;

    let response = app.server.get("/v1/auth/login").await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    let redirect = body["redirect"].as_str().unwrap();
    assert!(redirect
        .starts_with("https://login.microsoftonline.com/contoso/oauth2/v2.0/authorize"));
    assert!(redirect.contains("client_id=abc123"));
    assert!(redirect.contains("response_type=code"));
}

#[tokio::test]
async fn test_saving_config_rebuilds_the_session_manager() {
    let app = spawn(InMemoryConfigRepo::default()).await;
    assert_eq!(app.server.get("/v1/auth/login").await.status_code(), 503);

    let response = app
        .server
        .post("/v1/auth-config")
        .json(&serde_json::json!({ "clientId": "abc123", "tenant": "contoso" }))
        .await;
    assert_eq!(response.status_code(), 200);

    // The freshly constructed manager can now produce a sign-in redirect
    let response = app.server.get("/v1/auth/login").await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert!(body["redirect"]
        .as_str()
        .unwrap()
        .contains("login.microsoftonline.com/contoso"));
}

#[tokio::test]
async fn test_logout_unavailable_without_config() {
    let app = spawn(InMemoryConfigRepo::default()).await;

    let response = app.server.post("/v1/auth/logout").await;

    assert_eq!(response.status_code(), 503);
}

#[tokio::test]
async fn test_logout_redirect_once_configured() {
    let app = spawn(seeded_repo()).await;

    let response = app.server.post("/v1/auth/logout").await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert!(body["redirect"]
        .as_str()
        .unwrap()
        .starts_with("https://login.microsoftonline.com/contoso/oauth2/v2.0/logout"));
}
