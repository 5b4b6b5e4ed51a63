// End-to-end sign-in flow: a configured session manager loads a user,
// authentication resolves immediately, and the enrichment pipeline settles
// into exactly one profile row per subject.

use async_trait::async_trait;
use chrono::Utc;
use httpmock::prelude::*;
use serde_json::json;
use services::common::{NoticeKind, Notifier, RequestMetadata};
use services::config_store::IdentityProviderConfig;
use services::enrichment::{
    EnrichedProfile, EnrichmentPipeline, GraphDirectoryClient, InternalProfile,
    InternalProfileRepository, InternalProfileTransport, ReverseProxyTransport,
    UserProfileRepository,
};
use services::session::{
    IdentityClient, MicrosoftIdentityClient, SessionError, SessionManager, User, UserStore,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

struct ScriptedIdentityClient {
    user: User,
}

#[async_trait]
impl IdentityClient for ScriptedIdentityClient {
    fn authority(&self) -> &str {
        "https://login.microsoftonline.com/contoso/v2.0"
    }

    fn signin_redirect(&self) -> Result<Url, SessionError> {
        Ok(Url::parse("https://login.microsoftonline.com/contoso/oauth2/v2.0/authorize").unwrap())
    }

    fn signout_redirect(&self) -> Result<Url, SessionError> {
        Ok(Url::parse("https://login.microsoftonline.com/contoso/oauth2/v2.0/logout").unwrap())
    }

    async fn exchange_code(&self, _code: &str) -> Result<User, SessionError> {
        Ok(self.user.clone())
    }

    async fn refresh(&self, _user: &User) -> Result<User, SessionError> {
        Err(SessionError::Renew("not scripted".to_string()))
    }
}

#[derive(Default)]
struct InMemoryUserStore {
    user: Mutex<Option<User>>,
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn load(&self) -> anyhow::Result<Option<User>> {
        Ok(self.user.lock().unwrap().clone())
    }

    async fn save(&self, user: &User) -> anyhow::Result<()> {
        *self.user.lock().unwrap() = Some(user.clone());
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        *self.user.lock().unwrap() = None;
        Ok(())
    }
}

#[derive(Default)]
struct InMemoryProfiles {
    rows: Mutex<HashMap<String, EnrichedProfile>>,
}

#[async_trait]
impl UserProfileRepository for InMemoryProfiles {
    async fn upsert(&self, profile: &EnrichedProfile) -> anyhow::Result<()> {
        self.rows
            .lock()
            .unwrap()
            .insert(profile.subject.clone(), profile.clone());
        Ok(())
    }
}

#[derive(Default)]
struct InMemoryInternalProfiles {
    rows: Mutex<HashMap<String, InternalProfile>>,
}

#[async_trait]
impl InternalProfileRepository for InMemoryInternalProfiles {
    async fn upsert(&self, subject: &str, profile: &InternalProfile) -> anyhow::Result<()> {
        self.rows
            .lock()
            .unwrap()
            .insert(subject.to_string(), profile.clone());
        Ok(())
    }
}

struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _kind: NoticeKind, _title: &str, _message: &str) {}
}

fn signed_in_user() -> User {
    let mut claims = serde_json::Map::new();
    claims.insert("sub".to_string(), json!("u-42"));
    claims.insert("email".to_string(), json!("rep@contoso.com"));
    claims.insert("name".to_string(), json!("Sales Rep"));

    User {
        subject: "u-42".to_string(),
        claims,
        id_token: "id-token".to_string(),
        access_token: "access-token".to_string(),
        refresh_token: None,
        expires_at: Utc::now() + chrono::Duration::hours(1),
    }
}

#[test]
fn test_authority_resolves_from_tenant() {
    let client = MicrosoftIdentityClient::new(
        &IdentityProviderConfig {
            client_id: "abc123".to_string(),
            tenant: "contoso".to_string(),
            client_secret: None,
        },
        "https://sales.example.com",
    )
    .unwrap();

    assert_eq!(
        client.authority(),
        "https://login.microsoftonline.com/contoso/v2.0"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_signin_settles_one_profile_row_without_blocking_auth() {
    let graph = MockServer::start_async().await;
    graph
        .mock_async(|when, then| {
            when.method(GET).path("/me");
            then.status(200)
                .delay(Duration::from_millis(150))
                .json_body(json!({
                    "displayName": "Sales Rep",
                    "givenName": "Sales",
                    "surname": "Rep",
                    "mail": "rep@contoso.com",
                    "jobTitle": "Account Executive",
                    "department": "Field Sales",
                    "officeLocation": "HQ-3"
                }));
        })
        .await;
    graph
        .mock_async(|when, then| {
            when.method(GET).path("/me/photo/$value");
            then.status(404);
        })
        .await;

    let internal = MockServer::start_async().await;
    internal
        .mock_async(|when, then| {
            when.method(GET).path("/sales-api/v1/users/me");
            then.status(200).json_body(json!({
                "displayName": "Sales Rep",
                "partner_code": "BP-0042",
                "is_sales_rep": true
            }));
        })
        .await;

    let profiles = Arc::new(InMemoryProfiles::default());
    let internal_profiles = Arc::new(InMemoryInternalProfiles::default());

    let directory = GraphDirectoryClient::new(&graph.base_url(), Duration::from_secs(2)).unwrap();
    let tier_a: Arc<dyn InternalProfileTransport> = Arc::new(
        ReverseProxyTransport::new(
            Url::parse(&internal.url("/sales-api/v1/users/me")).unwrap(),
            Duration::from_secs(2),
        )
        .unwrap(),
    );
    let pipeline = Arc::new(EnrichmentPipeline::new(
        Arc::new(directory),
        profiles.clone(),
        internal_profiles.clone(),
        vec![tier_a],
    ));

    let manager = SessionManager::with_client(
        Some(Arc::new(ScriptedIdentityClient {
            user: signed_in_user(),
        })),
        Arc::new(InMemoryUserStore::default()),
        pipeline,
        Arc::new(SilentNotifier),
        RequestMetadata {
            user_agent: Some("salesdesk-e2e".to_string()),
            ip_address: Some("10.0.0.7".to_string()),
        },
        Duration::from_secs(60),
    );
    manager.start().await;

    manager.handle_callback("auth-code").await.unwrap();

    // Authenticated immediately: the directory response is still delayed,
    // so no enrichment call has settled yet.
    assert!(manager.is_authenticated());
    assert!(profiles.rows.lock().unwrap().is_empty());

    // Let the detached pipeline settle
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if !internal_profiles.rows.lock().unwrap().is_empty() {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "enrichment did not settle in time"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let rows = profiles.rows.lock().unwrap();
    assert_eq!(rows.len(), 1);
    let profile = &rows["u-42"];
    assert_eq!(profile.subject, "u-42");
    assert_eq!(profile.email.as_deref(), Some("rep@contoso.com"));
    assert_eq!(profile.department.as_deref(), Some("Field Sales"));
    assert_eq!(profile.user_agent.as_deref(), Some("salesdesk-e2e"));

    let internal_rows = internal_profiles.rows.lock().unwrap();
    assert_eq!(internal_rows.len(), 1);
    assert_eq!(internal_rows["u-42"].partner_code.as_deref(), Some("BP-0042"));

    manager.shutdown();
}
