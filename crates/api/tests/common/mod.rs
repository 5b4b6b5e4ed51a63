use api::{routes, AppState, SessionHost};
use async_trait::async_trait;
use axum_test::TestServer;
use httpmock::MockServer;
use services::common::{RequestMetadata, TracingNotifier};
use services::config_store::{CacheStore, ConfigStoreAdapter, IdentityProviderConfig};
use services::enrichment::UpstreamDirectoryClient;
use services::session::{EnrichmentTrigger, FileUserStore, User};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory stand-in for the durable config table
#[derive(Default)]
pub struct InMemoryConfigRepo {
    pub rows: Mutex<Vec<IdentityProviderConfig>>,
    pub fail: bool,
}

#[async_trait]
impl services::config_store::ProviderConfigRepository for InMemoryConfigRepo {
    async fn latest(&self) -> anyhow::Result<Option<IdentityProviderConfig>> {
        if self.fail {
            return Err(anyhow::anyhow!("connection refused"));
        }
        Ok(self.rows.lock().unwrap().last().cloned())
    }

    async fn insert(&self, config: &IdentityProviderConfig) -> anyhow::Result<()> {
        if self.fail {
            return Err(anyhow::anyhow!("connection refused"));
        }
        self.rows.lock().unwrap().push(config.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl CacheStore for InMemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

struct NoopTrigger;

impl EnrichmentTrigger for NoopTrigger {
    fn trigger(&self, _user: &User, _metadata: &RequestMetadata) {}
}

pub struct TestApp {
    pub server: TestServer,
    pub repo: Arc<InMemoryConfigRepo>,
    pub upstream: MockServer,
    _user_store_dir: tempfile::TempDir,
}

pub async fn spawn(repo: InMemoryConfigRepo) -> TestApp {
    let repo = Arc::new(repo);
    let upstream = MockServer::start_async().await;

    let notifier = Arc::new(TracingNotifier);
    let config_store = Arc::new(ConfigStoreAdapter::new(
        repo.clone(),
        Arc::new(InMemoryCache::default()),
        notifier.clone(),
        Duration::from_secs(1),
    ));

    let internal_directory = config::InternalDirectoryConfig {
        upstream_base_url: upstream.url("/internal"),
        users_me_path: "/v1/users/me".to_string(),
        service_key: Some("service-key".to_string()),
        timeout_secs: 2,
        ..Default::default()
    };
    let upstream_client =
        Arc::new(UpstreamDirectoryClient::from_config(&internal_directory).unwrap());

    let identity = config::IdentityConfig {
        origin: "https://sales.example.com".to_string(),
        config_load_timeout_secs: 1,
        silent_renew_lead_secs: 60,
    };

    let user_store_dir = tempfile::tempdir().unwrap();
    let sessions = Arc::new(SessionHost::new(
        &identity,
        Arc::new(FileUserStore::new(user_store_dir.path().join("user.json"))),
        Arc::new(NoopTrigger),
        notifier,
    ));
    sessions.reconfigure(&config_store.load().await).await;

    let state = AppState {
        config_store,
        upstream: upstream_client,
        sessions,
    };

    TestApp {
        server: TestServer::new(routes::router(state)).unwrap(),
        repo,
        upstream,
        _user_store_dir: user_store_dir,
    }
}
