use config::IdentityConfig;
use services::common::{Notifier, RequestMetadata};
use services::config_store::{ConfigStoreAdapter, LoadedConfig};
use services::enrichment::UpstreamDirectoryClient;
use services::session::{EnrichmentTrigger, SessionManager, UserStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Shared route state
#[derive(Clone)]
pub struct AppState {
    pub config_store: Arc<ConfigStoreAdapter>,
    pub upstream: Arc<UpstreamDirectoryClient>,
    pub sessions: Arc<SessionHost>,
}

/// Owns the current session manager and its rebuild-on-reconfigure
/// lifecycle. The previous manager is always shut down (listeners
/// detached) before a replacement is constructed, so events are never
/// delivered twice across re-configurations.
pub struct SessionHost {
    origin: String,
    renew_lead: Duration,
    user_store: Arc<dyn UserStore>,
    enrichment: Arc<dyn EnrichmentTrigger>,
    notifier: Arc<dyn Notifier>,
    current: RwLock<Arc<SessionManager>>,
}

impl SessionHost {
    /// Starts quiescent; `reconfigure` installs a real client once config
    /// is resolved.
    pub fn new(
        identity: &IdentityConfig,
        user_store: Arc<dyn UserStore>,
        enrichment: Arc<dyn EnrichmentTrigger>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let renew_lead = Duration::from_secs(identity.silent_renew_lead_secs);
        let manager = Arc::new(SessionManager::with_client(
            None,
            user_store.clone(),
            enrichment.clone(),
            notifier.clone(),
            RequestMetadata::default(),
            renew_lead,
        ));

        Self {
            origin: identity.origin.clone(),
            renew_lead,
            user_store,
            enrichment,
            notifier,
            current: RwLock::new(manager),
        }
    }

    pub async fn manager(&self) -> Arc<SessionManager> {
        self.current.read().await.clone()
    }

    /// Replace the session manager with one built from freshly resolved
    /// config (or a quiescent one when nothing resolved)
    pub async fn reconfigure(&self, loaded: &LoadedConfig) {
        self.current.read().await.shutdown();

        let manager = match loaded {
            LoadedConfig::Resolved { config, source } => {
                match SessionManager::from_config(
                    config,
                    &self.origin,
                    self.user_store.clone(),
                    self.enrichment.clone(),
                    self.notifier.clone(),
                    RequestMetadata::default(),
                    self.renew_lead,
                ) {
                    Ok(manager) => {
                        info!(?source, "Session manager constructed from resolved config");
                        manager
                    }
                    Err(e) => {
                        error!(error = %e, "Session manager construction failed");
                        self.quiescent()
                    }
                }
            }
            LoadedConfig::NotFound => {
                info!("No identity config available, session manager stays quiescent");
                self.quiescent()
            }
        };

        let manager = Arc::new(manager);
        manager.start().await;
        *self.current.write().await = manager;
    }

    fn quiescent(&self) -> SessionManager {
        SessionManager::with_client(
            None,
            self.user_store.clone(),
            self.enrichment.clone(),
            self.notifier.clone(),
            RequestMetadata::default(),
            self.renew_lead,
        )
    }
}
