pub mod cache;
pub mod ports;

pub use cache::FileCacheStore;
pub use ports::*;

use crate::common::{NoticeKind, Notifier};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Resolves identity-provider parameters from the durable store with a
/// local write-through cache fallback. Never retries on its own; callers
/// re-invoke when they want another attempt.
pub struct ConfigStoreAdapter {
    repository: Arc<dyn ProviderConfigRepository>,
    cache: Arc<dyn CacheStore>,
    notifier: Arc<dyn Notifier>,
    load_timeout: Duration,
}

impl ConfigStoreAdapter {
    pub fn new(
        repository: Arc<dyn ProviderConfigRepository>,
        cache: Arc<dyn CacheStore>,
        notifier: Arc<dyn Notifier>,
        load_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            cache,
            notifier,
            load_timeout,
        }
    }

    /// Load the current configuration: durable store first (newest row
    /// wins), local cache on failure, empty result or timeout.
    pub async fn load(&self) -> LoadedConfig {
        match tokio::time::timeout(self.load_timeout, self.repository.latest()).await {
            Ok(Ok(Some(config))) => {
                debug!("Identity config resolved from the durable store");
                self.write_through(&config);
                LoadedConfig::Resolved {
                    config,
                    source: ConfigSource::Database,
                }
            }
            Ok(Ok(None)) => {
                debug!("Durable store has no identity config, trying the local cache");
                self.load_from_cache()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Durable config read failed, falling back to the local cache");
                self.load_from_cache()
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.load_timeout.as_secs(),
                    "Durable config read timed out, falling back to the local cache"
                );
                self.notifier.notify(
                    NoticeKind::Warning,
                    "Configuration store unavailable",
                    "Using locally cached identity settings.",
                );
                self.load_from_cache()
            }
        }
    }

    /// Save a configuration: local cache first so the operation degrades
    /// gracefully, then the durable store. A durable failure is reported as
    /// a warning but the save still counts.
    pub async fn save(
        &self,
        config: &IdentityProviderConfig,
    ) -> Result<SaveOutcome, ConfigStoreError> {
        let trimmed = IdentityProviderConfig {
            client_id: config.client_id.trim().to_string(),
            tenant: config.tenant.trim().to_string(),
            client_secret: config
                .client_secret
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        };

        self.cache
            .put(CACHE_KEY_CLIENT_ID, &trimmed.client_id)
            .map_err(ConfigStoreError::Cache)?;
        self.cache
            .put(CACHE_KEY_TENANT, &trimmed.tenant)
            .map_err(ConfigStoreError::Cache)?;
        if let Some(secret) = &trimmed.client_secret {
            self.cache
                .put(CACHE_KEY_CLIENT_SECRET, secret)
                .map_err(ConfigStoreError::Cache)?;
        }

        match self.repository.insert(&trimmed).await {
            Ok(()) => {
                info!("Identity config saved to the durable store");
                Ok(SaveOutcome {
                    persisted_remotely: true,
                })
            }
            Err(e) => {
                warn!(error = %e, "Durable config write failed, configuration saved locally only");
                Ok(SaveOutcome {
                    persisted_remotely: false,
                })
            }
        }
    }

    /// Per-field presence check for the login/guard UI
    pub async fn check(&self) -> ConfigCheckResult {
        match tokio::time::timeout(self.load_timeout, self.repository.latest()).await {
            Ok(Ok(Some(config))) => {
                self.write_through(&config);
                ConfigCheckResult {
                    client_id: !config.client_id.is_empty(),
                    tenant: !config.tenant.is_empty(),
                    client_secret: config.client_secret.is_some(),
                    source: Some(ConfigSource::Database),
                }
            }
            Ok(Ok(None)) => self.check_cache(),
            Ok(Err(e)) => {
                warn!(error = %e, "Durable config check failed, checking the local cache");
                self.check_cache()
            }
            Err(_) => {
                warn!("Durable config check timed out, checking the local cache");
                self.check_cache()
            }
        }
    }

    fn write_through(&self, config: &IdentityProviderConfig) {
        // Cache writes are best-effort; the durable values were already
        // resolved.
        let mut entries = vec![
            (CACHE_KEY_CLIENT_ID, config.client_id.as_str()),
            (CACHE_KEY_TENANT, config.tenant.as_str()),
        ];
        if let Some(secret) = &config.client_secret {
            entries.push((CACHE_KEY_CLIENT_SECRET, secret.as_str()));
        }

        for (key, value) in entries {
            if let Err(e) = self.cache.put(key, value) {
                warn!(key, error = %e, "Failed to mirror config value into the local cache");
            }
        }
    }

    fn load_from_cache(&self) -> LoadedConfig {
        let client_id = self.cache.get(CACHE_KEY_CLIENT_ID);
        let tenant = self.cache.get(CACHE_KEY_TENANT);
        let client_secret = self.cache.get(CACHE_KEY_CLIENT_SECRET);

        match (client_id, tenant) {
            (Some(client_id), Some(tenant)) => {
                info!("Using locally cached identity config");
                LoadedConfig::Resolved {
                    config: IdentityProviderConfig {
                        client_id,
                        tenant,
                        client_secret,
                    },
                    source: ConfigSource::Local,
                }
            }
            _ => LoadedConfig::NotFound,
        }
    }

    fn check_cache(&self) -> ConfigCheckResult {
        let client_id = self.cache.get(CACHE_KEY_CLIENT_ID);
        let tenant = self.cache.get(CACHE_KEY_TENANT);
        let client_secret = self.cache.get(CACHE_KEY_CLIENT_SECRET);

        let any_present = client_id.is_some() || tenant.is_some() || client_secret.is_some();

        ConfigCheckResult {
            client_id: client_id.is_some(),
            tenant: tenant.is_some(),
            client_secret: client_secret.is_some(),
            source: if any_present {
                Some(ConfigSource::Local)
            } else {
                None
            },
        }
    }
}
