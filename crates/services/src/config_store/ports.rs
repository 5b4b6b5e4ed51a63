use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Local cache keys mirroring the durable config columns
pub const CACHE_KEY_CLIENT_ID: &str = "azure_ad_client_id";
pub const CACHE_KEY_TENANT: &str = "azure_ad_tenant";
pub const CACHE_KEY_CLIENT_SECRET: &str = "azure_ad_client_secret";

/// Identity-provider parameters resolved from the durable store or the
/// local cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProviderConfig {
    pub client_id: String,
    pub tenant: String,
    pub client_secret: Option<String>,
}

impl IdentityProviderConfig {
    /// Both `client_id` and `tenant` must be non-empty for session
    /// construction to proceed
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.tenant.is_empty()
    }
}

/// Where a resolved configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Database,
    Local,
}

/// Result of a `load` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedConfig {
    Resolved {
        config: IdentityProviderConfig,
        source: ConfigSource,
    },
    NotFound,
}

/// Per-field presence check consumed by the login/guard UI; ephemeral,
/// never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigCheckResult {
    pub client_id: bool,
    pub tenant: bool,
    pub client_secret: bool,
    pub source: Option<ConfigSource>,
}

impl ConfigCheckResult {
    /// The guard only needs client id + tenant to consider login reachable
    pub fn is_usable(&self) -> bool {
        self.client_id && self.tenant
    }
}

/// Outcome of a `save` call. A durable-store failure degrades to a local
/// save, which is still reported as saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub persisted_remotely: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigStoreError {
    #[error("Local cache error: {0}")]
    Cache(#[source] anyhow::Error),
}

/// Durable store of identity-provider config rows. Insert-only; the newest
/// row wins on read.
#[async_trait]
pub trait ProviderConfigRepository: Send + Sync {
    async fn latest(&self) -> anyhow::Result<Option<IdentityProviderConfig>>;

    async fn insert(&self, config: &IdentityProviderConfig) -> anyhow::Result<()>;
}

/// Local key-value cache (string key, string value). Reads are
/// last-write-wins; writes overwrite whole values, so no locking is needed
/// across independent readers.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn put(&self, key: &str, value: &str) -> anyhow::Result<()>;
}
