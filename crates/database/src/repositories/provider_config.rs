use crate::pool::DbPool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use services::config_store::IdentityProviderConfig;
use tracing::debug;
use uuid::Uuid;

/// Identity-provider config rows. Insert-only: there is no update-in-place,
/// reads take the newest row.
pub struct ProviderConfigRepository {
    pool: DbPool,
}

impl ProviderConfigRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the current config (most-recent row by creation order)
    pub async fn latest(&self) -> Result<Option<IdentityProviderConfig>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let row = client
            .query_opt(
                "SELECT clientid, tenant, secret FROM azure_creds ORDER BY created_at DESC LIMIT 1",
                &[],
            )
            .await
            .context("Failed to query identity config")?;

        Ok(row.map(|row| IdentityProviderConfig {
            client_id: row.get("clientid"),
            tenant: row.get("tenant"),
            client_secret: row.get("secret"),
        }))
    }

    /// Append a new config row
    pub async fn insert(&self, config: &IdentityProviderConfig) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        client
            .execute(
                r#"
            INSERT INTO azure_creds (id, clientid, tenant, secret, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
                &[
                    &Uuid::new_v4(),
                    &config.client_id,
                    &config.tenant,
                    &config.client_secret,
                    &Utc::now(),
                ],
            )
            .await
            .context("Failed to insert identity config")?;

        debug!("Inserted identity config row");
        Ok(())
    }
}

// Implement the service trait
#[async_trait]
impl services::config_store::ProviderConfigRepository for ProviderConfigRepository {
    async fn latest(&self) -> anyhow::Result<Option<IdentityProviderConfig>> {
        self.latest().await
    }

    async fn insert(&self, config: &IdentityProviderConfig) -> anyhow::Result<()> {
        self.insert(config).await
    }
}
