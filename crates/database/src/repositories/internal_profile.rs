use crate::pool::DbPool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use services::enrichment::InternalProfile;
use tracing::debug;
use uuid::Uuid;

/// Secondary internal-directory profiles, one row per subject
pub struct InternalProfileRepository {
    pool: DbPool,
}

impl InternalProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Atomic upsert keyed on the subject
    pub async fn upsert(&self, subject: &str, profile: &InternalProfile) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let now = Utc::now();

        client
            .execute(
                r#"
            INSERT INTO user_info_internal (
                id, user_id, display_name, given_name, job_title, email,
                user_principal_name, partner_code, partner_name,
                federation_login, is_sales_rep, erp_email, synced_on,
                synced_at, raw_data, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16)
            ON CONFLICT (user_id) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                given_name = EXCLUDED.given_name,
                job_title = EXCLUDED.job_title,
                email = EXCLUDED.email,
                user_principal_name = EXCLUDED.user_principal_name,
                partner_code = EXCLUDED.partner_code,
                partner_name = EXCLUDED.partner_name,
                federation_login = EXCLUDED.federation_login,
                is_sales_rep = EXCLUDED.is_sales_rep,
                erp_email = EXCLUDED.erp_email,
                synced_on = EXCLUDED.synced_on,
                synced_at = EXCLUDED.synced_at,
                raw_data = EXCLUDED.raw_data,
                updated_at = EXCLUDED.updated_at
            "#,
                &[
                    &Uuid::new_v4(),
                    &subject,
                    &profile.display_name,
                    &profile.given_name,
                    &profile.job_title,
                    &profile.email,
                    &profile.user_principal_name,
                    &profile.partner_code,
                    &profile.partner_name,
                    &profile.federation_login,
                    &profile.is_sales_rep,
                    &profile.erp_email,
                    &profile.synced_on,
                    &profile.synced_at,
                    &profile.raw,
                    &now,
                ],
            )
            .await
            .context("Failed to upsert internal profile")?;

        debug!(subject, "Upserted internal profile");
        Ok(())
    }
}

// Implement the service trait
#[async_trait]
impl services::enrichment::InternalProfileRepository for InternalProfileRepository {
    async fn upsert(&self, subject: &str, profile: &InternalProfile) -> anyhow::Result<()> {
        self.upsert(subject, profile).await
    }
}
