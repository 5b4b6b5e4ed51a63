use crate::pool::DbPool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use services::enrichment::EnrichedProfile;
use tracing::debug;
use uuid::Uuid;

/// Enriched sign-in profiles, one row per subject
pub struct UserProfileRepository {
    pool: DbPool,
}

impl UserProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Atomic upsert keyed on the subject. Concurrent writers for the same
    /// subject cannot produce duplicate rows; the last write replaces the
    /// whole record.
    pub async fn upsert(&self, profile: &EnrichedProfile) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let now = Utc::now();

        client
            .execute(
                r#"
            INSERT INTO user_info (
                id, user_id, email, display_name, first_name, last_name,
                profile_image_url, job_title, department, office_location,
                user_agent, ip_address, id_token, access_token, raw_claims,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16)
            ON CONFLICT (user_id) DO UPDATE SET
                email = EXCLUDED.email,
                display_name = EXCLUDED.display_name,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                profile_image_url = EXCLUDED.profile_image_url,
                job_title = EXCLUDED.job_title,
                department = EXCLUDED.department,
                office_location = EXCLUDED.office_location,
                user_agent = EXCLUDED.user_agent,
                ip_address = EXCLUDED.ip_address,
                id_token = EXCLUDED.id_token,
                access_token = EXCLUDED.access_token,
                raw_claims = EXCLUDED.raw_claims,
                updated_at = EXCLUDED.updated_at
            "#,
                &[
                    &Uuid::new_v4(),
                    &profile.subject,
                    &profile.email,
                    &profile.display_name,
                    &profile.first_name,
                    &profile.last_name,
                    &profile.profile_image_url,
                    &profile.job_title,
                    &profile.department,
                    &profile.office_location,
                    &profile.user_agent,
                    &profile.ip_address,
                    &profile.id_token,
                    &profile.access_token,
                    &profile.raw_claims,
                    &now,
                ],
            )
            .await
            .context("Failed to upsert user profile")?;

        debug!(subject = %profile.subject, "Upserted user profile");
        Ok(())
    }
}

// Implement the service trait
#[async_trait]
impl services::enrichment::UserProfileRepository for UserProfileRepository {
    async fn upsert(&self, profile: &EnrichedProfile) -> anyhow::Result<()> {
        self.upsert(profile).await
    }
}
