use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Subset of the directory's `/me` profile used for enrichment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DirectoryProfile {
    pub display_name: Option<String>,
    pub given_name: Option<String>,
    pub surname: Option<String>,
    pub mail: Option<String>,
    pub user_principal_name: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub office_location: Option<String>,
}

/// The merged profile record upserted per subject after sign-in. Write-only
/// from this subsystem's perspective.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichedProfile {
    pub subject: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub office_location: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    pub raw_claims: Value,
}

/// Record from the secondary internal directory. The AD-derived fields keep
/// the upstream camelCase names; the business-partner linkage fields are
/// snake_case, as the internal API serves them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InternalProfile {
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(rename = "givenName")]
    pub given_name: Option<String>,
    #[serde(rename = "jobTitle")]
    pub job_title: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "userPrincipalName")]
    pub user_principal_name: Option<String>,
    pub partner_code: Option<String>,
    pub partner_name: Option<String>,
    pub federation_login: Option<String>,
    pub is_sales_rep: Option<bool>,
    pub erp_email: Option<String>,
    pub synced_on: Option<NaiveDate>,
    pub synced_at: Option<NaiveTime>,
    /// Full upstream payload as received
    #[serde(skip)]
    pub raw: Value,
}

impl InternalProfile {
    /// Parse an upstream JSON payload, keeping the raw capture alongside
    /// the typed fields
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let mut profile: InternalProfile = serde_json::from_value(value.clone())?;
        profile.raw = value;
        Ok(profile)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Endpoint returned status {0}")]
    Status(u16),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Primary directory (Graph) profile + photo lookups
#[async_trait]
pub trait DirectoryGateway: Send + Sync {
    async fn fetch_profile(&self, access_token: &str) -> Result<DirectoryProfile, TransportError>;

    /// `Ok(None)` when the account simply has no photo
    async fn fetch_photo_url(&self, access_token: &str)
        -> Result<Option<String>, TransportError>;
}

/// One tier of the internal-directory transport chain. The pipeline tries
/// each in order and stops at the first success.
#[async_trait]
pub trait InternalProfileTransport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_profile(&self, access_token: &str) -> Result<InternalProfile, TransportError>;
}

/// Durable primary-profile table, upsert keyed by subject
#[async_trait]
pub trait UserProfileRepository: Send + Sync {
    async fn upsert(&self, profile: &EnrichedProfile) -> anyhow::Result<()>;
}

/// Durable internal-profile table, upsert keyed by subject
#[async_trait]
pub trait InternalProfileRepository: Send + Sync {
    async fn upsert(&self, subject: &str, profile: &InternalProfile) -> anyhow::Result<()>;
}
