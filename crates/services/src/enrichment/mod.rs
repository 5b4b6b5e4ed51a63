pub mod directory;
pub mod ports;
pub mod transport;

pub use directory::GraphDirectoryClient;
pub use ports::*;
pub use transport::{FunctionTransport, ReverseProxyTransport, UpstreamDirectoryClient};

use crate::common::RequestMetadata;
use crate::session::{EnrichmentTrigger, User};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Multi-stage profile enrichment, run once per user-loaded event. Stages
/// are independently fault-tolerant: a failing stage logs, leaves its
/// fields null and the pipeline proceeds. Nothing here ever blocks or fails
/// the sign-in itself.
#[derive(Clone)]
pub struct EnrichmentPipeline {
    directory: Arc<dyn DirectoryGateway>,
    profiles: Arc<dyn UserProfileRepository>,
    internal_profiles: Arc<dyn InternalProfileRepository>,
    transports: Vec<Arc<dyn InternalProfileTransport>>,
}

impl EnrichmentPipeline {
    pub fn new(
        directory: Arc<dyn DirectoryGateway>,
        profiles: Arc<dyn UserProfileRepository>,
        internal_profiles: Arc<dyn InternalProfileRepository>,
        transports: Vec<Arc<dyn InternalProfileTransport>>,
    ) -> Self {
        Self {
            directory,
            profiles,
            internal_profiles,
            transports,
        }
    }

    /// Stages 1-3 inline, then the internal-directory stage as its own
    /// detached task, started strictly after the primary upsert has
    /// settled. The returned handle belongs to that deferred stage.
    pub async fn run(&self, user: User, metadata: RequestMetadata) -> JoinHandle<()> {
        if user.access_token.is_empty() {
            warn!(subject = %user.subject, "No access token, enrichment limited to claims");
        }

        // Stage 2: directory enrichment, tolerated failure
        let directory_profile = if user.access_token.is_empty() {
            None
        } else {
            match self.directory.fetch_profile(&user.access_token).await {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!(error = %e, "Directory profile fetch failed, continuing with claim-only data");
                    None
                }
            }
        };

        let photo_url = if user.access_token.is_empty() {
            None
        } else {
            match self.directory.fetch_photo_url(&user.access_token).await {
                Ok(url) => url,
                Err(e) => {
                    debug!(error = %e, "Directory photo fetch failed");
                    None
                }
            }
        };

        // Stages 1 + 3: claim extraction, merge, atomic upsert by subject
        let profile = merge_profile(&user, directory_profile.as_ref(), photo_url, &metadata);
        match self.profiles.upsert(&profile).await {
            Ok(()) => debug!(subject = %user.subject, "Enriched profile stored"),
            Err(e) => {
                error!(error = %e, subject = %user.subject, "Failed to upsert enriched profile")
            }
        }

        // Stage 4: secondary identity source, decoupled from the caller's
        // control flow with its own error boundary
        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline
                .enrich_internal(&user.subject, &user.access_token)
                .await;
        })
    }

    /// Try the transport tiers in order and upsert the first success.
    /// Both tiers failing is logged and skipped silently.
    pub async fn enrich_internal(&self, subject: &str, access_token: &str) {
        if access_token.is_empty() {
            warn!(subject, "No access token for the internal directory, skipping");
            return;
        }

        for transport in &self.transports {
            match transport.fetch_profile(access_token).await {
                Ok(mut profile) => {
                    let now = Utc::now();
                    profile.synced_on.get_or_insert(now.date_naive());
                    profile.synced_at.get_or_insert(now.time());

                    match self.internal_profiles.upsert(subject, &profile).await {
                        Ok(()) => {
                            info!(subject, transport = transport.name(), "Internal profile stored")
                        }
                        Err(e) => {
                            error!(error = %e, subject, "Failed to upsert internal profile")
                        }
                    }
                    return;
                }
                Err(e) => {
                    warn!(transport = transport.name(), error = %e, "Internal directory transport failed")
                }
            }
        }

        info!(subject, "Internal enrichment skipped, no transport succeeded");
    }
}

impl EnrichmentTrigger for EnrichmentPipeline {
    fn trigger(&self, user: &User, metadata: &RequestMetadata) {
        let pipeline = self.clone();
        let user = user.clone();
        let metadata = metadata.clone();
        tokio::spawn(async move {
            pipeline.run(user, metadata).await;
        });
    }
}

/// Stage 1 plus the merge: claims first, directory fields as the fallback
/// chain, token material and request metadata carried along
fn merge_profile(
    user: &User,
    directory: Option<&DirectoryProfile>,
    photo_url: Option<String>,
    metadata: &RequestMetadata,
) -> EnrichedProfile {
    let email = user
        .email()
        .map(str::to_string)
        .or_else(|| directory.and_then(|d| d.mail.clone()))
        .or_else(|| directory.and_then(|d| d.user_principal_name.clone()));

    let display_name = user
        .display_name()
        .map(str::to_string)
        .or_else(|| directory.and_then(|d| d.display_name.clone()));

    let first_name = user
        .claim_str("given_name")
        .map(str::to_string)
        .or_else(|| directory.and_then(|d| d.given_name.clone()));

    let last_name = user
        .claim_str("family_name")
        .map(str::to_string)
        .or_else(|| directory.and_then(|d| d.surname.clone()));

    EnrichedProfile {
        subject: user.subject.clone(),
        email,
        display_name,
        first_name,
        last_name,
        profile_image_url: photo_url,
        job_title: directory.and_then(|d| d.job_title.clone()),
        department: directory.and_then(|d| d.department.clone()),
        office_location: directory.and_then(|d| d.office_location.clone()),
        user_agent: metadata.user_agent.clone(),
        ip_address: metadata.ip_address.clone(),
        id_token: Some(user.id_token.clone()),
        access_token: Some(user.access_token.clone()),
        raw_claims: Value::Object(user.claims.clone()),
    }
}
