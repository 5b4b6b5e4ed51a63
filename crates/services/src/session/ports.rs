use crate::common::RequestMetadata;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// A user as issued by the identity provider. Immutable per issuance:
/// silent renewal supersedes the whole value, sign-out clears it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Stable external id (`sub` claim)
    pub subject: String,
    pub claims: serde_json::Map<String, Value>,
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl User {
    pub fn expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn claim_str(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }

    /// `email` with `preferred_username` as the token-level fallback
    pub fn email(&self) -> Option<&str> {
        self.claim_str("email")
            .or_else(|| self.claim_str("preferred_username"))
    }

    pub fn display_name(&self) -> Option<&str> {
        self.claim_str("name")
    }
}

/// The single typed stream the session manager emits. One subscription
/// replaces the provider library's three separate callback registrations.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    UserLoaded(User),
    UserUnloaded,
    SilentRenewError(String),
}

/// Session state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Constructing,
    Ready,
    Error,
}

/// Observable session state. The manager owns it; everything else reads.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub user: Option<User>,
    pub error: Option<String>,
    pub is_loading: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Identity client not constructed (configuration incomplete)")]
    ClientNotConstructed,

    #[error("Invalid identity-provider endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Sign-in failed: {0}")]
    Signin(String),

    #[error("Sign-out failed: {0}")]
    Signout(String),

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Silent renewal failed: {0}")]
    Renew(String),
}

/// The identity-provider client seam. The production implementation wraps
/// the OAuth2 code-redirect flow; tests substitute a scripted one.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// The resolved authority, e.g.
    /// `https://login.microsoftonline.com/{tenant}/v2.0`
    fn authority(&self) -> &str;

    /// Build the sign-in redirect for the code flow
    fn signin_redirect(&self) -> Result<Url, SessionError>;

    /// Build the sign-out redirect back to the application origin
    fn signout_redirect(&self) -> Result<Url, SessionError>;

    /// Exchange an authorization code for a signed-in user
    async fn exchange_code(&self, code: &str) -> Result<User, SessionError>;

    /// Silently renew a user's tokens
    async fn refresh(&self, user: &User) -> Result<User, SessionError>;
}

/// Persisted-user continuity across restarts (page reloads in the original
/// deployment)
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn load(&self) -> anyhow::Result<Option<User>>;

    async fn save(&self, user: &User) -> anyhow::Result<()>;

    async fn clear(&self) -> anyhow::Result<()>;
}

/// Fire-and-forget hook into the profile-enrichment pipeline. Failures stay
/// inside the pipeline's own error boundary and never reach session state.
pub trait EnrichmentTrigger: Send + Sync {
    fn trigger(&self, user: &User, metadata: &RequestMetadata);
}
