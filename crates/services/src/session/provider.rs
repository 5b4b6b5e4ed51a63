use super::ports::{IdentityClient, SessionError, User};
use crate::config_store::IdentityProviderConfig;
use async_trait::async_trait;
use chrono::Utc;
use oauth2::{
    basic::BasicTokenType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    RedirectUrl, RefreshToken, Scope, StandardTokenResponse, TokenResponse, TokenUrl,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Scopes requested on sign-in. `openid profile email` drive the token
/// claims; `User.Read` is needed by the directory-enrichment stage.
pub const DEFAULT_SCOPES: &[&str] = &["openid", "profile", "email", "User.Read"];

/// Microsoft's token endpoint returns the ID token alongside the standard
/// fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl oauth2::ExtraTokenFields for IdTokenFields {}

type MsTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

// Type alias for a fully configured OAuth client
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    MsTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    oauth2::EndpointSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointSet,
>;

/// Code-redirect client against the Microsoft identity platform (v2.0
/// endpoints)
pub struct MicrosoftIdentityClient {
    authority: String,
    tenant: String,
    origin: String,
    scopes: Vec<String>,
    oauth: ConfiguredClient,
    http_client: Client,
}

impl MicrosoftIdentityClient {
    pub fn new(config: &IdentityProviderConfig, origin: &str) -> Result<Self, SessionError> {
        let tenant = config.tenant.clone();
        let origin = origin.trim_end_matches('/').to_string();
        let authority = format!("https://login.microsoftonline.com/{tenant}/v2.0");

        let auth_url = AuthUrl::new(format!(
            "https://login.microsoftonline.com/{tenant}/oauth2/v2.0/authorize"
        ))
        .map_err(|e| SessionError::InvalidEndpoint(format!("Invalid authorize URL: {e}")))?;

        let token_url = TokenUrl::new(format!(
            "https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token"
        ))
        .map_err(|e| SessionError::InvalidEndpoint(format!("Invalid token URL: {e}")))?;

        let redirect_url = RedirectUrl::new(format!("{origin}/auth-callback"))
            .map_err(|e| SessionError::InvalidEndpoint(format!("Invalid redirect URL: {e}")))?;

        let oauth = oauth2::Client::new(ClientId::new(config.client_id.clone()));
        let oauth = match &config.client_secret {
            Some(secret) => oauth.set_client_secret(ClientSecret::new(secret.clone())),
            None => oauth,
        };
        let oauth: ConfiguredClient = oauth
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        debug!(tenant, "Identity client configured");

        Ok(Self {
            authority,
            tenant,
            origin,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            oauth,
            http_client: Client::new(),
        })
    }

    fn user_from_token(
        &self,
        token: &MsTokenResponse,
        previous: Option<&User>,
    ) -> Result<User, SessionError> {
        let id_token = match (&token.extra_fields().id_token, previous) {
            (Some(fresh), _) => fresh.clone(),
            (None, Some(prev)) => prev.id_token.clone(),
            (None, None) => {
                return Err(SessionError::TokenExchange(
                    "Token response carried no id_token".to_string(),
                ))
            }
        };

        let claims = if token.extra_fields().id_token.is_some() {
            decode_claims(&id_token)?
        } else {
            previous
                .map(|p| p.claims.clone())
                .unwrap_or_default()
        };

        let subject = claims
            .get("sub")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SessionError::TokenExchange("id_token has no sub claim".to_string())
            })?
            .to_string();

        let expires_in = token
            .expires_in()
            .map(|d| d.as_secs() as i64)
            .unwrap_or(3600);

        Ok(User {
            subject,
            claims,
            id_token,
            access_token: token.access_token().secret().clone(),
            refresh_token: token
                .refresh_token()
                .map(|t| t.secret().clone())
                .or_else(|| previous.and_then(|p| p.refresh_token.clone())),
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in),
        })
    }
}

#[async_trait]
impl IdentityClient for MicrosoftIdentityClient {
    fn authority(&self) -> &str {
        &self.authority
    }

    fn signin_redirect(&self) -> Result<Url, SessionError> {
        let (url, _csrf_state) = self
            .oauth
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes.iter().map(|s| Scope::new(s.clone())))
            .url();

        Ok(url)
    }

    fn signout_redirect(&self) -> Result<Url, SessionError> {
        let mut url = Url::parse(&format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/logout",
            self.tenant
        ))
        .map_err(|e| SessionError::Signout(format!("Invalid logout URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("post_logout_redirect_uri", &format!("{}/", self.origin));

        Ok(url)
    }

    async fn exchange_code(&self, code: &str) -> Result<User, SessionError> {
        debug!("Exchanging authorization code for tokens");

        let token = self
            .oauth
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| SessionError::TokenExchange(format!("Token exchange failed: {e}")))?;

        self.user_from_token(&token, None)
    }

    async fn refresh(&self, user: &User) -> Result<User, SessionError> {
        let refresh_token = user
            .refresh_token
            .as_ref()
            .ok_or_else(|| SessionError::Renew("No refresh token available".to_string()))?;

        let token = self
            .oauth
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| SessionError::Renew(format!("Refresh failed: {e}")))?;

        self.user_from_token(&token, Some(user))
            .map_err(|e| SessionError::Renew(e.to_string()))
    }
}

/// Read the ID-token payload. Signature verification is delegated to the
/// provider round trip; only the claims are extracted here.
fn decode_claims(id_token: &str) -> Result<serde_json::Map<String, Value>, SessionError> {
    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::RS256);
    validation.algorithms = vec![
        jsonwebtoken::Algorithm::RS256,
        jsonwebtoken::Algorithm::HS256,
    ];
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let data = jsonwebtoken::decode::<serde_json::Map<String, Value>>(
        id_token,
        &jsonwebtoken::DecodingKey::from_secret(&[]),
        &validation,
    )
    .map_err(|e| SessionError::TokenExchange(format!("Failed to decode id_token: {e}")))?;

    Ok(data.claims)
}
