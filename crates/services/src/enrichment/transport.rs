use super::ports::{InternalProfile, InternalProfileTransport, TransportError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// A reverse proxy that loses its upstream tends to answer with an error
/// page; that must count as a transport failure, not be parsed as JSON.
pub(crate) fn looks_like_html(body: &str) -> bool {
    let trimmed = body.trim_start();
    trimmed
        .get(..9)
        .is_some_and(|p| p.eq_ignore_ascii_case("<!doctype"))
        || trimmed
            .get(..5)
            .is_some_and(|p| p.eq_ignore_ascii_case("<html"))
}

fn parse_profile(body: &str) -> Result<InternalProfile, TransportError> {
    if looks_like_html(body) {
        return Err(TransportError::MalformedResponse(
            "HTML document where JSON was expected".to_string(),
        ));
    }

    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

    InternalProfile::from_value(value)
        .map_err(|e| TransportError::MalformedResponse(e.to_string()))
}

/// Tier A: the same-origin reverse-proxy path, called with the signed-in
/// user's bearer token
pub struct ReverseProxyTransport {
    http_client: Client,
    endpoint: Url,
}

impl ReverseProxyTransport {
    /// Resolve the same-origin proxy path against the application origin
    pub fn from_config(
        origin: &str,
        config: &config::InternalDirectoryConfig,
    ) -> Result<Self, TransportError> {
        let base = if config.proxy_base_url.starts_with('/') {
            format!(
                "{}{}",
                origin.trim_end_matches('/'),
                config.proxy_base_url
            )
        } else {
            config.proxy_base_url.clone()
        };

        let endpoint = Url::parse(&format!(
            "{}{}",
            base.trim_end_matches('/'),
            config.users_me_path
        ))
        .map_err(|e| TransportError::MalformedResponse(format!("Invalid proxy URL: {e}")))?;

        Self::new(endpoint, Duration::from_secs(config.timeout_secs))
    }

    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, TransportError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint,
        })
    }
}

#[async_trait]
impl InternalProfileTransport for ReverseProxyTransport {
    fn name(&self) -> &'static str {
        "reverse-proxy"
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<InternalProfile, TransportError> {
        debug!(endpoint = %self.endpoint, "Fetching internal profile via the reverse proxy");

        let response = self
            .http_client
            .get(self.endpoint.clone())
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        parse_profile(&body)
    }
}

/// Tier B: the server-side function, which repeats the call with elevated
/// credentials outside the browser's constraints
pub struct FunctionTransport {
    http_client: Client,
    endpoint: Url,
    service_key: Option<String>,
}

impl FunctionTransport {
    pub fn from_config(config: &config::InternalDirectoryConfig) -> Result<Self, TransportError> {
        let endpoint = Url::parse(&config.function_url)
            .map_err(|e| TransportError::MalformedResponse(format!("Invalid function URL: {e}")))?;

        Self::new(
            endpoint,
            config.service_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn new(
        endpoint: Url,
        service_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint,
            service_key,
        })
    }
}

#[async_trait]
impl InternalProfileTransport for FunctionTransport {
    fn name(&self) -> &'static str {
        "server-function"
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<InternalProfile, TransportError> {
        debug!(endpoint = %self.endpoint, "Fetching internal profile via the server function");

        let mut request = self
            .http_client
            .post(self.endpoint.clone())
            .json(&serde_json::json!({ "accessToken": access_token }));
        if let Some(key) = &self.service_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        parse_profile(&body)
    }
}

/// Upstream internal-directory call made by the Tier-B function itself,
/// with the elevated credential from static config
pub struct UpstreamDirectoryClient {
    http_client: Client,
    endpoint: Url,
    service_key: Option<String>,
}

impl UpstreamDirectoryClient {
    pub fn from_config(config: &config::InternalDirectoryConfig) -> Result<Self, TransportError> {
        let endpoint = Url::parse(&format!(
            "{}{}",
            config.upstream_base_url.trim_end_matches('/'),
            config.users_me_path
        ))
        .map_err(|e| TransportError::MalformedResponse(format!("Invalid upstream URL: {e}")))?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint,
            service_key: config.service_key.clone(),
        })
    }

    pub async fn fetch_profile(
        &self,
        access_token: &str,
    ) -> Result<InternalProfile, TransportError> {
        debug!(endpoint = %self.endpoint, "Fetching internal profile upstream");

        let mut request = self
            .http_client
            .get(self.endpoint.clone())
            .bearer_auth(access_token)
            .header("Accept", "application/json");
        if let Some(key) = &self.service_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        parse_profile(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_html_sniffing() {
        assert!(looks_like_html("<!DOCTYPE html><html></html>"));
        assert!(looks_like_html("  <!doctype html>"));
        assert!(looks_like_html("<html lang=\"en\">"));
        assert!(looks_like_html("\n<HTML>"));
        assert!(!looks_like_html("{\"email\": \"a@b.c\"}"));
        assert!(!looks_like_html(""));
        assert!(!looks_like_html("<ht")); // too short to be an html prefix
    }

    #[tokio::test]
    async fn test_proxy_transport_parses_json() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/sales-api/v1/users/me")
                    .header("authorization", "Bearer tok")
                    .header("accept", "application/json");
                then.status(200).json_body(serde_json::json!({
                    "displayName": "Sales Rep",
                    "partner_code": "BP-0042",
                    "is_sales_rep": true
                }));
            })
            .await;

        let transport = ReverseProxyTransport::new(
            Url::parse(&server.url("/sales-api/v1/users/me")).unwrap(),
            Duration::from_secs(2),
        )
        .unwrap();

        let profile = transport.fetch_profile("tok").await.unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Sales Rep"));
        assert_eq!(profile.partner_code.as_deref(), Some("BP-0042"));
        assert_eq!(profile.is_sales_rep, Some(true));
        assert_eq!(profile.raw["partner_code"], "BP-0042");
    }

    #[tokio::test]
    async fn test_proxy_transport_rejects_html_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/sales-api/v1/users/me");
                then.status(200)
                    .header("content-type", "text/html")
                    .body("<!DOCTYPE html><html><title>Gateway</title></html>");
            })
            .await;

        let transport = ReverseProxyTransport::new(
            Url::parse(&server.url("/sales-api/v1/users/me")).unwrap(),
            Duration::from_secs(2),
        )
        .unwrap();

        assert!(matches!(
            transport.fetch_profile("tok").await,
            Err(TransportError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_function_transport_posts_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/functions/fetch-internal-user")
                    .json_body(serde_json::json!({ "accessToken": "tok" }));
                then.status(200)
                    .json_body(serde_json::json!({ "email": "rep@contoso.com" }));
            })
            .await;

        let transport = FunctionTransport::new(
            Url::parse(&server.url("/v1/functions/fetch-internal-user")).unwrap(),
            None,
            Duration::from_secs(2),
        )
        .unwrap();

        let profile = transport.fetch_profile("tok").await.unwrap();
        mock.assert_async().await;
        assert_eq!(profile.email.as_deref(), Some("rep@contoso.com"));
    }

    #[tokio::test]
    async fn test_upstream_client_sends_elevated_credential() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/sales-api/v1/users/me")
                    .header("authorization", "Bearer tok")
                    .header("x-api-key", "service-key");
                then.status(200)
                    .json_body(serde_json::json!({ "partner_code": "BP-0042" }));
            })
            .await;

        let client = UpstreamDirectoryClient::from_config(&config::InternalDirectoryConfig {
            upstream_base_url: server.url("/sales-api"),
            users_me_path: "/v1/users/me".to_string(),
            service_key: Some("service-key".to_string()),
            timeout_secs: 2,
            ..Default::default()
        })
        .unwrap();

        let profile = client.fetch_profile("tok").await.unwrap();
        mock.assert_async().await;
        assert_eq!(profile.partner_code.as_deref(), Some("BP-0042"));
    }
}
