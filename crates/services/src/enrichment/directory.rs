use super::ports::{DirectoryGateway, DirectoryProfile, TransportError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Microsoft Graph directory client
pub struct GraphDirectoryClient {
    http_client: Client,
    base_url: Url,
}

impl GraphDirectoryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let base_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| TransportError::MalformedResponse(format!("Invalid base URL: {e}")))?;

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn from_config(config: &config::DirectoryConfig) -> Result<Self, TransportError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path)
            .map_err(|e| TransportError::MalformedResponse(format!("Invalid endpoint: {e}")))
    }
}

#[async_trait]
impl DirectoryGateway for GraphDirectoryClient {
    async fn fetch_profile(&self, access_token: &str) -> Result<DirectoryProfile, TransportError> {
        debug!("Fetching directory profile");

        let response = self
            .http_client
            .get(self.endpoint("me")?)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))
    }

    async fn fetch_photo_url(
        &self,
        access_token: &str,
    ) -> Result<Option<String>, TransportError> {
        let endpoint = self.endpoint("me/photo/$value")?;

        let response = self
            .http_client
            .get(endpoint.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !response.status().is_success() {
            // Not every account has a photo
            debug!(status = response.status().as_u16(), "No directory photo available");
            return Ok(None);
        }

        Ok(Some(endpoint.to_string()))
    }
}
