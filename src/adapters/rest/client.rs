//! REST client for the remote subscription API.
//!
//! Implements the `SubscriptionApi` port over HTTPS with bearer-token
//! authentication. Request and response shapes live in `ports`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::ports::{ApiError, CreateSubscriptionRequest, RemoteSubscription, SubscriptionApi};

/// Configuration for [`RestSubscriptionClient`].
#[derive(Clone)]
pub struct RestClientConfig {
    /// Base URL of the subscription API, without trailing slash.
    base_url: String,

    /// Bearer token presented on every request.
    token: SecretString,
}

impl RestClientConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: SecretString::new(token.into()),
        }
    }

    /// Point the client at a different base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Create responses arrive wrapped in a `data` array holding the single
/// subscription just created.
#[derive(Deserialize)]
struct CreateResponse {
    data: Vec<RemoteSubscription>,
}

/// `SubscriptionApi` implementation backed by reqwest.
pub struct RestSubscriptionClient {
    config: RestClientConfig,
    http_client: reqwest::Client,
}

impl RestSubscriptionClient {
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn subscriptions_url(&self) -> String {
        format!("{}/subscriptions", self.config.base_url)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl SubscriptionApi for RestSubscriptionClient {
    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<RemoteSubscription, ApiError> {
        debug!(event_type = %request.event_type, version = %request.version, "creating subscription");

        let response = self
            .http_client
            .post(self.subscriptions_url())
            .bearer_auth(self.config.token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;
        let response = Self::check_status(response).await?;

        let envelope: CreateResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        envelope
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Decode("create response carried no subscription".to_string()))
    }

    async fn delete_subscription(&self, remote_id: &str) -> Result<(), ApiError> {
        debug!(remote_id, "deleting subscription");

        let response = self
            .http_client
            .delete(format!("{}/{remote_id}", self.subscriptions_url()))
            .bearer_auth(self.config.token.expose_secret())
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;
        Self::check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let config = RestClientConfig::new("https://api.example.com/", "token");
        let client = RestSubscriptionClient::new(config);
        assert_eq!(
            client.subscriptions_url(),
            "https://api.example.com/subscriptions"
        );
    }

    #[test]
    fn with_base_url_overrides_for_tests() {
        let config = RestClientConfig::new("https://api.example.com", "token")
            .with_base_url("http://127.0.0.1:9999/");
        let client = RestSubscriptionClient::new(config);
        assert_eq!(
            client.subscriptions_url(),
            "http://127.0.0.1:9999/subscriptions"
        );
    }

    #[test]
    fn create_response_decodes_data_envelope() {
        let body = r#"{"data":[{"id":"sub-1","status":"webhook_callback_verification_pending"}]}"#;
        let envelope: CreateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.data.len(), 1);
        assert_eq!(envelope.data[0].id, "sub-1");
    }
}
