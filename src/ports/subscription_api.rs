//! Port for the remote subscription REST API.
//!
//! The listener consumes this contract to create and delete subscriptions;
//! `adapters::rest` ships the reqwest implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Condition;

/// Webhook transport block sent with a create request.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookTransport {
    /// Always `"webhook"`; present for forward compatibility.
    pub method: String,
    /// Externally reachable callback URL for this subscription.
    pub callback: String,
    /// Shared secret the remote service will sign deliveries with.
    pub secret: String,
}

impl WebhookTransport {
    pub fn new(callback: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            method: "webhook".to_string(),
            callback: callback.into(),
            secret: secret.into(),
        }
    }
}

/// Request to create a remote subscription.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSubscriptionRequest {
    #[serde(rename = "type")]
    pub event_type: String,
    pub version: String,
    pub condition: Condition,
    pub transport: WebhookTransport,
}

/// The remote service's view of a subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSubscription {
    pub id: String,
    pub status: String,
}

/// Failure talking to the remote API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connect, DNS, timeout).
    #[error("request failed: {0}")]
    Http(String),

    /// The API answered with a non-success status.
    #[error("remote API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not match the documented shape.
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

/// Operations the listener needs from the remote subscription API.
#[async_trait]
pub trait SubscriptionApi: Send + Sync {
    /// Create a subscription; returns the remote id and initial status.
    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<RemoteSubscription, ApiError>;

    /// Delete a subscription by its remote id.
    async fn delete_subscription(&self, remote_id: &str) -> Result<(), ApiError>;
}
