//! Webhook listener orchestration.
//!
//! The listener owns the registry, deduplication cache, and dispatcher for
//! its whole lifetime, binds to one transport adapter, and implements the
//! inbound request protocol: challenge handshake, notification, revocation.
//!
//! ## Verification order
//!
//! Every inbound request goes through the same pipeline before any branch
//! on message type, and before the body is parsed into anything typed:
//!
//! 1. Registry lookup by the callback id in the path (404 if unknown)
//! 2. HMAC signature check, constant-time (403)
//! 3. Timestamp freshness window (403)
//! 4. Deduplication (duplicates acknowledged with 200, no redispatch)
//!
//! Challenges are verified identically to notifications; the remote service
//! signs them with the same per-subscription secret. They bypass the
//! deduplication step: echoing a challenge token invokes no handler, and a
//! retried challenge whose first echo was lost must still receive the token
//! or the handshake can never complete.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use http::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{ListenerConfig, VerificationConfig};
use crate::domain::{
    derive_callback_id, signature, Condition, DeduplicationCache, MessageType,
    NotificationEnvelope, RevocationNotice, RevocationReason, Subscription, SubscriptionEntry,
    SubscriptionRegistry, SubscriptionStatus, VerificationError,
};
use crate::ports::{
    ApiError, CreateSubscriptionRequest, EventHandler, RawRequest, RawResponse, RequestHandler,
    SubscriptionApi, TransportAdapter, TransportError, WebhookTransport,
};

use super::dispatcher::EventDispatcher;

/// Failures surfaced to callers of the listener's own operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The remote subscription API call failed.
    #[error("remote API call failed: {0}")]
    Api(#[from] ApiError),

    /// The transport adapter could not start or stop.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No local subscription with this callback id.
    #[error("no subscription registered for callback id {0}")]
    UnknownSubscription(String),
}

/// Webhook event-subscription listener.
///
/// Explicitly constructed and torn down; owns all of its shared state, so
/// multiple listeners in one process (as in tests) never interfere.
pub struct WebhookListener {
    registry: SubscriptionRegistry,
    dedup: DeduplicationCache,
    dispatcher: EventDispatcher,
    api: Arc<dyn SubscriptionApi>,
    transport: Arc<dyn TransportAdapter>,
    verification: VerificationConfig,
}

impl WebhookListener {
    pub fn new(
        api: Arc<dyn SubscriptionApi>,
        transport: Arc<dyn TransportAdapter>,
        config: ListenerConfig,
    ) -> Self {
        Self {
            registry: SubscriptionRegistry::new(),
            dedup: DeduplicationCache::new(config.dedup.retention(), config.dedup.max_entries),
            dispatcher: EventDispatcher::new(),
            api,
            transport,
            verification: config.verification,
        }
    }

    /// Start accepting inbound requests on the transport adapter.
    pub async fn start(self: &Arc<Self>) -> Result<(), ListenerError> {
        let listener = Arc::clone(self);
        let handler: RequestHandler = Arc::new(move |request| {
            let listener = Arc::clone(&listener);
            Box::pin(async move { listener.handle_request(request).await })
        });
        self.transport.start(handler).await?;
        info!(
            host = %self.transport.external_host(),
            prefix = %self.transport.path_prefix(),
            "listener started"
        );
        Ok(())
    }

    /// Stop the transport adapter gracefully.
    ///
    /// Existing subscriptions stay active on the remote service; callers
    /// that want them gone must unsubscribe each explicitly.
    pub async fn stop(&self) {
        self.transport.stop().await;
        info!("listener stopped");
    }

    /// Subscribe to an event, routing payloads to a typed async callback.
    ///
    /// Returns the callback id identifying the subscription locally.
    pub async fn subscribe<E, F, Fut>(
        &self,
        event_type: &str,
        version: &str,
        condition: Condition,
        callback: F,
    ) -> Result<String, ListenerError>
    where
        E: DeserializeOwned + Send + 'static,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.subscribe_raw(event_type, version, condition, crate::ports::typed(callback))
            .await
    }

    /// Subscribe with a pre-built handler.
    ///
    /// Generates a fresh secret, creates the remote subscription with a
    /// callback URL computed from the transport adapter, and registers the
    /// subscription as `Pending`. On remote failure nothing is registered
    /// locally.
    pub async fn subscribe_raw(
        &self,
        event_type: &str,
        version: &str,
        condition: Condition,
        handler: Arc<dyn EventHandler>,
    ) -> Result<String, ListenerError> {
        let callback_id = derive_callback_id(event_type, version, &condition);
        let secret = signature::generate_secret();

        let request = CreateSubscriptionRequest {
            event_type: event_type.to_string(),
            version: version.to_string(),
            condition: condition.clone(),
            transport: WebhookTransport::new(
                self.callback_url(&callback_id),
                secret.expose_secret().clone(),
            ),
        };
        let remote = self.api.create_subscription(request).await?;

        self.dispatcher.register(event_type, version, handler).await;
        self.registry
            .register(
                Subscription {
                    callback_id: callback_id.clone(),
                    remote_id: remote.id.clone(),
                    event_type: event_type.to_string(),
                    version: version.to_string(),
                    condition,
                    status: SubscriptionStatus::Pending,
                },
                secret,
            )
            .await;

        info!(
            callback_id = %callback_id,
            remote_id = %remote.id,
            event_type = %event_type,
            "subscription created"
        );
        Ok(callback_id)
    }

    /// Attach a revocation callback to an existing subscription.
    pub async fn on_revocation<F>(&self, callback_id: &str, callback: F) -> bool
    where
        F: Fn(RevocationNotice) + Send + Sync + 'static,
    {
        self.registry
            .set_revocation_handler(callback_id, Arc::new(callback))
            .await
    }

    /// Delete the remote subscription and drop the local entry.
    ///
    /// The local entry is removed even when the remote delete fails, so
    /// local state never leaks indefinitely; the remote error is still
    /// returned so the caller knows the remote side may linger.
    pub async fn unsubscribe(&self, callback_id: &str) -> Result<(), ListenerError> {
        let entry = self
            .registry
            .resolve(callback_id)
            .await
            .ok_or_else(|| ListenerError::UnknownSubscription(callback_id.to_string()))?;

        let result = self
            .api
            .delete_subscription(&entry.subscription.remote_id)
            .await;
        self.registry.remove(callback_id).await;
        self.release_route(&entry.subscription.event_type, &entry.subscription.version)
            .await;

        match result {
            Ok(()) => {
                info!(callback_id = %callback_id, "subscription removed");
                Ok(())
            }
            Err(e) => {
                warn!(
                    callback_id = %callback_id,
                    remote_id = %entry.subscription.remote_id,
                    error = %e,
                    "remote delete failed; local entry removed anyway"
                );
                Err(e.into())
            }
        }
    }

    /// Snapshot of all live subscriptions.
    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.registry.snapshot().await
    }

    /// Handle one raw inbound request; this is the function handed to the
    /// transport adapter.
    pub async fn handle_request(&self, request: RawRequest) -> RawResponse {
        let Some(callback_id) = extract_callback_id(&request.path) else {
            return RawResponse::status(StatusCode::NOT_FOUND);
        };

        let entry = match self.verify(callback_id, &request).await {
            Ok(verified) => verified,
            Err(Verdict::Rejected(error)) => {
                warn!(callback_id = %callback_id, error = %error, "request rejected");
                return RawResponse::status(error.status_code());
            }
            Err(Verdict::Duplicate) => {
                debug!(callback_id = %callback_id, "duplicate message acknowledged");
                return RawResponse::ok("");
            }
        };
        let (entry, envelope) = entry;

        match envelope.message_type {
            MessageType::Challenge => self.handle_challenge(&entry, &envelope).await,
            MessageType::Notification => self.handle_notification(&entry, &envelope).await,
            MessageType::Revocation => self.handle_revocation(&entry, &envelope).await,
        }
    }

    /// Run the verification pipeline for one request.
    async fn verify(
        &self,
        callback_id: &str,
        request: &RawRequest,
    ) -> Result<(SubscriptionEntry, NotificationEnvelope), Verdict> {
        // Unknown ids never reach the HMAC step.
        let entry = self
            .registry
            .resolve(callback_id)
            .await
            .ok_or(Verdict::Rejected(VerificationError::UnknownSubscription))?;

        let envelope = NotificationEnvelope::from_parts(&request.headers, request.body.clone())
            .map_err(Verdict::Rejected)?;

        if !signature::verify_signature(
            &entry.secret,
            &envelope.message_id,
            &envelope.raw_timestamp,
            &envelope.body,
            &envelope.signature,
        ) {
            return Err(Verdict::Rejected(VerificationError::InvalidSignature));
        }

        envelope
            .validate_freshness(
                Utc::now(),
                self.verification.max_age(),
                self.verification.max_clock_skew(),
            )
            .map_err(Verdict::Rejected)?;

        // Challenge retries are answered with the token every time; the
        // echo is idempotent and the remote service may resend after a
        // lost response.
        if envelope.message_type != MessageType::Challenge
            && !self.dedup.check_and_insert(&envelope.message_id).await
        {
            return Err(Verdict::Duplicate);
        }

        Ok((entry, envelope))
    }

    async fn handle_challenge(
        &self,
        entry: &SubscriptionEntry,
        envelope: &NotificationEnvelope,
    ) -> RawResponse {
        let payload: ChallengePayload = match serde_json::from_slice(&envelope.body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    callback_id = %entry.subscription.callback_id,
                    error = %e,
                    "challenge body did not parse"
                );
                return RawResponse::status(StatusCode::FORBIDDEN);
            }
        };

        // A completed handshake is the explicit confirmation signal.
        if self
            .registry
            .mark_enabled(&entry.subscription.callback_id)
            .await
        {
            info!(
                callback_id = %entry.subscription.callback_id,
                "subscription enabled via challenge handshake"
            );
        }
        RawResponse::ok(payload.challenge)
    }

    async fn handle_notification(
        &self,
        entry: &SubscriptionEntry,
        envelope: &NotificationEnvelope,
    ) -> RawResponse {
        if self
            .registry
            .mark_enabled(&entry.subscription.callback_id)
            .await
        {
            info!(
                callback_id = %entry.subscription.callback_id,
                "subscription enabled on first verified notification"
            );
        }

        match serde_json::from_slice::<NotificationPayload>(&envelope.body) {
            Ok(payload) => {
                self.dispatcher
                    .dispatch(&entry.subscription, payload.event)
                    .await;
            }
            Err(e) => {
                // Authentic but undecodable; acknowledging stops redelivery
                // of a payload that will never parse.
                warn!(
                    callback_id = %entry.subscription.callback_id,
                    error = %e,
                    "notification body did not parse; dropped"
                );
            }
        }
        RawResponse::ok("")
    }

    async fn handle_revocation(
        &self,
        entry: &SubscriptionEntry,
        envelope: &NotificationEnvelope,
    ) -> RawResponse {
        let reason = serde_json::from_slice::<RevocationPayload>(&envelope.body)
            .map(|payload| RevocationReason::parse(&payload.subscription.status))
            .unwrap_or_else(|_| RevocationReason::Other("unspecified".to_string()));

        if let Some(removed) = self
            .registry
            .mark_revoked(&entry.subscription.callback_id)
            .await
        {
            info!(
                callback_id = %removed.subscription.callback_id,
                reason = %reason,
                "subscription revoked by remote service"
            );
            self.release_route(
                &removed.subscription.event_type,
                &removed.subscription.version,
            )
            .await;
            if let Some(handler) = removed.revocation_handler {
                let notice = RevocationNotice {
                    callback_id: removed.subscription.callback_id.clone(),
                    event_type: removed.subscription.event_type.clone(),
                    reason,
                };
                // User code runs inline here; a panic must not poison the
                // response, which acknowledges the revocation either way.
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    handler(notice)
                }));
                if outcome.is_err() {
                    error!(
                        callback_id = %removed.subscription.callback_id,
                        "revocation callback panicked"
                    );
                }
            }
        }
        RawResponse::ok("")
    }

    /// Drop the dispatcher route once no live subscription uses it.
    ///
    /// Subscriptions differing only in condition share one route, so the
    /// route survives until the last of them is gone.
    async fn release_route(&self, event_type: &str, version: &str) {
        let still_used = self
            .registry
            .snapshot()
            .await
            .iter()
            .any(|s| s.event_type == event_type && s.version == version);
        if !still_used {
            self.dispatcher.unregister(event_type, version).await;
        }
    }

    fn callback_url(&self, callback_id: &str) -> String {
        let host = self.transport.external_host();
        let prefix = normalize_prefix(&self.transport.path_prefix());
        format!("https://{host}{prefix}/{callback_id}")
    }
}

/// Outcome of the verification pipeline short-circuits.
enum Verdict {
    Rejected(VerificationError),
    Duplicate,
}

#[derive(Debug, Deserialize)]
struct ChallengePayload {
    challenge: String,
}

#[derive(Debug, Deserialize)]
struct NotificationPayload {
    #[serde(default)]
    event: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RevocationPayload {
    subscription: RevokedSubscription,
}

#[derive(Debug, Deserialize)]
struct RevokedSubscription {
    status: String,
}

fn extract_callback_id(path: &str) -> Option<&str> {
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    if segment.is_empty() {
        None
    } else {
        Some(segment)
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
