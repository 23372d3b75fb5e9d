//! Event dispatcher.
//!
//! Routes a verified notification payload to the handler registered for its
//! event type and version. Handler execution is fire-and-forget: the HTTP
//! response has already been committed, so failures are logged and isolated
//! per subscription.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, warn};

use crate::domain::{DispatchError, Subscription};
use crate::ports::EventHandler;

/// Lookup table keyed by `(event_type, version)`.
#[derive(Default)]
pub struct EventDispatcher {
    routes: RwLock<HashMap<(String, String), Arc<dyn EventHandler>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for an event type and version.
    ///
    /// Subscriptions with the same type and version (differing only in
    /// condition) share one handler; last registration wins.
    pub async fn register(
        &self,
        event_type: impl Into<String>,
        version: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) {
        let mut routes = self.routes.write().await;
        routes.insert((event_type.into(), version.into()), handler);
    }

    /// Remove the handler for an event type and version.
    ///
    /// Called when the last subscription for the combination goes away, so
    /// the routing table does not retain handlers forever.
    pub async fn unregister(&self, event_type: &str, version: &str) {
        let mut routes = self.routes.write().await;
        routes.remove(&(event_type.to_string(), version.to_string()));
    }

    /// Whether a handler is registered for this type and version.
    pub async fn supports(&self, event_type: &str, version: &str) -> bool {
        let routes = self.routes.read().await;
        routes.contains_key(&(event_type.to_string(), version.to_string()))
    }

    /// Dispatch a payload to the matching handler.
    ///
    /// An unknown type/version combination is logged and dropped; the
    /// request was authentic, so the caller still acknowledges it. The
    /// handler runs on its own task and is never awaited here.
    pub async fn dispatch(&self, subscription: &Subscription, payload: serde_json::Value) {
        let key = (
            subscription.event_type.clone(),
            subscription.version.clone(),
        );
        let handler = {
            let routes = self.routes.read().await;
            routes.get(&key).cloned()
        };

        let Some(handler) = handler else {
            let dropped = DispatchError::UnsupportedEventType {
                event_type: subscription.event_type.clone(),
                version: subscription.version.clone(),
            };
            warn!(
                callback_id = %subscription.callback_id,
                error = %dropped,
                "notification dropped"
            );
            return;
        };

        let callback_id = subscription.callback_id.clone();
        tokio::spawn(async move {
            if let Err(e) = handler.handle(payload).await {
                error!(callback_id = %callback_id, error = %e, "event handler failed");
            }
        });
    }
}
