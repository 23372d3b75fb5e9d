//! Subscription registry.
//!
//! Maps callback ids to subscriptions, their signing secrets, and their
//! per-subscription revocation callbacks. The registry is owned by one
//! listener instance; multiple listeners (as in tests) never interfere.

use std::collections::HashMap;
use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::RwLock;

use super::subscription::{RevocationReason, Subscription, SubscriptionStatus};

/// A revocation notice handed to the per-subscription revocation callback.
#[derive(Debug, Clone)]
pub struct RevocationNotice {
    pub callback_id: String,
    pub event_type: String,
    pub reason: RevocationReason,
}

/// Callback invoked when the remote service revokes a subscription.
pub type RevocationHandler = Arc<dyn Fn(RevocationNotice) + Send + Sync>;

/// Registry entry: the subscription plus its secret and callbacks.
#[derive(Clone)]
pub struct SubscriptionEntry {
    pub subscription: Subscription,
    /// Shared secret the remote service signs deliveries with. Lives
    /// exactly as long as the entry.
    pub secret: SecretString,
    pub revocation_handler: Option<RevocationHandler>,
}

/// Shared table of live subscriptions.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<HashMap<String, SubscriptionEntry>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a subscription in `Pending` state.
    ///
    /// Idempotent on the callback id: a retried subscribe call overwrites
    /// the previous entry (last write wins; the remote service is the
    /// source of truth for which secret it actually holds).
    pub async fn register(&self, subscription: Subscription, secret: SecretString) {
        let entry = SubscriptionEntry {
            subscription,
            secret,
            revocation_handler: None,
        };
        let mut entries = self.entries.write().await;
        entries.insert(entry.subscription.callback_id.clone(), entry);
    }

    /// Snapshot of the entry for a callback id.
    pub async fn resolve(&self, callback_id: &str) -> Option<SubscriptionEntry> {
        let entries = self.entries.read().await;
        entries.get(callback_id).cloned()
    }

    /// Transition `Pending -> Enabled`. Returns whether a transition happened.
    pub async fn mark_enabled(&self, callback_id: &str) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(callback_id) {
            Some(entry) if entry.subscription.status == SubscriptionStatus::Pending => {
                entry.subscription.status = SubscriptionStatus::Enabled;
                true
            }
            _ => false,
        }
    }

    /// Transition to `Revoked` and remove the entry, purging its secret.
    ///
    /// Returns the removed entry (status already set to `Revoked`) so the
    /// caller can run the revocation callback exactly once. A second
    /// revocation for the same id finds nothing and returns `None`.
    pub async fn mark_revoked(&self, callback_id: &str) -> Option<SubscriptionEntry> {
        let mut entries = self.entries.write().await;
        let mut entry = entries.remove(callback_id)?;
        entry.subscription.status = SubscriptionStatus::Revoked;
        Some(entry)
    }

    /// Remove an entry without a revocation transition (explicit unsubscribe).
    pub async fn remove(&self, callback_id: &str) -> Option<SubscriptionEntry> {
        let mut entries = self.entries.write().await;
        entries.remove(callback_id)
    }

    /// Attach a revocation callback to an existing entry.
    pub async fn set_revocation_handler(
        &self,
        callback_id: &str,
        handler: RevocationHandler,
    ) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(callback_id) {
            Some(entry) => {
                entry.revocation_handler = Some(handler);
                true
            }
            None => false,
        }
    }

    /// Snapshot of all live subscriptions.
    pub async fn snapshot(&self) -> Vec<Subscription> {
        let entries = self.entries.read().await;
        entries.values().map(|e| e.subscription.clone()).collect()
    }
}
