//! Subscription model and callback-id derivation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Opaque matching condition, as an ordered key-value map.
///
/// Ordered so that logically equal conditions serialize and hash
/// identically regardless of insertion order.
pub type Condition = BTreeMap<String, String>;

/// Lifecycle state of a subscription.
///
/// `Pending -> Enabled -> Revoked`; revoked entries are removed from the
/// registry, so no state ever transitions backward out of `Revoked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Created remotely, callback not yet confirmed.
    Pending,
    /// Handshake completed or first verified notification received.
    Enabled,
    /// Terminated by the remote service.
    Revoked,
}

/// Why the remote service revoked a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationReason {
    /// The authorizing user withdrew the grant backing the subscription.
    AuthorizationRevoked,
    /// The subject of the subscription no longer exists.
    UserRemoved,
    /// The callback failed too many deliveries in a row.
    NotificationFailuresExceeded,
    Other(String),
}

impl RevocationReason {
    pub fn parse(status: &str) -> Self {
        match status {
            "authorization_revoked" => Self::AuthorizationRevoked,
            "user_removed" => Self::UserRemoved,
            "notification_failures_exceeded" => Self::NotificationFailuresExceeded,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthorizationRevoked => write!(f, "authorization_revoked"),
            Self::UserRemoved => write!(f, "user_removed"),
            Self::NotificationFailuresExceeded => write!(f, "notification_failures_exceeded"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// A single registered subscription.
///
/// Exclusively owned by the registry; callers get clones of this snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Locally derived id used as the callback path segment and registry key.
    pub callback_id: String,
    /// Id the remote service assigned; used for remote deletion.
    pub remote_id: String,
    pub event_type: String,
    pub version: String,
    pub condition: Condition,
    pub status: SubscriptionStatus,
}

/// Derive the callback id for a subscription.
///
/// The id is a SHA-256 over event type, version, and the canonicalized
/// condition. It is computed before the remote create call so the callback
/// URL can be handed to the remote service, and retried subscribe calls for
/// the same logical subscription converge on the same registry key.
pub fn derive_callback_id(event_type: &str, version: &str, condition: &Condition) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event_type.as_bytes());
    hasher.update(b"|");
    hasher.update(version.as_bytes());
    for (key, value) in condition {
        hasher.update(b"|");
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(pairs: &[(&str, &str)]) -> Condition {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn callback_id_is_deterministic() {
        let cond = condition(&[("broadcaster_id", "42")]);
        let a = derive_callback_id("stream.online", "1", &cond);
        let b = derive_callback_id("stream.online", "1", &cond);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn callback_id_ignores_condition_insertion_order() {
        let mut first = Condition::new();
        first.insert("a".to_string(), "1".to_string());
        first.insert("b".to_string(), "2".to_string());
        let mut second = Condition::new();
        second.insert("b".to_string(), "2".to_string());
        second.insert("a".to_string(), "1".to_string());
        assert_eq!(
            derive_callback_id("t", "1", &first),
            derive_callback_id("t", "1", &second)
        );
    }

    #[test]
    fn callback_id_distinguishes_type_version_and_condition() {
        let cond = condition(&[("broadcaster_id", "42")]);
        let base = derive_callback_id("stream.online", "1", &cond);
        assert_ne!(base, derive_callback_id("stream.offline", "1", &cond));
        assert_ne!(base, derive_callback_id("stream.online", "2", &cond));
        assert_ne!(
            base,
            derive_callback_id("stream.online", "1", &condition(&[("broadcaster_id", "43")]))
        );
    }

    #[test]
    fn revocation_reason_parsing() {
        assert_eq!(
            RevocationReason::parse("authorization_revoked"),
            RevocationReason::AuthorizationRevoked
        );
        assert_eq!(
            RevocationReason::parse("mystery"),
            RevocationReason::Other("mystery".to_string())
        );
    }
}
