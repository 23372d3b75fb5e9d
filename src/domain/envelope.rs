//! Inbound message envelope parsing.
//!
//! Every delivery from the remote service carries four verification headers.
//! The envelope is constructed per request from those headers plus the raw
//! body, and discarded after dispatch.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use http::HeaderMap;

use super::error::VerificationError;

/// Header carrying the unique message id.
pub const MESSAGE_ID_HEADER: &str = "hooksub-message-id";
/// Header carrying the RFC 3339 timestamp the message was signed at.
pub const MESSAGE_TIMESTAMP_HEADER: &str = "hooksub-message-timestamp";
/// Header carrying the message type.
pub const MESSAGE_TYPE_HEADER: &str = "hooksub-message-type";
/// Header carrying the `sha256=<hex>` signature.
pub const MESSAGE_SIGNATURE_HEADER: &str = "hooksub-message-signature";

/// The kind of message an inbound request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Callback reachability handshake; the body carries a challenge token.
    Challenge,
    /// An event notification for an enabled or pending subscription.
    Notification,
    /// The remote service has unilaterally ended the subscription.
    Revocation,
}

impl MessageType {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "webhook_callback_verification" => Some(Self::Challenge),
            "notification" => Some(Self::Notification),
            "revocation" => Some(Self::Revocation),
            _ => None,
        }
    }
}

/// A parsed inbound request, before any authenticity decision.
#[derive(Debug, Clone)]
pub struct NotificationEnvelope {
    pub message_id: String,
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
    /// The timestamp exactly as received; the signature covers this string,
    /// not our re-rendering of it.
    pub raw_timestamp: String,
    pub signature: String,
    pub body: Bytes,
}

impl NotificationEnvelope {
    /// Build an envelope from the verification headers and raw body.
    ///
    /// Missing or unparseable headers yield `MalformedRequest`; such a
    /// request cannot be authenticated and is treated like a forgery.
    pub fn from_parts(headers: &HeaderMap, body: Bytes) -> Result<Self, VerificationError> {
        let message_id = header_str(headers, MESSAGE_ID_HEADER)?.to_string();
        let raw_timestamp = header_str(headers, MESSAGE_TIMESTAMP_HEADER)?.to_string();
        let signature = header_str(headers, MESSAGE_SIGNATURE_HEADER)?.to_string();
        let type_str = header_str(headers, MESSAGE_TYPE_HEADER)?;

        let message_type = MessageType::parse(type_str)
            .ok_or_else(|| VerificationError::MalformedRequest(format!(
                "unknown message type: {type_str}"
            )))?;

        let timestamp = DateTime::parse_from_rfc3339(&raw_timestamp)
            .map_err(|_| VerificationError::MalformedRequest("invalid timestamp".to_string()))?
            .with_timezone(&Utc);

        Ok(Self {
            message_id,
            message_type,
            timestamp,
            raw_timestamp,
            signature,
            body,
        })
    }

    /// Check the timestamp against the freshness window.
    ///
    /// Messages older than `max_age` or further than `max_skew` in the
    /// future are rejected; this bounds the window the deduplication cache
    /// has to cover and rejects replays of captured requests.
    pub fn validate_freshness(
        &self,
        now: DateTime<Utc>,
        max_age: Duration,
        max_skew: Duration,
    ) -> Result<(), VerificationError> {
        let age = now - self.timestamp;
        if age > max_age || age < -max_skew {
            return Err(VerificationError::StaleTimestamp);
        }
        Ok(())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, VerificationError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| VerificationError::MalformedRequest(format!("missing header: {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(ts: &str, message_type: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(MESSAGE_ID_HEADER, HeaderValue::from_static("msg-1"));
        map.insert(MESSAGE_TIMESTAMP_HEADER, HeaderValue::from_str(ts).unwrap());
        map.insert(
            MESSAGE_TYPE_HEADER,
            HeaderValue::from_str(message_type).unwrap(),
        );
        map.insert(
            MESSAGE_SIGNATURE_HEADER,
            HeaderValue::from_static("sha256=00"),
        );
        map
    }

    #[test]
    fn parses_all_message_types() {
        for (raw, expected) in [
            ("webhook_callback_verification", MessageType::Challenge),
            ("notification", MessageType::Notification),
            ("revocation", MessageType::Revocation),
        ] {
            let env = NotificationEnvelope::from_parts(
                &headers("2026-01-01T00:00:00Z", raw),
                Bytes::from_static(b"{}"),
            )
            .unwrap();
            assert_eq!(env.message_type, expected);
        }
    }

    #[test]
    fn preserves_raw_timestamp_string() {
        let env = NotificationEnvelope::from_parts(
            &headers("2026-01-01T00:00:00.123Z", "notification"),
            Bytes::new(),
        )
        .unwrap();
        assert_eq!(env.raw_timestamp, "2026-01-01T00:00:00.123Z");
    }

    #[test]
    fn missing_header_is_malformed() {
        let mut map = headers("2026-01-01T00:00:00Z", "notification");
        map.remove(MESSAGE_SIGNATURE_HEADER);
        let err = NotificationEnvelope::from_parts(&map, Bytes::new()).unwrap_err();
        assert!(matches!(err, VerificationError::MalformedRequest(_)));
    }

    #[test]
    fn unknown_message_type_is_malformed() {
        let err = NotificationEnvelope::from_parts(
            &headers("2026-01-01T00:00:00Z", "heartbeat"),
            Bytes::new(),
        )
        .unwrap_err();
        assert!(matches!(err, VerificationError::MalformedRequest(_)));
    }

    #[test]
    fn freshness_window_bounds() {
        let env = NotificationEnvelope::from_parts(
            &headers("2026-01-01T00:00:00Z", "notification"),
            Bytes::new(),
        )
        .unwrap();
        let max_age = Duration::minutes(10);
        let max_skew = Duration::minutes(1);

        let within = env.timestamp + Duration::minutes(9);
        assert!(env.validate_freshness(within, max_age, max_skew).is_ok());

        let too_old = env.timestamp + Duration::minutes(11);
        assert!(matches!(
            env.validate_freshness(too_old, max_age, max_skew),
            Err(VerificationError::StaleTimestamp)
        ));

        let from_future = env.timestamp - Duration::minutes(2);
        assert!(matches!(
            env.validate_freshness(from_future, max_age, max_skew),
            Err(VerificationError::StaleTimestamp)
        ));
    }
}
