//! Notification signature computation and verification.
//!
//! Every message the remote service delivers is signed with HMAC-SHA256 over
//! the concatenation of message id, timestamp, and raw body, keyed with the
//! per-subscription secret. Verification uses constant-time comparison.

use hmac::{Hmac, Mac};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Prefix carried by the signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Length of generated subscription secrets in raw bytes (hex-encoded on the wire).
const SECRET_LEN: usize = 32;

/// Generate a random per-subscription signing secret.
pub fn generate_secret() -> SecretString {
    let mut bytes = [0u8; SECRET_LEN];
    rand::thread_rng().fill(&mut bytes);
    SecretString::new(hex::encode(bytes))
}

/// Compute the signature for a message, in wire format (`sha256=<hex>`).
///
/// The signed payload is `message_id + timestamp + body`, with the timestamp
/// exactly as it appears in the timestamp header.
pub fn compute_signature(
    secret: &SecretString,
    message_id: &str,
    timestamp: &str,
    body: &[u8],
) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message_id.as_bytes());
    mac.update(timestamp.as_bytes());
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// Verify a supplied signature against the expected one for this message.
///
/// Returns `false` for malformed signatures (wrong prefix, invalid hex) as
/// well as for MACs that do not match. Comparison over the decoded MAC bytes
/// is constant-time.
pub fn verify_signature(
    secret: &SecretString,
    message_id: &str,
    timestamp: &str,
    body: &[u8],
    supplied: &str,
) -> bool {
    let Some(supplied_hex) = supplied.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(supplied_mac) = hex::decode(supplied_hex) else {
        return false;
    };

    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message_id.as_bytes());
    mac.update(timestamp.as_bytes());
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    expected.as_slice().ct_eq(supplied_mac.as_slice()).unwrap_u8() == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::new("test_secret_12345".to_string())
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let sig = compute_signature(&secret(), "msg-1", "2026-01-01T00:00:00Z", b"payload");
        assert!(sig.starts_with(SIGNATURE_PREFIX));
        assert!(verify_signature(
            &secret(),
            "msg-1",
            "2026-01-01T00:00:00Z",
            b"payload",
            &sig
        ));
    }

    #[test]
    fn rejects_wrong_secret() {
        let sig = compute_signature(&secret(), "msg-1", "2026-01-01T00:00:00Z", b"payload");
        let other = SecretString::new("another_secret".to_string());
        assert!(!verify_signature(
            &other,
            "msg-1",
            "2026-01-01T00:00:00Z",
            b"payload",
            &sig
        ));
    }

    #[test]
    fn rejects_mutated_body() {
        let sig = compute_signature(&secret(), "msg-1", "2026-01-01T00:00:00Z", b"payload");
        assert!(!verify_signature(
            &secret(),
            "msg-1",
            "2026-01-01T00:00:00Z",
            b"payloae",
            &sig
        ));
    }

    #[test]
    fn rejects_mutated_timestamp() {
        let sig = compute_signature(&secret(), "msg-1", "2026-01-01T00:00:00Z", b"payload");
        assert!(!verify_signature(
            &secret(),
            "msg-1",
            "2026-01-01T00:00:01Z",
            b"payload",
            &sig
        ));
    }

    #[test]
    fn rejects_missing_prefix_and_bad_hex() {
        let sig = compute_signature(&secret(), "msg-1", "2026-01-01T00:00:00Z", b"payload");
        let bare = sig.strip_prefix(SIGNATURE_PREFIX).unwrap();
        assert!(!verify_signature(
            &secret(),
            "msg-1",
            "2026-01-01T00:00:00Z",
            b"payload",
            bare
        ));
        assert!(!verify_signature(
            &secret(),
            "msg-1",
            "2026-01-01T00:00:00Z",
            b"payload",
            "sha256=zzzz"
        ));
    }

    #[test]
    fn generated_secrets_are_unique_and_hex() {
        let a = generate_secret();
        let b = generate_secret();
        assert_eq!(a.expose_secret().len(), 64);
        assert_ne!(a.expose_secret(), b.expose_secret());
        assert!(a.expose_secret().chars().all(|c| c.is_ascii_hexdigit()));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Flipping any single bit of the signature hex must fail verification.
            #[test]
            fn any_signature_bit_flip_is_rejected(pos in 0usize..64, bit in 0u8..4) {
                let sig = compute_signature(&secret(), "msg-1", "2026-01-01T00:00:00Z", b"payload");
                let mut bytes = sig.into_bytes();
                let idx = SIGNATURE_PREFIX.len() + pos;
                // Stay within the hex alphabet so the failure is the MAC, not the decoder.
                let flipped = match bytes[idx] ^ (1 << bit) {
                    c if (c as char).is_ascii_hexdigit() => c,
                    _ => if bytes[idx] == b'0' { b'1' } else { b'0' },
                };
                prop_assume!(flipped != bytes[idx]);
                bytes[idx] = flipped;
                let mutated = String::from_utf8(bytes).unwrap();
                prop_assert!(!verify_signature(
                    &secret(),
                    "msg-1",
                    "2026-01-01T00:00:00Z",
                    b"payload",
                    &mutated
                ));
            }

            /// Any body differing from the signed one must fail verification.
            #[test]
            fn any_other_body_is_rejected(body in proptest::collection::vec(any::<u8>(), 0..64)) {
                prop_assume!(body.as_slice() != b"payload");
                let sig = compute_signature(&secret(), "msg-1", "2026-01-01T00:00:00Z", b"payload");
                prop_assert!(!verify_signature(
                    &secret(),
                    "msg-1",
                    "2026-01-01T00:00:00Z",
                    &body,
                    &sig
                ));
            }
        }
    }
}
