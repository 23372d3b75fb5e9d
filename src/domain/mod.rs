//! Domain layer: verification primitives and subscription state.
//!
//! # Module Organization
//!
//! - `envelope` - Inbound message envelope and verification headers
//! - `signature` - HMAC-SHA256 signing, verification, secret generation
//! - `subscription` - Subscription model and callback-id derivation
//! - `registry` - Live subscription table and lifecycle transitions
//! - `dedup` - Message-id deduplication cache
//! - `error` - Verification and dispatch error taxonomy

pub mod dedup;
pub mod envelope;
pub mod error;
pub mod registry;
pub mod signature;
pub mod subscription;

pub use dedup::DeduplicationCache;
pub use envelope::{MessageType, NotificationEnvelope};
pub use error::{DispatchError, VerificationError};
pub use registry::{RevocationHandler, RevocationNotice, SubscriptionEntry, SubscriptionRegistry};
pub use subscription::{
    derive_callback_id, Condition, RevocationReason, Subscription, SubscriptionStatus,
};
