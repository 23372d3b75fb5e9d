//! hooksub - Webhook event-subscription listener.
//!
//! Receives signed webhook notifications for remote event subscriptions:
//! answers challenge handshakes, verifies HMAC signatures, deduplicates
//! redeliveries, and dispatches decoded events to registered handlers.
//! Transports range from a TLS-terminating server to a router embedded in
//! an existing application.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{EventDispatcher, ListenerError, WebhookListener};
pub use config::{ListenerConfig, TransportConfig};
pub use domain::{RevocationNotice, Subscription, SubscriptionStatus};
pub use ports::{EventHandler, SubscriptionApi, TransportAdapter};
