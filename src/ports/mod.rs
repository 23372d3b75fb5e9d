//! Ports - interfaces between the listener and the outside world.
//!
//! - `SubscriptionApi` - the remote REST collaborator used by
//!   subscribe/unsubscribe (implemented by `adapters::rest`)
//! - `EventHandler` - processing contract for verified notifications, with
//!   `typed` to lift an async closure over a caller-owned payload type
//! - `TransportAdapter` - how the listener is exposed to the network
//!   (implemented by `adapters::transport`)

mod event_handler;
mod subscription_api;
mod transport;

pub use event_handler::{typed, EventHandler};
pub use subscription_api::{
    ApiError, CreateSubscriptionRequest, RemoteSubscription, SubscriptionApi, WebhookTransport,
};
pub use transport::{RawRequest, RawResponse, RequestHandler, TransportAdapter, TransportError};
