//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the listener core to external systems:
//! - `rest` - reqwest client for the remote subscription API
//! - `transport` - the four ways of receiving webhook traffic

pub mod rest;
pub mod transport;

pub use rest::{RestClientConfig, RestSubscriptionClient};
pub use transport::{
    build_transport, DirectAdapter, EnvPortAdapter, MiddlewareAdapter, ReverseProxyAdapter,
};
