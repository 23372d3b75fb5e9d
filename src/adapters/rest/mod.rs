//! REST adapter for the remote subscription API.

mod client;

pub use client::{RestClientConfig, RestSubscriptionClient};
