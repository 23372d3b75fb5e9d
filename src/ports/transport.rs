//! Transport adapter port.
//!
//! A transport adapter is how the listener gets exposed to the network:
//! an owned TLS server, a plain socket behind a terminating proxy, a
//! reverse-proxy hand-off, or a router mounted into a host application.
//! All four variants sit behind this one capability set; each owns its own
//! resources (socket, TLS context) with no shared base state.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::{HeaderMap, StatusCode};
use thiserror::Error;

/// A raw inbound HTTP request as the listener sees it.
#[derive(Debug, Clone)]
pub struct RawRequest {
    /// Path relative to the adapter's mount point (`/<callback-id>`).
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// The listener's answer, committed before any handler work runs.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

impl RawResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }
}

/// The request-handling function an adapter forwards every request to.
pub type RequestHandler =
    Arc<dyn Fn(RawRequest) -> BoxFuture<'static, RawResponse> + Send + Sync>;

/// Fatal transport failures, surfaced at `start()`.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind listener: {0}")]
    Bind(String),

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("environment variable {0} is missing or not a valid port")]
    MissingPort(String),

    #[error("transport already started")]
    AlreadyStarted,
}

/// Capability set shared by all transport variants.
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    /// Externally reachable hostname (with port when non-standard), used to
    /// compute callback URLs handed to the remote service.
    fn external_host(&self) -> String;

    /// Path prefix the listener is mounted under, `""` or `/like/this`.
    fn path_prefix(&self) -> String;

    /// Begin accepting requests and forward each to `handler`.
    ///
    /// Bind and certificate failures are fatal here; per-request handler
    /// failures are the adapter's to contain (5xx, never a crash).
    async fn start(&self, handler: RequestHandler) -> Result<(), TransportError>;

    /// Stop accepting new requests; in-flight requests complete.
    async fn stop(&self);
}
