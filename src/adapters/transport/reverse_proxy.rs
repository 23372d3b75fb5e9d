//! Reverse-proxy transport: binds no socket of its own.
//!
//! A trusted upstream proxy terminates TLS and forwards requests into the
//! process; the integration point is [`ReverseProxyAdapter::router`], which
//! the proxy-facing server drives. Host resolution trusts the forwarding
//! headers the proxy sets: requests whose `x-forwarded-host` does not name
//! the configured public hostname are rejected as having bypassed the
//! proxy.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use http::StatusCode;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::ReverseProxyTransportConfig;
use crate::ports::{RequestHandler, TransportAdapter, TransportError};

use super::{nest_under_prefix, notification_router, slot_handler};

/// Transport fed by a trusted reverse proxy instead of an owned socket.
pub struct ReverseProxyAdapter {
    config: ReverseProxyTransportConfig,
    slot: Arc<RwLock<Option<RequestHandler>>>,
}

#[derive(Clone)]
struct ProxyPolicy {
    expected_host: String,
    require_forwarded_host: bool,
}

impl ReverseProxyAdapter {
    pub fn new(config: ReverseProxyTransportConfig) -> Self {
        Self {
            config,
            slot: Arc::new(RwLock::new(None)),
        }
    }

    /// Router for the proxy-facing server to mount.
    ///
    /// Routes `POST /<prefix>/<callback-id>` (the full path as the proxy
    /// forwards it). Until `start()` runs, requests answer 503.
    pub fn router(&self) -> Router {
        let policy = ProxyPolicy {
            expected_host: self.config.host.clone(),
            require_forwarded_host: self.config.require_forwarded_host,
        };
        let inner = notification_router(slot_handler(Arc::clone(&self.slot)))
            .layer(middleware::from_fn_with_state(policy, require_proxy));
        nest_under_prefix(&self.config.path_prefix, inner)
    }
}

async fn require_proxy(
    State(policy): State<ProxyPolicy>,
    request: Request,
    next: Next,
) -> Response {
    if policy.require_forwarded_host {
        let forwarded_host = request
            .headers()
            .get("x-forwarded-host")
            .and_then(|value| value.to_str().ok());
        match forwarded_host {
            Some(host) if host == policy.expected_host => {}
            other => {
                warn!(
                    forwarded_host = ?other,
                    expected = %policy.expected_host,
                    "request did not come through the trusted proxy"
                );
                return StatusCode::FORBIDDEN.into_response();
            }
        }
    }
    next.run(request).await
}

#[async_trait]
impl TransportAdapter for ReverseProxyAdapter {
    fn external_host(&self) -> String {
        self.config.host.clone()
    }

    fn path_prefix(&self) -> String {
        self.config.path_prefix.clone()
    }

    async fn start(&self, handler: RequestHandler) -> Result<(), TransportError> {
        let mut slot = self.slot.write().await;
        if slot.is_some() {
            return Err(TransportError::AlreadyStarted);
        }
        *slot = Some(handler);
        info!(host = %self.config.host, "reverse-proxy transport accepting forwarded requests");
        Ok(())
    }

    async fn stop(&self) {
        // New requests get 503; requests already holding the handler clone
        // run to completion.
        let mut slot = self.slot.write().await;
        if slot.take().is_some() {
            info!("reverse-proxy transport stopped");
        }
    }
}
