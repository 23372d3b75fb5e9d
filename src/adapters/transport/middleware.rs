//! Middleware transport: a router the host application mounts wherever it
//! likes. No socket, no TLS, no lifecycle beyond filling the handler slot.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::MiddlewareTransportConfig;
use crate::ports::{RequestHandler, TransportAdapter, TransportError};

use super::{notification_router, slot_handler};

/// Transport embedded into an existing axum application.
///
/// The host app nests [`MiddlewareAdapter::router`] at the path named by
/// `path_prefix`; the prefix itself only feeds callback-URL computation,
/// since the host decides the actual mount point.
pub struct MiddlewareAdapter {
    config: MiddlewareTransportConfig,
    slot: Arc<RwLock<Option<RequestHandler>>>,
}

impl MiddlewareAdapter {
    pub fn new(config: MiddlewareTransportConfig) -> Self {
        Self {
            config,
            slot: Arc::new(RwLock::new(None)),
        }
    }

    /// Router to nest into the host application.
    ///
    /// Routes `POST /<callback-id>` relative to wherever the host mounts
    /// it. Before `start()` requests answer 503.
    pub fn router(&self) -> Router {
        notification_router(slot_handler(Arc::clone(&self.slot)))
    }
}

#[async_trait]
impl TransportAdapter for MiddlewareAdapter {
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
        info!(host = %self.config.host, "middleware transport attached");
        Ok(())
    }

    async fn stop(&self) {
        let mut slot = self.slot.write().await;
        if slot.take().is_some() {
            info!("middleware transport detached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{RawRequest, RawResponse};
    use http::StatusCode;
    use tower::ServiceExt;

    fn adapter() -> MiddlewareAdapter {
        MiddlewareAdapter::new(MiddlewareTransportConfig {
            host: "app.example.com".to_string(),
            path_prefix: "webhooks".to_string(),
        })
    }

    fn post(uri: &str) -> http::Request<axum::body::Body> {
        http::Request::builder()
            .method("POST")
            .uri(uri)
            .body(axum::body::Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn host_app_mounts_router_at_its_own_path() {
        let adapter = adapter();
        adapter
            .start(Arc::new(|request: RawRequest| {
                Box::pin(async move { RawResponse::ok(request.path) })
            }))
            .await
            .unwrap();

        // The mount point need not match path_prefix.
        let host_app = Router::new().nest("/integrations/hooks", adapter.router());
        let response = host_app.oneshot(post("/integrations/hooks/abc")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"/abc");
    }

    #[tokio::test]
    async fn unstarted_adapter_answers_503() {
        let adapter = adapter();
        let response = adapter.router().oneshot(post("/abc")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let adapter = adapter();
        let handler: RequestHandler =
            Arc::new(|_request| Box::pin(async move { RawResponse::ok("") }));
        adapter.start(handler.clone()).await.unwrap();
        assert!(matches!(
            adapter.start(handler).await,
            Err(TransportError::AlreadyStarted)
        ));
    }
}
