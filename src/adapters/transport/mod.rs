//! Transport adapter implementations.
//!
//! Four variants behind the `TransportAdapter` port, each owning its own
//! resources:
//!
//! - `DirectAdapter` - owns and terminates TLS on a configured port
//! - `EnvPortAdapter` - plain socket on an environment-supplied port
//! - `ReverseProxyAdapter` - no socket; a trusted proxy forwards requests
//! - `MiddlewareAdapter` - a router mounted into a host application

mod direct;
mod env_port;
mod middleware;
mod reverse_proxy;

pub use direct::DirectAdapter;
pub use env_port::EnvPortAdapter;
pub use middleware::MiddlewareAdapter;
pub use reverse_proxy::ReverseProxyAdapter;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use futures::FutureExt;
use http::{HeaderMap, StatusCode};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::TransportConfig;
use crate::ports::{RawRequest, RequestHandler, TransportAdapter};

/// Build the transport selected by configuration.
pub fn build_transport(config: TransportConfig) -> Arc<dyn TransportAdapter> {
    match config {
        TransportConfig::Direct(c) => Arc::new(DirectAdapter::new(c)),
        TransportConfig::EnvPort(c) => Arc::new(EnvPortAdapter::new(c)),
        TransportConfig::ReverseProxy(c) => Arc::new(ReverseProxyAdapter::new(c)),
        TransportConfig::Middleware(c) => Arc::new(MiddlewareAdapter::new(c)),
    }
}

/// Router every adapter serves: `POST /<callback-id>` into the handler.
pub(crate) fn notification_router(handler: RequestHandler) -> Router {
    Router::new()
        .route("/:callback_id", post(forward))
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}

/// Nest a router under an adapter's path prefix, if any.
pub(crate) fn nest_under_prefix(prefix: &str, router: Router) -> Router {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        router
    } else {
        Router::new().nest(&format!("/{trimmed}"), router)
    }
}

/// A request handler backed by a slot that `start()` fills later.
///
/// Used by the variants that expose a router before (or instead of) owning
/// a server; requests arriving before `start()` get 503.
pub(crate) fn slot_handler(
    slot: Arc<tokio::sync::RwLock<Option<RequestHandler>>>,
) -> RequestHandler {
    Arc::new(move |request| {
        let slot = Arc::clone(&slot);
        Box::pin(async move {
            let handler = { slot.read().await.clone() };
            match handler {
                Some(handler) => handler(request).await,
                None => crate::ports::RawResponse::status(StatusCode::SERVICE_UNAVAILABLE),
            }
        })
    })
}

async fn forward(
    State(handler): State<RequestHandler>,
    Path(callback_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = RawRequest {
        path: format!("/{callback_id}"),
        headers,
        body,
    };

    // A panicking handler must not take the adapter down with it.
    match AssertUnwindSafe(handler(request)).catch_unwind().await {
        Ok(response) => (response.status, response.body).into_response(),
        Err(_) => {
            error!("request handler panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::RawResponse;
    use tower::ServiceExt;

    fn echo_handler() -> RequestHandler {
        Arc::new(|request: RawRequest| {
            Box::pin(async move { RawResponse::ok(request.path) })
        })
    }

    #[tokio::test]
    async fn router_forwards_post_with_path() {
        let app = notification_router(echo_handler());
        let response = app
            .oneshot(
                http::Request::builder()
                    .method("POST")
                    .uri("/abc123")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"/abc123");
    }

    #[tokio::test]
    async fn router_rejects_other_methods() {
        let app = notification_router(echo_handler());
        let response = app
            .oneshot(
                http::Request::builder()
                    .method("GET")
                    .uri("/abc123")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn prefix_nesting() {
        let app = nest_under_prefix("/hooks/", notification_router(echo_handler()));
        let response = app
            .oneshot(
                http::Request::builder()
                    .method("POST")
                    .uri("/hooks/abc123")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn panicking_handler_becomes_500() {
        let handler: RequestHandler = Arc::new(|_request| {
            Box::pin(async move { panic!("handler bug") })
        });
        let app = notification_router(handler);
        let response = app
            .oneshot(
                http::Request::builder()
                    .method("POST")
                    .uri("/abc123")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn empty_slot_answers_503() {
        let slot = Arc::new(tokio::sync::RwLock::new(None));
        let app = notification_router(slot_handler(slot));
        let response = app
            .oneshot(
                http::Request::builder()
                    .method("POST")
                    .uri("/abc123")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
