//! Event handler port.
//!
//! The dispatcher routes verified notifications to `EventHandler`
//! implementations keyed by event type and version. Callers usually don't
//! implement the trait themselves; `typed` wraps an async closure over the
//! caller's own payload type into a decoder+invoker pair.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;

use crate::domain::DispatchError;

/// Handler for verified event payloads of one event type and version.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Process the raw event payload.
    ///
    /// Failures are logged by the dispatcher and never reach the HTTP
    /// response, which has already been committed as a success.
    async fn handle(&self, payload: serde_json::Value) -> Result<(), DispatchError>;
}

/// Wrap a typed async callback into an [`EventHandler`].
///
/// The payload is deserialized into `E` before the callback runs, so forged
/// or malformed payloads never reach it unverified (the dispatcher only
/// runs after signature verification) or undecoded.
pub fn typed<E, F, Fut>(callback: F) -> Arc<dyn EventHandler>
where
    E: DeserializeOwned + Send + 'static,
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    Arc::new(TypedHandler {
        callback: Arc::new(move |payload: serde_json::Value| -> BoxFuture<'static, Result<(), DispatchError>> {
            let event = serde_json::from_value::<E>(payload);
            match event {
                Ok(event) => {
                    let fut = callback(event);
                    Box::pin(async move {
                        fut.await;
                        Ok(())
                    })
                }
                Err(e) => Box::pin(async move { Err(DispatchError::Decode(e.to_string())) }),
            }
        }),
    })
}

struct TypedHandler {
    #[allow(clippy::type_complexity)]
    callback: Arc<
        dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<(), DispatchError>> + Send + Sync,
    >,
}

#[async_trait]
impl EventHandler for TypedHandler {
    async fn handle(&self, payload: serde_json::Value) -> Result<(), DispatchError> {
        (self.callback)(payload).await
    }
}
