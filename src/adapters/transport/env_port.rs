//! Environment-port transport: plain socket on a port taken from the
//! process environment, with TLS terminated by an external proxy.

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::EnvPortTransportConfig;
use crate::ports::{RequestHandler, TransportAdapter, TransportError};

use super::{nest_under_prefix, notification_router};

/// Plain-HTTP transport for platforms that inject the port via environment.
pub struct EnvPortAdapter {
    config: EnvPortTransportConfig,
    server: Mutex<Option<ServerHandle>>,
}

struct ServerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl EnvPortAdapter {
    pub fn new(config: EnvPortTransportConfig) -> Self {
        Self {
            config,
            server: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TransportAdapter for EnvPortAdapter {
    fn external_host(&self) -> String {
        // The terminating proxy serves standard HTTPS; the local port is
        // an internal detail.
        self.config.host.clone()
    }

    fn path_prefix(&self) -> String {
        self.config.path_prefix.clone()
    }

    async fn start(&self, handler: RequestHandler) -> Result<(), TransportError> {
        let mut server = self.server.lock().await;
        if server.is_some() {
            return Err(TransportError::AlreadyStarted);
        }

        let port: u16 = std::env::var(&self.config.variable)
            .ok()
            .and_then(|value| value.parse().ok())
            .ok_or_else(|| TransportError::MissingPort(self.config.variable.clone()))?;

        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| TransportError::Bind(format!("port {port}: {e}")))?;

        let app = nest_under_prefix(&self.config.path_prefix, notification_router(handler));
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        info!(port, variable = %self.config.variable, "env-port transport listening");
        let task = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.changed().await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %e, "server error");
            }
        });

        *server = Some(ServerHandle {
            shutdown: shutdown_tx,
            task,
        });
        Ok(())
    }

    async fn stop(&self) {
        let handle = self.server.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.shutdown.send(true);
            let _ = handle.task.await;
            info!("env-port transport stopped");
        }
    }
}
