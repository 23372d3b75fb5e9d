//! Direct transport: owns the listening socket and terminates TLS itself.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info};

use crate::config::DirectTransportConfig;
use crate::ports::{RequestHandler, TransportAdapter, TransportError};

use super::{nest_under_prefix, notification_router};

/// TLS-terminating transport bound to a configured port.
pub struct DirectAdapter {
    config: DirectTransportConfig,
    server: Mutex<Option<ServerHandle>>,
}

struct ServerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DirectAdapter {
    pub fn new(config: DirectTransportConfig) -> Self {
        Self {
            config,
            server: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TransportAdapter for DirectAdapter {
    fn external_host(&self) -> String {
        if self.config.port == 443 {
            self.config.host.clone()
        } else {
            format!("{}:{}", self.config.host, self.config.port)
        }
    }

    fn path_prefix(&self) -> String {
        self.config.path_prefix.clone()
    }

    async fn start(&self, handler: RequestHandler) -> Result<(), TransportError> {
        let mut server = self.server.lock().await;
        if server.is_some() {
            return Err(TransportError::AlreadyStarted);
        }

        // Certificate problems and bind conflicts are both fatal here,
        // before any request is accepted.
        let tls_config = load_tls_config(&self.config.cert_path, &self.config.key_path)?;
        let listener = TcpListener::bind(("0.0.0.0", self.config.port))
            .await
            .map_err(|e| TransportError::Bind(format!("port {}: {e}", self.config.port)))?;

        let acceptor = TlsAcceptor::from(Arc::new(tls_config));
        let app = nest_under_prefix(&self.config.path_prefix, notification_router(handler));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(port = self.config.port, "direct transport listening");
        let task = tokio::spawn(accept_loop(listener, acceptor, app, shutdown_rx));

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
            info!("direct transport stopped");
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    app: axum::Router,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        debug!(error = %e, "accept failed");
                        continue;
                    }
                };
                let acceptor = acceptor.clone();
                let app = app.clone();
                // In-flight connections run to completion after shutdown.
                tokio::spawn(async move {
                    let tls_stream = match acceptor.accept(stream).await {
                        Ok(tls) => tls,
                        Err(e) => {
                            debug!(peer = %peer, error = %e, "TLS handshake failed");
                            return;
                        }
                    };
                    let service = TowerToHyperService::new(app);
                    if let Err(e) = hyper::server::conn::http1::Builder::new()
                        .serve_connection(TokioIo::new(tls_stream), service)
                        .await
                    {
                        debug!(peer = %peer, error = %e, "connection error");
                    }
                });
            }
            _ = shutdown.changed() => break,
        }
    }
}

fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<ServerConfig, TransportError> {
    let cert_file = File::open(cert_path)
        .map_err(|e| TransportError::Tls(format!("{}: {e}", cert_path.display())))?;
    let mut reader = BufReader::new(cert_file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TransportError::Tls(format!("invalid certificate: {e}")))?;
    if certs.is_empty() {
        return Err(TransportError::Tls(format!(
            "no certificates found in {}",
            cert_path.display()
        )));
    }

    let key_file = File::open(key_path)
        .map_err(|e| TransportError::Tls(format!("{}: {e}", key_path.display())))?;
    let mut reader = BufReader::new(key_file);
    let key = rustls_pemfile::private_key(&mut reader)
        .map_err(|e| TransportError::Tls(format!("invalid private key: {e}")))?
        .ok_or_else(|| {
            TransportError::Tls(format!("no private key found in {}", key_path.display()))
        })?;

    ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| TransportError::Tls(e.to_string()))
}
