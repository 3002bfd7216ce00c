//! ProxyServer struct and main run loop.
//!
//! The server owns all per-process state (instruction queues, control-plane
//! client, pooled upstream client) and shares it with every connection task.

use super::client::{create_http_client, HttpClient};
use super::handler::{handle_request, RequestHandlerContext};
use super::injector::FaultInjector;
use super::metrics_server::MetricsServer;
use super::response_ext::ProxyBody;
use crate::config::{parse_host_url, Config};
use crate::control_plane::{EmulatorClient, RetryTestRegistry};
use crate::operation_manager::OperationManager;
use crate::request_type::RequestType;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// The main proxy server struct.
pub struct ProxyServer {
    config: Arc<Config>,
    target_base: String,
    injector: FaultInjector,
    http_client: HttpClient,
}

impl ProxyServer {
    /// Create a new ProxyServer talking to the control plane over HTTP.
    pub fn new(config: Config) -> Result<Self, anyhow::Error> {
        let registry = EmulatorClient::new(
            config.control_plane_host(),
            Duration::from_secs(config.control_plane.timeout_secs),
        )?;
        Ok(Self::with_registry(config, Arc::new(registry)))
    }

    /// Create a new ProxyServer with a caller-supplied retry test registry.
    pub fn with_registry(config: Config, registry: Arc<dyn RetryTestRegistry>) -> Self {
        let operations = OperationManager::new(&config.retry_config);
        for request_type in RequestType::ALL {
            if operations.is_configured(request_type) {
                info!("Retry rules armed for {}", request_type);
            }
        }
        let http_client = create_http_client(&config.connection_pool);

        Self {
            target_base: config.target_base().to_string(),
            injector: FaultInjector::new(operations, registry),
            http_client,
            config: Arc::new(config),
        }
    }

    /// Bind the configured port, start the optional metrics endpoint and
    /// serve until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.listen.port));
        let listener = TcpListener::bind(addr).await?;

        if let Some(ref metrics) = self.config.metrics {
            let metrics_addr = SocketAddr::from(([0, 0, 0, 0], metrics.port));
            tokio::spawn(async move {
                if let Err(e) = MetricsServer::new(metrics_addr).run().await {
                    error!("Metrics server error: {}", e);
                }
            });
        }

        self.serve(listener, shutdown_signal()).await
    }

    /// Accept connections on `listener` until `shutdown` completes, then
    /// drain in-flight requests for at most the configured shutdown timeout.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), anyhow::Error>
    where
        F: Future<Output = ()> + Send,
    {
        let local_addr = listener.local_addr()?;
        info!("Listening on http://{}", local_addr);
        match parse_host_url(&self.target_base) {
            Ok(protocol) => info!("Proxying to {} ({})", self.target_base, protocol.as_str()),
            Err(_) => info!("Proxying to {}", self.target_base),
        }
        info!("Loaded {} retry rules", self.config.retry_config.len());

        let drain_timeout = Duration::from_secs(self.config.shutdown_timeout_secs);
        let server = Arc::new(self);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote_addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };
                    let server = Arc::clone(&server);
                    let shutdown_rx = shutdown_tx.subscribe();
                    connections.spawn(serve_connection(server, stream, remote_addr, shutdown_rx));
                }
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
            }

            // Reap finished connection tasks
            while connections.try_join_next().is_some() {}
        }

        drop(listener);
        let _ = shutdown_tx.send(());

        info!(
            active_connections = connections.len(),
            timeout_seconds = drain_timeout.as_secs(),
            "Draining in-flight requests"
        );

        let drained = tokio::time::timeout(drain_timeout, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        match drained {
            Ok(()) => info!("All connections drained, shutdown complete"),
            Err(_) => {
                warn!(
                    remaining = connections.len(),
                    "Shutdown timeout reached, aborting remaining connections"
                );
                connections.abort_all();
            }
        }

        Ok(())
    }

    /// Builds the handler context and delegates to the handler module.
    async fn handle_request_internal(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<ProxyBody>, Infallible> {
        let ctx = RequestHandlerContext {
            http_client: &self.http_client,
            injector: &self.injector,
            target_base: &self.target_base,
        };

        handle_request(ctx, req).await
    }
}

async fn serve_connection(
    server: Arc<ProxyServer>,
    stream: tokio::net::TcpStream,
    remote_addr: SocketAddr,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| {
        let server = Arc::clone(&server);
        async move { server.handle_request_internal(req).await }
    });

    let conn = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(conn);

    let result = tokio::select! {
        res = conn.as_mut() => res,
        _ = shutdown_rx.recv() => {
            // Finish the in-flight request, then close
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    if let Err(err) = result {
        debug!("Error serving connection from {}: {}", remote_addr, err);
    }
}

/// Completes on the first SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
