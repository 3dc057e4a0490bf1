use crate::Result;
use crate::common::server::{admit, serve_router};
use crate::common::{ConnectionTracker, OriginPolicy, RelayServer, ServerConfig};
use axum::Router;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::get;
use http::HeaderMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};

/// WebSocket echo server
///
/// Serves `GET /echo`: every text or binary message a client sends is
/// written straight back with the same type and payload.
///
/// # Examples
///
/// ```no_run
/// use wsrelay::common::{RelayServer, ServerConfig};
/// use wsrelay::echo::EchoServer;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = EchoServer::new(ServerConfig::with_port(8080));
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct EchoServer {
    config: ServerConfig,
    connections: ConnectionTracker,
    shutdown_signal: Arc<broadcast::Sender<()>>,
}

#[derive(Clone)]
struct EchoState {
    origins: Arc<OriginPolicy>,
    connections: ConnectionTracker,
    max_message_size: usize,
    shutdown: CancellationToken,
}

impl EchoServer {
    /// Creates a new echo server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_signal, _) = broadcast::channel(1);
        Self {
            connections: ConnectionTracker::new(config.max_connections),
            config,
            shutdown_signal: Arc::new(shutdown_signal),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Number of currently upgraded connections
    pub fn active_connections(&self) -> usize {
        self.connections.active()
    }

    fn router(&self, shutdown: CancellationToken) -> Router {
        let state = EchoState {
            origins: Arc::new(self.config.origins.clone()),
            connections: self.connections.clone(),
            max_message_size: self.config.max_message_size,
            shutdown,
        };
        Router::new()
            .route("/echo", get(echo_upgrade))
            .with_state(state)
    }
}

async fn echo_upgrade(
    State(state): State<EchoState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    upgrade: std::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let (upgrade, guard) = match admit(
        upgrade,
        &headers,
        &state.origins,
        &state.connections,
        peer,
        state.max_message_size,
    ) {
        Ok(admitted) => admitted,
        Err(rejection) => return rejection,
    };

    let span = tracing::info_span!("connection", %peer, current = guard.current());
    let shutdown = state.shutdown.clone();
    upgrade
        .on_failed_upgrade(move |e| warn!(%peer, error = %e, "Upgrade failed"))
        .on_upgrade(move |socket| {
            async move {
                let _guard = guard;
                if let Err(e) = handle_echo(socket, shutdown).await {
                    error!(error = %e, "Error handling connection");
                }
            }
            .instrument(span)
        })
}

/// Echoes messages on one upgraded connection until it ends
async fn handle_echo(mut socket: WebSocket, shutdown: CancellationToken) -> Result<()> {
    info!("connected");

    loop {
        let received = tokio::select! {
            received = socket.recv() => received,
            _ = shutdown.cancelled() => {
                info!("Server shutting down, closing connection");
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        };

        let message = match received {
            Some(Ok(message)) => message,
            Some(Err(e)) => return Err(e.into()),
            None => {
                info!("Client closed connection");
                break;
            }
        };

        let size = match &message {
            Message::Text(text) => text.as_str().len(),
            Message::Binary(data) => data.len(),
            Message::Close(_) => {
                info!("Client sent close frame");
                break;
            }
            // Pings are answered by the transport
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        info!(size, binary = matches!(message, Message::Binary(_)), "Received message");
        socket.send(message).await?;
        info!(size, "Echoed message");
    }

    Ok(())
}

impl RelayServer for EchoServer {
    async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    async fn serve(&self, listener: TcpListener) -> Result<()> {
        let shutdown = CancellationToken::new();
        let router = self.router(shutdown.clone());
        serve_router(listener, router, &self.shutdown_signal, shutdown, "echo").await
    }

    fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown_signal.as_ref().clone()
    }
}
