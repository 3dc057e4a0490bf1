use super::config::BridgeConfig;
use super::error::SendError;
use super::mailbox::Mailbox;
use crate::common::server::{admit, serve_router};
use crate::common::{ConnectionTracker, OriginPolicy, RelayServer};
use crate::{RelayError, Result};
use axum::Router;
use axum::body::Body;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use bytes::Bytes;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use http::{HeaderMap, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};

/// Bridge between HTTP callers and WebSocket clients
///
/// `POST /send` places its body on the `incoming` mailbox; a client connected
/// on `GET /connect` receives it as a text message and its next message is
/// placed on `outgoing`, where the waiting `/send` picks it up as its response
/// body. The mailboxes are shared by every connection of this server, so any
/// connected client may answer any `/send`.
///
/// # Examples
///
/// ```no_run
/// use wsrelay::bridge::{BridgeConfig, BridgeServer};
/// use wsrelay::common::RelayServer;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = BridgeServer::new(BridgeConfig::default())?;
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct BridgeServer {
    config: BridgeConfig,
    incoming: Mailbox<String>,
    outgoing: Mailbox<Bytes>,
    connections: ConnectionTracker,
    shutdown_signal: Arc<broadcast::Sender<()>>,
}

#[derive(Clone)]
struct BridgeState {
    incoming: Mailbox<String>,
    outgoing: Mailbox<Bytes>,
    connections: ConnectionTracker,
    origins: Arc<OriginPolicy>,
    max_message_size: usize,
    reply_timeout: Duration,
    shutdown: CancellationToken,
}

/// How a `/send` call ended
#[derive(Debug, PartialEq, Eq)]
enum SendOutcome {
    Reply(Bytes),
    TimedOut,
    Cancelled,
}

impl IntoResponse for SendOutcome {
    fn into_response(self) -> Response {
        match self {
            SendOutcome::Reply(body) => (StatusCode::OK, body).into_response(),
            SendOutcome::TimedOut => (StatusCode::REQUEST_TIMEOUT, "timed out").into_response(),
            SendOutcome::Cancelled => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        }
    }
}

impl BridgeServer {
    /// Creates a bridge server with empty mailboxes
    ///
    /// Fails with [`RelayError::Config`] if `config.queue_capacity` is zero.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        if config.queue_capacity == 0 {
            return Err(RelayError::Config(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        let (shutdown_signal, _) = broadcast::channel(1);
        Ok(Self {
            incoming: Mailbox::new(config.queue_capacity),
            outgoing: Mailbox::new(config.queue_capacity),
            connections: ConnectionTracker::new(config.server.max_connections),
            config,
            shutdown_signal: Arc::new(shutdown_signal),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Messages posted to `/send` that no client has taken yet
    pub fn incoming(&self) -> &Mailbox<String> {
        &self.incoming
    }

    /// Client replies that no `/send` call has taken yet
    pub fn outgoing(&self) -> &Mailbox<Bytes> {
        &self.outgoing
    }

    /// Number of currently upgraded `/connect` clients
    pub fn active_connections(&self) -> usize {
        self.connections.active()
    }

    fn router(&self, shutdown: CancellationToken) -> Router {
        let state = BridgeState {
            incoming: self.incoming.clone(),
            outgoing: self.outgoing.clone(),
            connections: self.connections.clone(),
            origins: Arc::new(self.config.server.origins.clone()),
            max_message_size: self.config.server.max_message_size,
            reply_timeout: self.config.reply_timeout,
            shutdown,
        };
        Router::new()
            .route("/connect", get(connect_upgrade))
            .route("/send", post(send_message))
            .with_state(state)
    }
}

async fn connect_upgrade(
    State(state): State<BridgeState>,
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
    upgrade
        .on_failed_upgrade(move |e| warn!(%peer, error = %e, "Upgrade failed"))
        .on_upgrade(move |socket| {
            async move {
                let _guard = guard;
                if let Err(e) = handle_connect(socket, state).await {
                    error!(error = %e, "Error handling connection");
                }
            }
            .instrument(span)
        })
}

/// Relays `incoming` messages to one client and its replies to `outgoing`
///
/// Ends when the client disconnects, the server shuts down, or a write to
/// the client fails. The wait for a reply has no deadline of its own.
async fn handle_connect(socket: WebSocket, state: BridgeState) -> Result<()> {
    info!("connected");

    let token = state.shutdown.child_token();
    let _stop_reader = token.clone().drop_guard();

    let (mut sink, stream) = socket.split();
    let (reply_tx, mut replies) = mpsc::channel(state.incoming.capacity());
    tokio::spawn(read_replies(stream, reply_tx, token.clone()).in_current_span());

    let result = loop {
        let message = tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!("closing connection");
                break Ok(());
            }
            message = state.incoming.recv() => match message {
                Some(message) => message,
                None => break Err(RelayError::MailboxClosed),
            },
        };

        let size = message.len();
        if let Err(e) = sink.send(Message::Text(message.into())).await {
            warn!(error = %e, "Write error");
            break Err(e.into());
        }
        info!(size, "Forwarded message to client");

        let Some(reply) = replies.recv().await else {
            warn!("Client went away before replying");
            break Err(RelayError::ConnectionClosed);
        };
        info!(size = reply.len(), "Received reply");

        if let Err(e) = state.outgoing.send(reply).await {
            break Err(e);
        }
    };

    let _ = sink.close().await;
    result
}

/// Forwards data messages from the client until it disconnects
///
/// Cancels `token` when the stream ends so the connect loop notices a
/// departed client while it is idle.
async fn read_replies(
    mut stream: SplitStream<WebSocket>,
    replies: mpsc::Sender<Bytes>,
    token: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            received = stream.next() => received,
            _ = token.cancelled() => return,
        };

        let reply = match received {
            Some(Ok(Message::Text(text))) => Bytes::from(text.as_str().to_owned()),
            Some(Ok(Message::Binary(data))) => data,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => {
                info!("Client closed connection");
                break;
            }
            Some(Err(e)) => {
                warn!(error = %e, "Read error");
                break;
            }
        };

        tokio::select! {
            sent = replies.send(reply) => {
                if sent.is_err() {
                    return;
                }
            }
            _ = token.cancelled() => return,
        }
    }

    token.cancel();
}

async fn send_message(
    State(state): State<BridgeState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    body: Body,
) -> Response {
    let span = tracing::info_span!("send", %peer);
    async move {
        let message = match read_message(body, state.max_message_size).await {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Read error");
                return e.into_response();
            }
        };

        let size = message.len();
        tokio::select! {
            queued = state.incoming.send(message) => {
                if let Err(e) = queued {
                    error!(error = %e, "Failed to queue message");
                    return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
                }
            }
            _ = state.shutdown.cancelled() => {
                return SendOutcome::Cancelled.into_response();
            }
        }
        info!(size, queued = state.incoming.len(), "Queued message");

        let outcome = await_reply(&state).await;
        match &outcome {
            SendOutcome::Reply(reply) => info!(size = reply.len(), "Returning reply"),
            SendOutcome::TimedOut => warn!(timeout = ?state.reply_timeout, "Timed out waiting for reply"),
            SendOutcome::Cancelled => info!("Cancelled while waiting for reply"),
        }
        outcome.into_response()
    }
    .instrument(span)
    .await
}

/// Reads the whole request body as the message text
async fn read_message(body: Body, limit: usize) -> std::result::Result<String, SendError> {
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(SendError::Body)?;
    if bytes.is_empty() {
        return Err(SendError::Empty);
    }
    Ok(String::from_utf8(bytes.to_vec())?)
}

async fn await_reply(state: &BridgeState) -> SendOutcome {
    tokio::select! {
        reply = state.outgoing.recv() => match reply {
            Some(reply) => SendOutcome::Reply(reply),
            None => SendOutcome::Cancelled,
        },
        _ = state.shutdown.cancelled() => SendOutcome::Cancelled,
        _ = tokio::time::sleep(state.reply_timeout) => SendOutcome::TimedOut,
    }
}

impl RelayServer for BridgeServer {
    async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.server.bind_addr).await?;
        self.serve(listener).await
    }

    async fn serve(&self, listener: TcpListener) -> Result<()> {
        let shutdown = CancellationToken::new();
        let router = self.router(shutdown.clone());
        serve_router(listener, router, &self.shutdown_signal, shutdown, "bridge").await
    }

    fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown_signal.as_ref().clone()
    }
}
