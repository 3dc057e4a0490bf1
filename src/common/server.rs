use super::origin::OriginPolicy;
use crate::Result;
use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::response::{IntoResponse, Response};
use http::{HeaderMap, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Counts upgraded connections and enforces the configured limit
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<AtomicUsize>,
    limit: usize,
}

impl ConnectionTracker {
    pub fn new(limit: usize) -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            limit,
        }
    }

    /// Reserves a connection slot, or returns `None` when the limit is reached
    pub fn try_acquire(&self) -> Option<ConnectionGuard> {
        let limit = self.limit;
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < limit).then_some(n + 1)
            })
            .ok()
            .map(|previous| ConnectionGuard {
                active: self.active.clone(),
                current: previous + 1,
            })
    }

    /// Number of connections currently holding a slot
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// A held connection slot, released on drop
#[derive(Debug)]
pub struct ConnectionGuard {
    active: Arc<AtomicUsize>,
    current: usize,
}

impl ConnectionGuard {
    /// Active connections right after this one was admitted
    pub fn current(&self) -> usize {
        self.current
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let remaining = self.active.fetch_sub(1, Ordering::SeqCst) - 1;
        info!(current = remaining, "Connection closed");
    }
}

/// Decides whether an upgrade request may proceed
///
/// Returns the upgrade with its message size limit applied and the reserved
/// connection slot, or the response rejecting the request.
pub(crate) fn admit(
    upgrade: std::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    headers: &HeaderMap,
    origins: &OriginPolicy,
    tracker: &ConnectionTracker,
    peer: SocketAddr,
    max_message_size: usize,
) -> std::result::Result<(WebSocketUpgrade, ConnectionGuard), Response> {
    let upgrade = upgrade.map_err(|rejection| {
        warn!(%peer, error = %rejection, "Upgrade error");
        rejection.into_response()
    })?;

    if !origins.permits_headers(headers) {
        warn!(%peer, origin = ?headers.get(http::header::ORIGIN), "Upgrade rejected: origin not allowed");
        return Err((StatusCode::FORBIDDEN, "origin not allowed").into_response());
    }

    let guard = tracker.try_acquire().ok_or_else(|| {
        warn!(%peer, limit = tracker.limit(), "Connection rejected: limit reached");
        (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response()
    })?;
    info!(%peer, current = guard.current(), "Accepted connection");

    Ok((upgrade.max_message_size(max_message_size), guard))
}

/// Serves `router` on `listener` until Ctrl-C or an internal shutdown signal
///
/// `token` is cancelled once shutdown starts so that upgraded connections,
/// which the HTTP server no longer tracks, can wind down too.
pub(crate) async fn serve_router(
    listener: TcpListener,
    router: Router,
    shutdown: &broadcast::Sender<()>,
    token: CancellationToken,
    name: &'static str,
) -> Result<()> {
    let address = listener.local_addr()?;
    info!(%address, server = name, "Server listening");

    let mut shutdown_rx = shutdown.subscribe();
    let stop = async move {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received shutdown signal, stopping server");
            }
            _ = shutdown_rx.recv() => {
                info!("Received internal shutdown signal, stopping server");
            }
        }
        token.cancel();
    };

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(stop)
    .await?;

    info!(server = name, "Server stopped");
    Ok(())
}
