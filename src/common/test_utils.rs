use crate::common::{RelayServer, ServerConfig};
use crate::{RelayError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A server running on an ephemeral loopback port
pub struct TestServer<S> {
    pub server: Arc<S>,
    pub addr: SocketAddr,
    pub handle: JoinHandle<Result<()>>,
}

impl<S: RelayServer> TestServer<S> {
    /// Asks the server to stop accepting new requests
    pub fn shutdown(&self) {
        let _ = self.server.shutdown_signal().send(());
    }
}

/// Configuration bound to `127.0.0.1:0` for tests
pub fn test_config() -> ServerConfig {
    ServerConfig {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        ..ServerConfig::default()
    }
}

/// Binds an ephemeral loopback port and serves `server` on it in a background task
pub async fn spawn_test_server<S>(server: S) -> Result<TestServer<S>>
where
    S: RelayServer + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| RelayError::Config(format!("Failed to bind listener: {e}")))?;
    let addr = listener
        .local_addr()
        .map_err(|e| RelayError::Config(format!("Failed to get local address: {e}")))?;

    let server = Arc::new(server);
    let handle = {
        let server = server.clone();
        tokio::spawn(async move { server.serve(listener).await })
    };

    Ok(TestServer {
        server,
        addr,
        handle,
    })
}
