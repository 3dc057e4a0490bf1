use crate::{RelayError, Result};
use std::future::Future;
use tokio::net::TcpListener;

/// Common trait for relay servers
///
/// This trait defines the lifecycle shared by the echo and bridge servers.
pub trait RelayServer {
    /// Binds the configured address and serves until shutdown
    fn run(&self) -> impl Future<Output = Result<()>> + Send;

    /// Serves connections from an already bound listener until shutdown
    fn serve(&self, listener: TcpListener) -> impl Future<Output = Result<()>> + Send;

    /// Returns a shutdown signal sender that can be used to gracefully shutdown the server
    fn shutdown_signal(&self) -> tokio::sync::broadcast::Sender<()>;
}

/// Common trait for echo clients
#[allow(async_fn_in_trait)]
pub trait EchoClient {
    /// Sends binary data and returns the payload of the next reply
    async fn echo(&mut self, data: &[u8]) -> Result<Vec<u8>>;

    /// Sends a string and returns the echoed string
    async fn echo_string(&mut self, data: &str) -> Result<String> {
        let response = self.echo(data.as_bytes()).await?;
        String::from_utf8(response).map_err(RelayError::Utf8)
    }
}
