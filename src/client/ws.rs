use crate::common::EchoClient;
use crate::{RelayError, Result};
use futures_util::{SinkExt, StreamExt};
use http::HeaderValue;
use http::header::ORIGIN;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// WebSocket client for the echo and bridge servers
///
/// # Examples
///
/// ```no_run
/// use wsrelay::client::WsClient;
/// use wsrelay::common::EchoClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let addr = "127.0.0.1:8080".parse()?;
///     let mut client = WsClient::connect(addr, "/echo").await?;
///
///     let response = client.echo_string("Hello, Server!").await?;
///     assert_eq!(response, "Hello, Server!");
///     Ok(())
/// }
/// ```
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    /// Opens a WebSocket to `path` on the server at `addr`
    pub async fn connect(addr: SocketAddr, path: &str) -> Result<Self> {
        let request = format!("ws://{addr}{path}").into_client_request()?;
        Self::open(request).await
    }

    /// Opens a WebSocket announcing `origin` in the handshake, as a browser would
    pub async fn connect_with_origin(addr: SocketAddr, path: &str, origin: &str) -> Result<Self> {
        let mut request = format!("ws://{addr}{path}").into_client_request()?;
        let origin = HeaderValue::from_str(origin)
            .map_err(|e| RelayError::Config(format!("Invalid origin {origin:?}: {e}")))?;
        request.headers_mut().insert(ORIGIN, origin);
        Self::open(request).await
    }

    async fn open(request: tungstenite::handshake::client::Request) -> Result<Self> {
        match connect_async(request).await {
            Ok((stream, _)) => Ok(Self { stream }),
            Err(tungstenite::Error::Http(response)) => {
                Err(RelayError::Handshake(response.status()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.stream.send(Message::text(text.to_owned())).await?;
        Ok(())
    }

    pub async fn send_binary(&mut self, data: &[u8]) -> Result<()> {
        self.stream.send(Message::binary(data.to_vec())).await?;
        Ok(())
    }

    /// Waits for the next text or binary message, skipping control frames
    pub async fn recv(&mut self) -> Result<Message> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Err(RelayError::ConnectionClosed),
                Some(Ok(message)) => return Ok(message),
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Waits for the next message and returns its payload as text
    pub async fn recv_text(&mut self) -> Result<String> {
        match self.recv().await? {
            Message::Text(text) => Ok(text.as_str().to_owned()),
            other => Ok(String::from_utf8(other.into_data().to_vec())?),
        }
    }

    /// Sends a close frame and drops the connection
    pub async fn close(mut self) -> Result<()> {
        match self.stream.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl EchoClient for WsClient {
    /// Sends `data` as a binary message and returns the payload of the reply
    async fn echo(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.send_binary(data).await?;
        Ok(self.recv().await?.into_data().to_vec())
    }

    /// Sends `data` as a text message and returns the text of the reply
    async fn echo_string(&mut self, data: &str) -> Result<String> {
        self.send_text(data).await?;
        self.recv_text().await
    }
}
