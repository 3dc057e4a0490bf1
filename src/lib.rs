use thiserror::Error;

/// Error types for the wsrelay library
#[derive(Error, Debug)]
pub enum RelayError {
    /// Socket-level errors (bind, accept, connect, read, write)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Server-side WebSocket transport errors
    #[error("WebSocket transport error: {0}")]
    Transport(#[from] axum::Error),

    /// Client-side WebSocket errors
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The server refused the upgrade handshake
    #[error("WebSocket handshake rejected with status {0}")]
    Handshake(http::StatusCode),

    /// Malformed HTTP responses seen by the send client
    #[error("HTTP error: {0}")]
    Http(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// The peer went away in the middle of an exchange
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// A mailbox lost its receiving side
    #[error("Mailbox closed")]
    MailboxClosed,

    /// UTF-8 encoding errors
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Result type for the wsrelay library
pub type Result<T> = std::result::Result<T, RelayError>;

pub mod bridge;
pub mod client;
pub mod common;
pub mod echo;

// Re-export main types for convenience
pub use bridge::{BridgeConfig, BridgeServer, Mailbox};
pub use client::{SendClient, SendResponse, WsClient};
pub use common::{EchoClient, OriginPolicy, RelayServer, ServerConfig};
pub use echo::EchoServer;
