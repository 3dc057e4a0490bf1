//! HTTP-to-WebSocket bridge
//!
//! `POST /send` hands a message to a WebSocket client connected on
//! `GET /connect` and answers with that client's reply, through two bounded
//! mailboxes owned by the server instance.

pub mod config;
pub mod error;
pub mod mailbox;
pub mod server;


pub use config::BridgeConfig;
pub use error::SendError;
pub use mailbox::Mailbox;
pub use server::BridgeServer;
