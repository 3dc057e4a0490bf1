//! Clients for driving the relay servers
//!
//! `WsClient` speaks WebSocket to `/echo` and `/connect`; `SendClient` posts
//! messages to the bridge's `/send` endpoint over plain HTTP/1.1.

pub mod send;
pub mod ws;

pub use send::{SendClient, SendResponse};
pub use ws::WsClient;
