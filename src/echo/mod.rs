//! WebSocket echo server
//!
//! `GET /echo` upgrades to a WebSocket and mirrors every message back to the
//! client that sent it, preserving the message type.

pub mod server;


pub use server::EchoServer;
