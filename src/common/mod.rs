//! Common traits and types used across the wsrelay library
//!
//! This module contains the server lifecycle trait, the shared server
//! configuration, the origin policy applied to upgrades and helpers for
//! running servers in tests.

pub mod config;
pub mod origin;
pub mod server;
pub mod test_utils;
pub mod traits;

pub use config::ServerConfig;
pub use origin::OriginPolicy;
pub use server::{ConnectionGuard, ConnectionTracker};
pub use test_utils::{TestServer, spawn_test_server, test_config};
pub use traits::{EchoClient, RelayServer};
