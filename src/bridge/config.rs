use crate::common::ServerConfig;
use std::time::Duration;

/// Configuration for the bridge server
///
/// Extends `ServerConfig` with the mailbox size and how long `/send` waits
/// for a WebSocket client to reply.
///
/// # Examples
///
/// ```rust
/// use wsrelay::bridge::BridgeConfig;
/// use wsrelay::common::ServerConfig;
/// use std::time::Duration;
///
/// let config = BridgeConfig {
///     server: ServerConfig::with_port(9000),
///     queue_capacity: 100,
///     reply_timeout: Duration::from_secs(10),
/// };
/// assert_eq!(config.server.bind_addr.port(), 9000);
/// ```
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Listener, limits and origin policy
    pub server: ServerConfig,
    /// Capacity of the `incoming` and `outgoing` mailboxes
    pub queue_capacity: usize,
    /// How long `/send` waits for a reply before answering 408
    pub reply_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            queue_capacity: 100,
            reply_timeout: Duration::from_secs(10),
        }
    }
}

impl From<ServerConfig> for BridgeConfig {
    fn from(server: ServerConfig) -> Self {
        Self {
            server,
            ..Self::default()
        }
    }
}

impl From<BridgeConfig> for ServerConfig {
    fn from(config: BridgeConfig) -> Self {
        config.server
    }
}
