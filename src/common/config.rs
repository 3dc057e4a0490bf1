use super::origin::OriginPolicy;
use std::net::SocketAddr;

/// Configuration shared by the echo and bridge servers
///
/// # Examples
///
/// ```
/// use wsrelay::common::{OriginPolicy, ServerConfig};
///
/// let config = ServerConfig {
///     bind_addr: "127.0.0.1:8080".parse().unwrap(),
///     max_connections: 100,
///     max_message_size: 64 * 1024,
///     origins: OriginPolicy::allow_list(["https://example.com"]),
/// };
/// assert!(!config.origins.permits(Some("https://evil.example")));
/// ```
///
/// Using the default configuration:
///
/// ```
/// use wsrelay::common::ServerConfig;
///
/// let config = ServerConfig::default();
/// assert_eq!(config.bind_addr.port(), 8080);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Maximum number of concurrently upgraded connections
    pub max_connections: usize,
    /// Largest message accepted, both as a WebSocket frame and as a `/send` body
    ///
    /// Defaults to 64 MiB, the WebSocket library's own message limit. Lower it
    /// to bound the memory a single peer can make the server buffer.
    pub max_message_size: usize,
    /// Which `Origin` headers may open a WebSocket
    pub origins: OriginPolicy,
}

impl ServerConfig {
    /// Default configuration listening on all interfaces at `port`
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            ..Self::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            max_message_size: 64 << 20, // 64MiB
            origins: OriginPolicy::AllowAny,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits() {
        let config = ServerConfig::default();
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.max_message_size, 64 * 1024 * 1024);
        assert_eq!(config.origins, OriginPolicy::AllowAny);
    }

    #[test]
    fn with_port_binds_all_interfaces() {
        let config = ServerConfig::with_port(9000);
        assert_eq!(config.bind_addr, SocketAddr::from(([0, 0, 0, 0], 9000)));
        assert_eq!(config.max_message_size, ServerConfig::default().max_message_size);
    }
}
