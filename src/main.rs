use color_eyre::eyre::{Result, WrapErr};
use wsrelay::bridge::{BridgeConfig, BridgeServer};
use wsrelay::common::{RelayServer, ServerConfig};
use wsrelay::echo::EchoServer;

use tracing::info;

#[derive(Debug, PartialEq, Eq)]
enum Variant {
    Echo,
    Bridge,
}

/// Reads `[echo|bridge] [port]`, or `None` if either argument is unusable
fn parse_args(args: &[String]) -> Option<(Variant, u16)> {
    // The bridge is the default variant
    let variant = match args.get(1).map(|s| s.to_lowercase()).as_deref() {
        None | Some("bridge") => Variant::Bridge,
        Some("echo") => Variant::Echo,
        Some(_) => return None,
    };
    let port = match args.get(2) {
        Some(port) => port.parse::<u16>().ok()?,
        None => 8080,
    };
    Some((variant, port))
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [echo|bridge] [port]", program);
    eprintln!("  echo|bridge: Server variant to run (default: bridge)");
    eprintln!("  port:        Port to listen on, all interfaces (default: 8080)");
    eprintln!();
    eprintln!("Endpoints:");
    eprintln!("  echo:   GET /echo     WebSocket that echoes every message");
    eprintln!("  bridge: GET /connect  WebSocket receiving messages posted to /send");
    eprintln!("          POST /send    Relays the body and returns the client's reply");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} echo 9000      # Start the echo server on port 9000", program);
    eprintln!("  {} bridge         # Start the bridge server on port 8080", program);
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("wsrelay=info")
        .init();

    let args: Vec<String> = std::env::args().collect();

    let Some((variant, port)) = parse_args(&args) else {
        print_usage(args.first().map(String::as_str).unwrap_or("wsrelay"));
        std::process::exit(1);
    };
    let config = ServerConfig::with_port(port);

    match variant {
        Variant::Echo => {
            info!(address = %config.bind_addr, max_connections = config.max_connections, "Starting WebSocket echo server");
            let server = EchoServer::new(config);
            server.run().await.wrap_err("Failed to run WebSocket echo server")?;
        }
        Variant::Bridge => {
            let config = BridgeConfig::from(config);
            info!(
                address = %config.server.bind_addr,
                queue_capacity = config.queue_capacity,
                reply_timeout = ?config.reply_timeout,
                "Starting WebSocket bridge server"
            );
            let server = BridgeServer::new(config).wrap_err("Invalid bridge configuration")?;
            server.run().await.wrap_err("Failed to run WebSocket bridge server")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_to_bridge_on_8080() {
        assert_eq!(parse_args(&args(&["wsrelay"])), Some((Variant::Bridge, 8080)));
    }

    #[test]
    fn reads_variant_and_port() {
        assert_eq!(parse_args(&args(&["wsrelay", "ECHO", "9000"])), Some((Variant::Echo, 9000)));
        assert_eq!(parse_args(&args(&["wsrelay", "bridge"])), Some((Variant::Bridge, 8080)));
    }

    #[test]
    fn rejects_unknown_variant() {
        assert_eq!(parse_args(&args(&["wsrelay", "chat"])), None);
    }

    #[test]
    fn rejects_unparsable_port() {
        assert_eq!(parse_args(&args(&["wsrelay", "echo", "eighty"])), None);
        assert_eq!(parse_args(&args(&["wsrelay", "bridge", "70000"])), None);
    }
}
