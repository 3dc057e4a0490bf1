use color_eyre::eyre::{Result, eyre};
use http::StatusCode;
use std::time::Duration;
use wsrelay::common::{spawn_test_server, test_config};
use wsrelay::{BridgeConfig, BridgeServer, EchoClient, EchoServer, RelayServer, SendClient, WsClient};

fn bridge_config(reply_timeout: Duration) -> BridgeConfig {
    BridgeConfig {
        server: test_config(),
        reply_timeout,
        ..BridgeConfig::default()
    }
}

#[tokio::test]
async fn test_multiple_concurrent_echo_clients() -> Result<()> {
    let test = spawn_test_server(EchoServer::new(test_config())).await?;

    let client_count = 5;
    let mut handles = Vec::new();

    for i in 0..client_count {
        let addr = test.addr;
        let handle = tokio::spawn(async move {
            let mut client = WsClient::connect(addr, "/echo").await?;
            for round in 0..3 {
                let message = format!("Message {round} from client {i}");
                let response = client.echo_string(&message).await?;
                assert_eq!(response, message);
            }
            client.close().await?;
            Ok::<(), color_eyre::eyre::Error>(())
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await??;
    }

    test.handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_binary_data_with_nulls() -> Result<()> {
    let test = spawn_test_server(EchoServer::new(test_config())).await?;
    let mut client = WsClient::connect(test.addr, "/echo").await?;

    let test_data = vec![
        vec![0, 1, 2, 3, 0, 255, 128, 0],
        vec![255; 100],
        vec![0; 100],
        (0..=255).collect::<Vec<u8>>(),
    ];

    for data in test_data {
        let response = client.echo(&data).await?;
        assert_eq!(response, data);
    }

    test.handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_bridge_round_trip() -> Result<()> {
    let test = spawn_test_server(BridgeServer::new(bridge_config(Duration::from_secs(5)))?).await?;
    let mut ws = WsClient::connect(test.addr, "/connect").await?;

    let client = SendClient::new(test.addr);
    let pending = tokio::spawn(async move { client.send("hello").await });

    assert_eq!(ws.recv_text().await?, "hello");
    ws.send_text("world").await?;

    let response = pending.await??;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text()?, "world");

    test.handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_message_posted_before_client_connects_is_delivered() -> Result<()> {
    let test = spawn_test_server(BridgeServer::new(bridge_config(Duration::from_secs(5)))?).await?;

    let client = SendClient::new(test.addr);
    let pending = tokio::spawn(async move { client.send("queued early").await });

    // Let the message land on the mailbox first
    for _ in 0..100 {
        if !test.server.incoming().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(test.server.incoming().len(), 1);

    let mut ws = WsClient::connect(test.addr, "/connect").await?;
    assert_eq!(ws.recv_text().await?, "queued early");
    ws.send_text("late reply").await?;

    let response = pending.await??;
    assert_eq!(response.text()?, "late reply");

    test.handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_bridge_times_out_without_client() -> Result<()> {
    let test = spawn_test_server(BridgeServer::new(bridge_config(Duration::from_millis(200)))?).await?;

    let started = tokio::time::Instant::now();
    let response = SendClient::new(test.addr).send("nobody home").await?;
    assert_eq!(response.status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(response.text()?, "timed out");
    assert!(started.elapsed() >= Duration::from_millis(200));

    test.handle.abort();
    Ok(())
}

#[test]
fn test_default_reply_timeout_is_ten_seconds() {
    let config = BridgeConfig::default();
    assert_eq!(config.reply_timeout, Duration::from_secs(10));
    assert_eq!(config.queue_capacity, 100);
    assert_eq!(config.server.bind_addr.port(), 8080);
}

#[tokio::test]
async fn test_servers_run_independently() -> Result<()> {
    let first = spawn_test_server(BridgeServer::new(bridge_config(Duration::from_millis(200)))?).await?;
    let second = spawn_test_server(BridgeServer::new(bridge_config(Duration::from_secs(5)))?).await?;

    let mut ws = WsClient::connect(second.addr, "/connect").await?;

    // A client on the second server never sees messages posted to the first
    let response = SendClient::new(first.addr).send("for the first server").await?;
    assert_eq!(response.status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(first.server.incoming().len(), 1);

    let client = SendClient::new(second.addr);
    let pending = tokio::spawn(async move { client.send("for the second server").await });
    assert_eq!(ws.recv_text().await?, "for the second server");
    ws.send_text("ack").await?;
    assert_eq!(pending.await??.text()?, "ack");

    first.handle.abort();
    second.handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_graceful_shutdown() -> Result<()> {
    let test = spawn_test_server(EchoServer::new(test_config())).await?;
    let mut client = WsClient::connect(test.addr, "/echo").await?;
    assert_eq!(client.echo_string("before shutdown").await?, "before shutdown");

    let shutdown = test.server.shutdown_signal();
    shutdown.send(()).map_err(|e| eyre!("Failed to send shutdown: {e}"))?;

    let result = tokio::time::timeout(Duration::from_secs(2), test.handle).await??;
    assert!(result.is_ok());

    // Upgraded connections are closed once the server stops
    let closed = tokio::time::timeout(Duration::from_secs(2), client.recv()).await?;
    assert!(closed.is_err());

    Ok(())
}
