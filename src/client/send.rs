use crate::{RelayError, Result};
use bytes::Bytes;
use http::StatusCode;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Duration, timeout};

/// Status and body returned by `POST /send`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl SendResponse {
    /// Body decoded as UTF-8
    pub fn text(&self) -> Result<String> {
        Ok(String::from_utf8(self.body.to_vec())?)
    }
}

/// HTTP client posting messages to a bridge server's `/send` endpoint
///
/// Each call opens a fresh connection and sends `Connection: close`, so the
/// whole response is read to end of stream.
///
/// # Examples
///
/// ```no_run
/// use wsrelay::client::SendClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = SendClient::new("127.0.0.1:8080".parse()?);
///     let response = client.send("hello").await?;
///     println!("{}: {}", response.status, response.text()?);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SendClient {
    addr: SocketAddr,
    path: String,
    timeout: Duration,
}

impl SendClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            path: "/send".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Overrides how long a whole exchange may take
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Posts `message` and waits for the bridge's answer
    pub async fn send(&self, message: impl AsRef<[u8]>) -> Result<SendResponse> {
        timeout(self.timeout, self.exchange(message.as_ref()))
            .await
            .map_err(|_| {
                RelayError::Timeout(format!("No response from {} within {:?}", self.addr, self.timeout))
            })?
    }

    async fn exchange(&self, body: &[u8]) -> Result<SendResponse> {
        let mut stream = TcpStream::connect(self.addr).await?;

        let head = format!(
            "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.path,
            self.addr,
            body.len()
        );
        stream.write_all(head.as_bytes()).await?;
        stream.write_all(body).await?;
        stream.flush().await?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await?;
        parse_response(&raw)
    }
}

fn parse_response(raw: &[u8]) -> Result<SendResponse> {
    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut response = httparse::Response::new(&mut headers);

    let body_start = match response.parse(raw) {
        Ok(httparse::Status::Complete(n)) => n,
        Ok(httparse::Status::Partial) => {
            return Err(RelayError::Http("Incomplete response headers".to_string()));
        }
        Err(e) => {
            return Err(RelayError::Http(format!("Failed to parse response: {e}")));
        }
    };

    let code = response
        .code
        .ok_or_else(|| RelayError::Http("Missing status code".to_string()))?;
    let status = StatusCode::from_u16(code)
        .map_err(|e| RelayError::Http(format!("Invalid status code {code}: {e}")))?;

    let header = |name: &str| {
        response
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .and_then(|h| std::str::from_utf8(h.value).ok())
    };

    if header("transfer-encoding").is_some_and(|v| v.eq_ignore_ascii_case("chunked")) {
        return Err(RelayError::Http("Chunked responses are not supported".to_string()));
    }

    let body = &raw[body_start..];
    let body = match header("content-length").map(|v| v.trim().parse::<usize>()) {
        Some(Ok(len)) if len <= body.len() => &body[..len],
        Some(Ok(len)) => {
            return Err(RelayError::Http(format!(
                "Truncated body: expected {len} bytes, got {}",
                body.len()
            )));
        }
        Some(Err(e)) => return Err(RelayError::Http(format!("Invalid Content-Length: {e}"))),
        None => body,
    };

    Ok(SendResponse {
        status,
        body: Bytes::copy_from_slice(body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_and_body() {
        let raw = b"HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\nworld";
        let response = parse_response(raw).unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text().unwrap(), "world");
    }

    #[test]
    fn parses_timeout_response() {
        let raw = b"HTTP/1.1 408 Request Timeout\r\nContent-Length: 9\r\n\r\ntimed out";
        let response = parse_response(raw).unwrap();
        assert_eq!(response.status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(&response.body[..], b"timed out");
    }

    #[test]
    fn body_without_length_runs_to_end() {
        let raw = b"HTTP/1.1 200 OK\r\n\r\nrest of stream";
        let response = parse_response(raw).unwrap();
        assert_eq!(&response.body[..], b"rest of stream");
    }

    #[test]
    fn rejects_truncated_body() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort";
        assert!(matches!(parse_response(raw), Err(RelayError::Http(_))));
    }

    #[tokio::test]
    async fn unreachable_server_is_an_io_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = SendClient::new(addr).send("hello").await;
        assert!(matches!(result, Err(RelayError::Io(_))));
    }

    #[test]
    fn rejects_incomplete_headers() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Len";
        assert!(matches!(parse_response(raw), Err(RelayError::Http(_))));
    }
}
