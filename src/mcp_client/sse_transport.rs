//! MCP over HTTP + Server-Sent Events.
//!
//! Handshake:
//! 1. `GET <url>` with `Accept: text/event-stream` opens the event stream
//! 2. The server's first `endpoint` event names the URL to POST messages to
//! 3. Each JSON-RPC request is POSTed there; its response arrives later as a
//!    `message` event on the open stream and is routed by id

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::StreamExt;
use reqwest::Client as HttpClient;
use reqwest::Url;
use tokio::task::JoinHandle;

use super::errors::McpError;
use super::sse::sse_events;
use super::transport::{next_request_id, McpTransport, PendingRequests};
use super::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for the `endpoint` event after the stream opens.
const ENDPOINT_EVENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for a single message POST (the response itself comes over SSE).
const POST_TIMEOUT: Duration = Duration::from_secs(15);

// ─── SseTransport ────────────────────────────────────────────────────────────

pub struct SseTransport {
    url: String,
    post_url: Url,
    http: HttpClient,
    pending: Arc<PendingRequests>,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SseTransport {
    /// Open the event stream and wait for the message endpoint.
    pub async fn connect(url: &str) -> Result<Self, McpError> {
        let base = Url::parse(url).map_err(|e| McpError::ConfigError {
            reason: format!("invalid MCP url '{url}': {e}"),
        })?;

        // The stream client must not carry a total timeout: the SSE body
        // stays open for the lifetime of the connection.
        let stream_http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| McpError::ConnectFailed {
                endpoint: url.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(POST_TIMEOUT)
            .build()
            .map_err(|e| McpError::ConnectFailed {
                endpoint: url.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let response = stream_http
            .get(base.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| McpError::ConnectFailed {
                endpoint: url.to_string(),
                reason: format!("{e}"),
            })?;

        if !response.status().is_success() {
            return Err(McpError::ConnectFailed {
                endpoint: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let mut events = Box::pin(sse_events(response, url.to_string()));

        let endpoint_path = tokio::time::timeout(ENDPOINT_EVENT_TIMEOUT, async {
            while let Some(event) = events.next().await {
                let event = event?;
                if event.event == "endpoint" {
                    return Ok(event.data);
                }
            }
            Err(McpError::InitFailed {
                endpoint: url.to_string(),
                reason: "event stream ended before the endpoint event".into(),
            })
        })
        .await
        .map_err(|_| McpError::InitFailed {
            endpoint: url.to_string(),
            reason: format!(
                "no endpoint event within {}s",
                ENDPOINT_EVENT_TIMEOUT.as_secs()
            ),
        })??;

        let post_url = resolve_post_url(&base, &endpoint_path)?;
        tracing::info!(url, post_url = %post_url, "MCP SSE stream open");

        let pending = PendingRequests::new(url);
        let reader_pending = Arc::clone(&pending);
        let reader_url = url.to_string();
        let reader = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) if event.event == "message" => {
                        reader_pending.dispatch(&event.data);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(url = %reader_url, error = %e, "SSE stream error");
                        break;
                    }
                }
            }
            tracing::info!(url = %reader_url, "MCP SSE stream closed");
            reader_pending.close();
        });

        Ok(Self {
            url: url.to_string(),
            post_url,
            http,
            pending,
            reader: std::sync::Mutex::new(Some(reader)),
        })
    }

    async fn post(&self, body: String) -> Result<(), McpError> {
        let response = self
            .http
            .post(self.post_url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| McpError::TransportError {
                endpoint: self.url.clone(),
                reason: format!("POST failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(McpError::TransportError {
                endpoint: self.url.clone(),
                reason: format!("POST returned HTTP {status}: {text}"),
            });
        }
        Ok(())
    }
}

/// Resolve the `endpoint` event payload against the stream URL.
///
/// Servers send either an absolute URL or a path such as
/// `/messages/?session_id=…`.
pub fn resolve_post_url(base: &Url, endpoint: &str) -> Result<Url, McpError> {
    base.join(endpoint.trim()).map_err(|e| McpError::InitFailed {
        endpoint: base.to_string(),
        reason: format!("invalid endpoint event '{endpoint}': {e}"),
    })
}

impl McpTransport for SseTransport {
    fn endpoint(&self) -> &str {
        &self.url
    }

    fn request<'a>(
        &'a self,
        method: &'a str,
        params: Option<serde_json::Value>,
    ) -> BoxFuture<'a, Result<JsonRpcResponse, McpError>> {
        Box::pin(async move {
            let id = next_request_id();
            let req = JsonRpcRequest::new(id, method, params);
            let body = serde_json::to_string(&req).map_err(|e| McpError::TransportError {
                endpoint: self.url.clone(),
                reason: format!("failed to serialize request: {e}"),
            })?;

            // Register before posting: the answer may beat the POST response.
            let waiter = self.pending.register(id)?;
            self.post(body).await?;
            waiter.wait().await
        })
    }

    fn notify<'a>(
        &'a self,
        method: &'a str,
        params: Option<serde_json::Value>,
    ) -> BoxFuture<'a, Result<(), McpError>> {
        Box::pin(async move {
            let note = JsonRpcNotification::new(method, params);
            let body = serde_json::to_string(&note).map_err(|e| McpError::TransportError {
                endpoint: self.url.clone(),
                reason: format!("failed to serialize notification: {e}"),
            })?;
            self.post(body).await
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.pending.close();
            let handle = self
                .reader
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take();
            if let Some(handle) = handle {
                handle.abort();
            }
        })
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        if let Some(handle) = self
            .reader
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp_client::client::McpClient;
    use crate::mcp_client::types::McpEndpoint;
    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    /// Read one HTTP/1.1 request: the request line and the body.
    async fn read_request(stream: &mut TcpStream) -> Option<(String, String)> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let head_end = loop {
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let request_line = head.lines().next()?.to_string();
        let content_length = head
            .lines()
            .filter_map(|l| l.split_once(':'))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let mut body = buf[head_end..].to_vec();
        while body.len() < content_length {
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
        Some((request_line, String::from_utf8_lossy(&body).to_string()))
    }

    /// JSON-RPC reply for a request; `None` for notifications.
    fn answer(request: &Value) -> Option<Value> {
        let id = request.get("id")?.clone();
        let result = match request["method"].as_str()? {
            "initialize" => json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "serverInfo": {"name": "mini-sse"},
            }),
            "tools/list" => json!({"tools": [{"name": "manage_goals"}]}),
            "tools/call" => json!({"content": [{
                "type": "text",
                "text": r#"{"raw_data":{"id":1,"name":"Ada"}}"#,
            }]}),
            other => {
                return Some(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {"code": -32601, "message": format!("no method {other}")},
                }))
            }
        };
        Some(json!({"jsonrpc": "2.0", "id": id, "result": result}))
    }

    /// Serve a one-stream MCP SSE endpoint on loopback and return its URL.
    ///
    /// `GET` opens the stream and announces `/messages?session_id=1`; each
    /// `POST` is acknowledged with 202 and answered on the stream.
    async fn serve_local_sse() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (events_tx, events_rx) = mpsc::unbounded_channel::<String>();
        let events_rx = Arc::new(tokio::sync::Mutex::new(Some(events_rx)));

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let events_tx = events_tx.clone();
                let events_rx = Arc::clone(&events_rx);
                tokio::spawn(async move {
                    let Some((line, body)) = read_request(&mut stream).await else {
                        return;
                    };
                    if line.starts_with("GET") {
                        let Some(mut rx) = events_rx.lock().await.take() else {
                            return;
                        };
                        let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\n\r\n";
                        if stream.write_all(head.as_bytes()).await.is_err() {
                            return;
                        }
                        let _ = stream
                            .write_all(b"event: endpoint\ndata: /messages?session_id=1\n\n")
                            .await;
                        while let Some(event) = rx.recv().await {
                            if stream.write_all(event.as_bytes()).await.is_err() {
                                break;
                            }
                        }
                    } else {
                        let reply = serde_json::from_str::<Value>(&body)
                            .ok()
                            .and_then(|req| answer(&req));
                        if let Some(reply) = reply {
                            let _ = events_tx.send(format!("event: message\ndata: {reply}\n\n"));
                        }
                        let _ = stream
                            .write_all(
                                b"HTTP/1.1 202 Accepted\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                            )
                            .await;
                    }
                });
            }
        });

        format!("http://{addr}/sse")
    }

    #[tokio::test]
    async fn test_round_trip_over_local_sse_server() {
        let url = serve_local_sse().await;
        let client = McpClient::for_endpoint(McpEndpoint::sse(url));

        let value = client
            .call_tool(
                "manage_goals",
                json!({"action": "query"}),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(value, json!({"raw_data": {"id": 1, "name": "Ada"}}));
        assert_eq!(client.cached_tool_names().await, vec!["manage_goals"]);

        client.close().await;
        assert!(!client.is_connected().await);
    }

    #[tokio::test]
    async fn test_unknown_method_over_sse_is_server_error() {
        let url = serve_local_sse().await;
        let transport = SseTransport::connect(&url).await.unwrap();

        let response = transport.request("resources/list", None).await.unwrap();
        let err = crate::mcp_client::transport::extract_result(response).unwrap_err();
        assert!(matches!(err, McpError::ServerError { code: -32601, .. }));
        transport.close().await;
    }

    #[test]
    fn test_resolve_relative_endpoint() {
        let base = Url::parse("http://127.0.0.1:8088/sse").unwrap();
        let url = resolve_post_url(&base, "/messages/?session_id=abc123").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8088/messages/?session_id=abc123"
        );
    }

    #[test]
    fn test_resolve_absolute_endpoint() {
        let base = Url::parse("http://127.0.0.1:8088/sse").unwrap();
        let url = resolve_post_url(&base, "http://localhost:9000/msg").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/msg");
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let err = SseTransport::connect("not a url").await.err().unwrap();
        assert!(matches!(err, McpError::ConfigError { .. }));
    }

    #[tokio::test]
    async fn test_connect_refused_is_connect_failed() {
        // Port 9 (discard) is essentially never served on loopback.
        let err = SseTransport::connect("http://127.0.0.1:9/sse")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, McpError::ConnectFailed { .. }));
    }
}
