//! In-memory MCP server used by unit tests across the crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{json, Value};

use super::connection::Connector;
use super::errors::McpError;
use super::transport::{next_request_id, McpTransport};
use super::types::{error_codes, JsonRpcResponse};

type Handler = Arc<dyn Fn(&Value) -> Result<String, String> + Send + Sync>;

enum ToolBehavior {
    Text(Handler),
    Raw(Value),
}

#[derive(Default)]
struct FakeState {
    tools: Mutex<HashMap<String, Arc<ToolBehavior>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<(String, Value)>>,
    notifications: Mutex<Vec<String>>,
    fail_init: Mutex<bool>,
    connect_delay: Mutex<Duration>,
    connects: AtomicUsize,
    closes: AtomicUsize,
}

/// Scriptable stand-in for the UserBank tool server.
#[derive(Clone, Default)]
pub struct FakeServer {
    state: Arc<FakeState>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool whose handler returns the text of the first chunk,
    /// or an `isError` result for `Err`.
    pub fn with_tool<F>(self, name: &str, handler: F) -> Self
    where
        F: Fn(&Value) -> Result<String, String> + Send + Sync + 'static,
    {
        self.state
            .tools
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::new(ToolBehavior::Text(Arc::new(handler))));
        self
    }

    /// Register a tool that answers with a verbatim `tools/call` result.
    pub fn with_raw_tool(self, name: &str, result: Value) -> Self {
        self.state
            .tools
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::new(ToolBehavior::Raw(result)));
        self
    }

    pub fn with_delay(self, name: &str, delay: Duration) -> Self {
        self.state
            .delays
            .lock()
            .unwrap()
            .insert(name.to_string(), delay);
        self
    }

    pub fn with_connect_delay(self, delay: Duration) -> Self {
        *self.state.connect_delay.lock().unwrap() = delay;
        self
    }

    pub fn failing_initialize(self) -> Self {
        *self.state.fail_init.lock().unwrap() = true;
        self
    }

    pub fn transport(&self) -> Arc<dyn McpTransport> {
        Arc::new(FakeTransport {
            state: Arc::clone(&self.state),
        })
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, tool: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(name, _)| name == tool)
            .map(|(_, args)| args)
            .collect()
    }

    pub fn notifications(&self) -> Vec<String> {
        self.state.notifications.lock().unwrap().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }
}

impl Connector for FakeServer {
    fn endpoint(&self) -> String {
        "fake://userbank".to_string()
    }

    fn connect(&self) -> BoxFuture<'_, Result<Arc<dyn McpTransport>, McpError>> {
        Box::pin(async move {
            self.state.connects.fetch_add(1, Ordering::SeqCst);
            let delay = *self.state.connect_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(self.transport())
        })
    }
}

struct FakeTransport {
    state: Arc<FakeState>,
}

impl FakeTransport {
    async fn call(&self, id: u64, params: Option<Value>) -> JsonRpcResponse {
        let params = params.unwrap_or(Value::Null);
        let name = params["name"].as_str().unwrap_or_default().to_string();
        let args = params["arguments"].clone();
        self.state
            .calls
            .lock()
            .unwrap()
            .push((name.clone(), args.clone()));

        let delay = self.state.delays.lock().unwrap().get(&name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let behavior = self.state.tools.lock().unwrap().get(&name).cloned();
        match behavior.as_deref() {
            Some(ToolBehavior::Text(handler)) => match (**handler)(&args) {
                Ok(text) => JsonRpcResponse::success(
                    id,
                    json!({"content": [{"type": "text", "text": text}]}),
                ),
                Err(message) => JsonRpcResponse::success(
                    id,
                    json!({"content": [{"type": "text", "text": message}], "isError": true}),
                ),
            },
            Some(ToolBehavior::Raw(result)) => JsonRpcResponse::success(id, result.clone()),
            None => JsonRpcResponse::failure(id, error_codes::INVALID_PARAMS, "unknown tool"),
        }
    }
}

impl McpTransport for FakeTransport {
    fn endpoint(&self) -> &str {
        "fake://userbank"
    }

    fn request<'a>(
        &'a self,
        method: &'a str,
        params: Option<Value>,
    ) -> BoxFuture<'a, Result<JsonRpcResponse, McpError>> {
        Box::pin(async move {
            let id = next_request_id();
            let response = match method {
                "initialize" => {
                    if *self.state.fail_init.lock().unwrap() {
                        JsonRpcResponse::failure(id, error_codes::INTERNAL_ERROR, "init refused")
                    } else {
                        JsonRpcResponse::success(
                            id,
                            json!({
                                "protocolVersion": "2024-11-05",
                                "capabilities": {"tools": {}},
                                "serverInfo": {"name": "fake", "version": "0"},
                            }),
                        )
                    }
                }
                "tools/list" => {
                    let tools: Vec<Value> = self
                        .state
                        .tools
                        .lock()
                        .unwrap()
                        .keys()
                        .map(|name| json!({"name": name, "inputSchema": {"type": "object"}}))
                        .collect();
                    JsonRpcResponse::success(id, json!({ "tools": tools }))
                }
                "tools/call" => self.call(id, params).await,
                _ => JsonRpcResponse::failure(id, error_codes::METHOD_NOT_FOUND, "no such method"),
            };
            Ok(response)
        })
    }

    fn notify<'a>(
        &'a self,
        method: &'a str,
        _params: Option<Value>,
    ) -> BoxFuture<'a, Result<(), McpError>> {
        Box::pin(async move {
            self.state
                .notifications
                .lock()
                .unwrap()
                .push(method.to_string());
            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.state.closes.fetch_add(1, Ordering::SeqCst);
        })
    }
}
