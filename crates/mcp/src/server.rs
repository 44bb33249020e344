//! Transport-independent MCP request handling.

use std::time::Instant;

use {
    calmcp_tools::ToolRegistry,
    serde_json::{Value, json},
    tracing::{debug, info, warn},
};

use crate::types::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, McpToolDef, METHOD_NOT_FOUND, PARSE_ERROR,
    PROTOCOL_VERSION, ServerCapabilities, ServerInfo, ToolsCallParams, ToolsCallResult,
    ToolsCapability, ToolsListResult,
};

/// Answers MCP requests from the tools in a [`ToolRegistry`].
pub struct McpServer {
    info: ServerInfo,
    tools: ToolRegistry,
}

impl McpServer {
    pub fn new(info: ServerInfo, tools: ToolRegistry) -> Self {
        Self { info, tools }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Handle one serialized message. Returns `None` when nothing is sent
    /// back (notifications).
    pub async fn handle_raw(&self, raw: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => self.handle_value(value).await,
            Err(e) => {
                debug!(error = %e, "unparseable JSON-RPC message");
                Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(PARSE_ERROR, format!("Parse error: {e}")),
                ))
            },
        }
    }

    pub async fn handle_value(&self, value: Value) -> Option<JsonRpcResponse> {
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request = match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) if request.jsonrpc == "2.0" => request,
            Ok(_) => {
                return Some(JsonRpcResponse::failure(
                    id,
                    JsonRpcError::new(INVALID_REQUEST, "Invalid Request: jsonrpc must be \"2.0\""),
                ));
            },
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    id,
                    JsonRpcError::new(INVALID_REQUEST, format!("Invalid Request: {e}")),
                ));
            },
        };
        self.handle_request(request).await
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            self.handle_notification(&request.method);
            return None;
        };

        debug!(method = %request.method, id = %id, "MCP request");
        let outcome = self
            .dispatch(&request.method, request.params.unwrap_or(Value::Null))
            .await;
        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    fn handle_notification(&self, method: &str) {
        match method {
            "notifications/initialized" => info!("MCP client initialized"),
            "notifications/cancelled" => debug!("MCP client cancelled a request"),
            other => debug!(method = other, "ignoring MCP notification"),
        }
    }

    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, JsonRpcError> {
        match method {
            "initialize" => {
                if let Some(version) = params.get("protocolVersion").and_then(Value::as_str) {
                    info!(client_version = version, "MCP initialize");
                }
                to_result(&InitializeResult {
                    protocol_version: PROTOCOL_VERSION.into(),
                    capabilities: ServerCapabilities {
                        tools: Some(ToolsCapability::default()),
                    },
                    server_info: self.info.clone(),
                })
            },
            "ping" => Ok(json!({})),
            "tools/list" => to_result(&self.list_tools()),
            "tools/call" => self.call_tool(params).await,
            other => Err(JsonRpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        }
    }

    fn list_tools(&self) -> ToolsListResult {
        ToolsListResult {
            tools: self
                .tools
                .iter()
                .map(|tool| McpToolDef {
                    name: tool.name().to_string(),
                    description: Some(tool.description().to_string()),
                    input_schema: tool.parameters_schema(),
                })
                .collect(),
        }
    }

    /// Unknown tools are protocol errors. Failures inside a tool are reported
    /// in the result with `isError` so the model can read them.
    async fn call_tool(&self, params: Value) -> Result<Value, JsonRpcError> {
        let params: ToolsCallParams = serde_json::from_value(params).map_err(|e| {
            JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {e}"))
        })?;
        let tool = self.tools.get(&params.name).ok_or_else(|| {
            JsonRpcError::new(INVALID_PARAMS, format!("Unknown tool: {}", params.name))
        })?;

        let arguments = match params.arguments {
            Value::Null => json!({}),
            other => other,
        };

        let started = Instant::now();
        let result = match tool.execute(arguments).await {
            Ok(output) => {
                info!(
                    tool = %params.name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "tool call succeeded"
                );
                ToolsCallResult::text(output.to_string(), false)
            },
            Err(e) => {
                warn!(
                    tool = %params.name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %format!("{e:#}"),
                    "tool call failed"
                );
                ToolsCallResult::text(format!("{e:#}"), true)
            },
        };
        to_result(&result)
    }
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::new(INTERNAL_ERROR, format!("Internal error: {e}")))
}
