//! MCP Server Implementation
//!
//! The dispatcher shared by every transport: it turns one raw envelope
//! into at most one response envelope. Transports only move bytes.

use crate::mcp::errors::{McpError, McpResult};
use crate::mcp::protocol::*;
use crate::mcp::tools::{InvocationResult, ToolRegistry};
use crate::mcp::validation::McpValidator;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const INSTRUCTIONS: &str = "Kubernetes and Helm tooling. Call tools/list to discover the available operations.";

/// MCP Server state and configuration
pub struct McpServer {
    /// Server implementation information
    pub server_info: Implementation,
    /// Server capabilities
    pub capabilities: ServerCapabilities,
    registry: ToolRegistry,
    validator: McpValidator,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl McpServer {
    /// Create a new MCP server around a fully populated registry
    #[inline]
    pub fn new(name: String, version: String, registry: ToolRegistry) -> Result<Self> {
        let server_info = Implementation { name, version };

        let capabilities = ServerCapabilities {
            tools: ToolsCapability {
                list_changed: false,
            },
        };

        Ok(Self {
            server_info,
            capabilities,
            registry,
            validator: McpValidator::new()?,
            started_at: Utc::now(),
            started: Instant::now(),
        })
    }

    #[inline]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    #[inline]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[inline]
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Handle one raw message. Returns `None` when nothing must be sent
    /// back, which is always the case for notifications.
    #[inline]
    pub async fn handle_message(&self, raw: &str) -> Option<JsonRpcMessage> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                let error = McpError::ParseError {
                    message: e.to_string(),
                };
                error.log();
                return Some(error.to_error_response(None));
            }
        };

        self.handle_value(value).await
    }

    /// Handle an already decoded JSON value
    #[inline]
    pub async fn handle_value(&self, value: Value) -> Option<JsonRpcMessage> {
        match self.validator.parse_request(&value) {
            Ok(request) => self.handle_request(request).await,
            Err(error) => {
                error.log();
                if is_notification(&value) {
                    debug!("Dropping error for malformed notification");
                    return None;
                }
                Some(error.to_error_response(extract_request_id(&value)))
            }
        }
    }

    /// Handle a validated JSON-RPC request or notification
    #[inline]
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcMessage> {
        let JsonRpcRequest {
            method, params, id, ..
        } = request;

        debug!("Dispatching {} (id: {:?})", method, id);
        let outcome = self.resolve(&method, params).await;

        let Some(id) = id else {
            if let Err(error) = outcome {
                warn!("Notification {} failed", method);
                error.log();
            }
            return None;
        };

        match outcome {
            Ok(result) => Some(JsonRpcMessage::Response(JsonRpcResponse::new(result, id))),
            Err(error) => {
                error.log();
                Some(error.to_error_response(Some(id)))
            }
        }
    }

    async fn resolve(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        match method {
            methods::INITIALIZE => self.handle_initialize(params),
            methods::INITIALIZED | methods::PING => Ok(json!({})),
            methods::TOOLS_LIST => to_json(&self.list_tools()),
            methods::TOOLS_CALL => self.handle_call_tool(params).await,
            other if other.starts_with(methods::NOTIFICATION_PREFIX) => {
                debug!("Acknowledged {}", other);
                Ok(json!({}))
            }
            other => self.invoke_tool(other, params).await,
        }
    }

    /// Handle initialize request. The handshake has no side effects.
    #[inline]
    pub fn handle_initialize(&self, params: Option<Value>) -> McpResult<Value> {
        let params: InitializeParams = params
            .and_then(|p| serde_json::from_value(p).ok())
            .unwrap_or_default();

        let protocol_version = self
            .validator
            .negotiate_protocol_version(params.protocol_version.as_deref());

        if let Some(client) = &params.client_info {
            info!("Client initialized: {} {}", client.name, client.version);
        }

        let result = InitializeResult {
            protocol_version: protocol_version.to_string(),
            capabilities: self.capabilities.clone(),
            server_info: self.server_info.clone(),
            instructions: Some(INSTRUCTIONS.to_string()),
        };

        to_json(&result)
    }

    /// Catalog in registration order
    #[inline]
    pub fn list_tools(&self) -> ListToolsResult {
        ListToolsResult {
            tools: self.registry.list_all().map(|d| d.to_tool()).collect(),
        }
    }

    async fn handle_call_tool(&self, params: Option<Value>) -> McpResult<Value> {
        let params = self.validator.parse_call_tool_params(params)?;

        if self.registry.entry(&params.name).is_err() {
            return Err(McpError::InvalidParams {
                message: format!("Unknown tool: {}", params.name),
                errors: Vec::new(),
            });
        }

        let payload = self.invoke_tool(&params.name, params.arguments).await?;

        let result = CallToolResult {
            content: vec![ToolContent::Text {
                text: serde_json::to_string_pretty(&payload).map_err(internal)?,
            }],
            structured_content: Some(payload),
            is_error: false,
        };

        to_json(&result)
    }

    /// Validate params and run a capability. Shared by the JSON-RPC
    /// methods and the per-tool HTTP endpoints.
    #[inline]
    pub async fn invoke_tool(&self, name: &str, params: Option<Value>) -> McpResult<Value> {
        let entry = self.registry.entry(name)?;
        let params = match params {
            None | Some(Value::Null) => json!({}),
            Some(value) => value,
        };

        if let Some(schema) = &entry.schema {
            schema
                .validate(&params)
                .map_err(|errors| McpError::InvalidParams {
                    message: format!("Invalid parameters for tool '{}'", name),
                    errors,
                })?;
        }

        debug!("Invoking tool {}", name);
        let handler = Arc::clone(&entry.handler);
        // A panicking handler only takes down its own task.
        let outcome = tokio::spawn(async move { handler.invoke(params).await })
            .await
            .map_err(|e| McpError::InternalError {
                message: format!("Tool '{}' aborted: {}", name, e),
            })?;

        match outcome {
            InvocationResult::Success(payload) => Ok(payload),
            InvocationResult::Failure(failure) => Err(McpError::CollaboratorFailure {
                tool: name.to_string(),
                failure,
            }),
        }
    }
}

fn internal(error: serde_json::Error) -> McpError {
    McpError::InternalError {
        message: error.to_string(),
    }
}

fn to_json<T: Serialize>(value: &T) -> McpResult<Value> {
    serde_json::to_value(value).map_err(internal)
}
