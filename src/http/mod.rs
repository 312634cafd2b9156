//! HTTP transport.
//!
//! Exposes the dispatcher at [`MCP_ENDPOINT`] and every capability as a
//! plain JSON endpoint under `/tools/{name}`. Handlers never interpret
//! protocol semantics; they only move bytes and pick a status code.

#[cfg(test)]
mod tests;

use crate::mcp::errors::McpError;
use crate::mcp::protocol::{JsonRpcMessage, error_codes};
use crate::mcp::server::McpServer;
use crate::mcp::tools::FailureKind;
use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// JSON-RPC endpoint path
pub const MCP_ENDPOINT: &str = "/mcp/v1/message";

/// Prefix of the per-capability endpoints
pub const TOOLS_ENDPOINT: &str = "/tools";

const DESCRIPTION: &str = "MCP server exposing Kubernetes and Helm tooling";

/// Build the router. Every request is dispatched against the same
/// immutable server, so handlers can run concurrently.
#[inline]
pub fn make_app(server: Arc<McpServer>) -> Router {
    Router::new()
        .route("/", get(home))
        .route(TOOLS_ENDPOINT, get(list_tools))
        .route("/tools/{name}", post(invoke_tool))
        .route(MCP_ENDPOINT, post(handle_message))
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

/// Bind `host:port` and serve until Ctrl+C
#[inline]
pub async fn run_server(server: Arc<McpServer>, host: &str, port: u16) -> Result<()> {
    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind HTTP server to {}:{}", host, port))?;

    serve(listener, server, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves
#[inline]
pub async fn serve<F>(listener: TcpListener, server: Arc<McpServer>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = listener
        .local_addr()
        .context("Failed to read listener address")?;
    info!(
        "HTTP server listening on http://{} ({} tools)",
        address,
        server.registry().len()
    );

    axum::serve(listener, make_app(server))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received interrupt signal, shutting down"),
        Err(e) => {
            warn!("Unable to listen for Ctrl+C, serving until killed: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// HTTP status for a failed direct invocation
#[inline]
pub fn status_for(error: &McpError) -> StatusCode {
    match error {
        McpError::ParseError { .. } | McpError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
        McpError::MethodNotFound { .. } => StatusCode::NOT_FOUND,
        McpError::InvalidParams { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        McpError::CollaboratorFailure { failure, .. } => match failure.kind {
            FailureKind::InvalidArguments => StatusCode::UNPROCESSABLE_ENTITY,
            FailureKind::CollaboratorUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            FailureKind::CommandFailed | FailureKind::RemoteError | FailureKind::Other => {
                StatusCode::BAD_GATEWAY
            }
        },
        McpError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: &McpError) -> Response {
    error.log();
    let body = json!({ "error": error.to_jsonrpc_error() });
    (status_for(error), Json(body)).into_response()
}

async fn home(State(server): State<Arc<McpServer>>) -> Json<Value> {
    Json(json!({
        "name": server.server_info.name,
        "version": server.server_info.version,
        "description": DESCRIPTION,
        "uptime_secs": server.uptime().as_secs(),
        "started_at": server.started_at().to_rfc3339(),
        "tools_endpoint": format!("{}/{{name}}", TOOLS_ENDPOINT),
        "mcp_endpoint": MCP_ENDPOINT,
    }))
}

async fn list_tools(State(server): State<Arc<McpServer>>) -> Json<Value> {
    let tools: Vec<Value> = server
        .registry()
        .list_all()
        .map(|descriptor| {
            let tool = descriptor.to_tool();
            json!({
                "name": tool.name,
                "description": tool.description,
                "inputSchema": tool.input_schema,
                "endpoint": format!("{}/{}", TOOLS_ENDPOINT, tool.name),
                "method": "POST",
            })
        })
        .collect();

    Json(json!({ "tools": tools }))
}

async fn invoke_tool(
    State(server): State<Arc<McpServer>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    let params = if body.iter().all(u8::is_ascii_whitespace) {
        json!({})
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(params) => params,
            Err(e) => {
                return error_response(&McpError::ParseError {
                    message: e.to_string(),
                });
            }
        }
    };

    debug!("Direct invocation of {}", name);
    match server.invoke_tool(&name, Some(params)).await {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(error) => error_response(&error),
    }
}

async fn handle_message(State(server): State<Arc<McpServer>>, body: Bytes) -> Response {
    let message = match std::str::from_utf8(&body) {
        Ok(raw) => server.handle_message(raw).await,
        Err(e) => {
            let error = McpError::ParseError {
                message: e.to_string(),
            };
            error.log();
            Some(error.to_error_response(None))
        }
    };

    let Some(message) = message else {
        return StatusCode::ACCEPTED.into_response();
    };

    (envelope_status(&message), Json(message)).into_response()
}

fn envelope_status(message: &JsonRpcMessage) -> StatusCode {
    match message.error() {
        Some(error) if error.code == error_codes::PARSE_ERROR => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    }
}
