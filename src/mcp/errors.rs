//! MCP Error Handling
//!
//! Error classification for the dispatcher and its mapping onto JSON-RPC
//! error objects. Every transport renders failures through this module so
//! the same failure always carries the same code.

use crate::mcp::protocol::*;
use crate::mcp::tools::{FailureKind, InvocationFailure, RegistryError};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Everything that can go wrong between an inbound envelope and its answer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum McpError {
    #[error("JSON-RPC parse error: {message}")]
    ParseError { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    #[error("{message}")]
    InvalidParams { message: String, errors: Vec<String> },

    #[error("Tool '{tool}' failed ({}): {}", .failure.kind, .failure.message)]
    CollaboratorFailure {
        tool: String,
        failure: InvocationFailure,
    },

    #[error("Internal server error: {message}")]
    InternalError { message: String },
}

impl McpError {
    /// Convert MCP error to JSON-RPC error
    #[inline]
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        match self {
            Self::ParseError { message } => JsonRpcError::new(
                error_codes::PARSE_ERROR,
                "Parse error".to_string(),
                Some(json!({"detail": message})),
            ),
            Self::InvalidRequest { message } => JsonRpcError::new(
                error_codes::INVALID_REQUEST,
                "Invalid Request".to_string(),
                Some(json!({"detail": message})),
            ),
            Self::MethodNotFound { method } => JsonRpcError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
                None,
            ),
            Self::InvalidParams { message, errors } => JsonRpcError::new(
                error_codes::INVALID_PARAMS,
                message.clone(),
                (!errors.is_empty()).then(|| json!({"errors": errors})),
            ),
            Self::CollaboratorFailure { tool, failure } => {
                let mut data = json!({
                    "tool": tool,
                    "kind": failure.kind,
                    "message": failure.message,
                });
                if let Some(detail) = &failure.detail {
                    data["detail"] = detail.clone();
                }
                JsonRpcError::new(
                    failure_code(failure.kind),
                    format!("Tool '{}' execution failed: {}", tool, failure.message),
                    Some(data),
                )
            }
            Self::InternalError { message } => {
                JsonRpcError::internal_error(Some(message.clone()))
            }
        }
    }

    /// Create error response message
    #[inline]
    pub fn to_error_response(&self, id: Option<RequestId>) -> JsonRpcMessage {
        let error = self.to_jsonrpc_error();
        JsonRpcMessage::ErrorResponse(JsonRpcErrorResponse::new(error, id))
    }

    /// Log the error with appropriate level
    #[inline]
    pub fn log(&self) {
        match self {
            Self::ParseError { .. }
            | Self::InvalidRequest { .. }
            | Self::InvalidParams { .. }
            | Self::MethodNotFound { .. } => {
                warn!("Client error: {}", self);
            }
            Self::CollaboratorFailure { .. } => {
                error!("Collaborator error: {}", self);
            }
            Self::InternalError { .. } => {
                error!("Server error: {}", self);
            }
        }
    }
}

/// Application code for a failed collaborator
#[inline]
pub fn failure_code(kind: FailureKind) -> i32 {
    match kind {
        FailureKind::CommandFailed => app_error_codes::COMMAND_FAILED,
        FailureKind::CollaboratorUnavailable => app_error_codes::COLLABORATOR_UNAVAILABLE,
        FailureKind::RemoteError => app_error_codes::REMOTE_ERROR,
        FailureKind::InvalidArguments => app_error_codes::INVALID_ARGUMENTS,
        FailureKind::Other => app_error_codes::COLLABORATOR_FAILED,
    }
}

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

impl From<RegistryError> for McpError {
    #[inline]
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::NotFound { name } => Self::MethodNotFound { method: name },
            other => Self::InternalError {
                message: other.to_string(),
            },
        }
    }
}
