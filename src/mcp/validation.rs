//! MCP Message Validation
//!
//! JSON schema validation for inbound envelopes and for the parameters of
//! registered tools.

use crate::mcp::errors::McpError;
use crate::mcp::protocol::*;
use anyhow::{Result, anyhow};
use jsonschema::{Draft, JSONSchema};
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::debug;

const REQUEST_SCHEMA: &str = "jsonrpc_request";
const CALL_TOOL_SCHEMA: &str = "call_tool_params";

/// JSON Schema validator for MCP messages
pub struct McpValidator {
    schemas: HashMap<String, JSONSchema>,
}

impl McpValidator {
    /// Create a new MCP validator with built-in schemas
    #[inline]
    pub fn new() -> Result<Self> {
        let mut validator = Self {
            schemas: HashMap::new(),
        };

        validator.load_builtin_schemas()?;

        Ok(validator)
    }

    fn load_builtin_schemas(&mut self) -> Result<()> {
        let request_schema = json!({
            "type": "object",
            "properties": {
                "jsonrpc": {
                    "type": "string",
                    "const": "2.0"
                },
                "method": {"type": "string"},
                "params": {},
                "id": {
                    "oneOf": [
                        {"type": "string"},
                        {"type": "number"},
                        {"type": "null"}
                    ]
                }
            },
            "required": ["jsonrpc", "method"]
        });
        self.add_schema(REQUEST_SCHEMA, &request_schema)?;

        let tool_call_schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "arguments": {"type": ["object", "null"]}
            },
            "required": ["name"]
        });
        self.add_schema(CALL_TOOL_SCHEMA, &tool_call_schema)?;

        debug!("Loaded {} built-in JSON schemas", self.schemas.len());
        Ok(())
    }

    /// Add a JSON schema to the validator
    #[inline]
    pub fn add_schema(&mut self, name: &str, schema: &Value) -> Result<()> {
        let compiled = compile(schema)
            .map_err(|e| anyhow!("Failed to compile schema '{}': {}", name, e))?;

        self.schemas.insert(name.to_string(), compiled);
        Ok(())
    }

    /// Turn a raw JSON value into a request, or explain why it is not one
    #[inline]
    pub fn parse_request(&self, value: &Value) -> Result<JsonRpcRequest, McpError> {
        self.validate_with_schema(REQUEST_SCHEMA, value)
            .map_err(|errors| McpError::InvalidRequest {
                message: errors.join(", "),
            })?;

        serde_json::from_value(value.clone()).map_err(|e| McpError::InvalidRequest {
            message: e.to_string(),
        })
    }

    /// Check and decode `tools/call` parameters
    #[inline]
    pub fn parse_call_tool_params(&self, params: Option<Value>) -> Result<CallToolParams, McpError> {
        let params = params.unwrap_or(Value::Null);
        self.validate_with_schema(CALL_TOOL_SCHEMA, &params)
            .map_err(|errors| McpError::InvalidParams {
                message: "Invalid tools/call parameters".to_string(),
                errors,
            })?;

        serde_json::from_value(params).map_err(|e| McpError::InvalidParams {
            message: "Invalid tools/call parameters".to_string(),
            errors: vec![e.to_string()],
        })
    }

    /// Validate a value against a named schema
    #[inline]
    pub fn validate_with_schema(&self, schema_name: &str, value: &Value) -> Result<(), Vec<String>> {
        let Some(schema) = self.schemas.get(schema_name) else {
            return Err(vec![format!("Schema '{}' not found", schema_name)]);
        };

        collect_errors(schema, value)
    }

    /// Check if a protocol version is supported
    #[inline]
    pub fn is_protocol_version_supported(&self, version: &str) -> bool {
        SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
    }

    /// Pick the version to answer an `initialize` with
    #[inline]
    pub fn negotiate_protocol_version(&self, requested: Option<&str>) -> &'static str {
        requested
            .and_then(|version| {
                SUPPORTED_PROTOCOL_VERSIONS
                    .iter()
                    .find(|supported| **supported == version)
                    .copied()
            })
            .unwrap_or(MCP_VERSION)
    }
}

/// Compiled parameter schema of one tool
pub struct ParamsSchema {
    compiled: JSONSchema,
}

impl ParamsSchema {
    #[inline]
    pub fn compile(schema: &Value) -> Result<Self, String> {
        compile(schema)
            .map(|compiled| Self { compiled })
            .map_err(|e| e.to_string())
    }

    /// Validate params, returning one message per violation
    #[inline]
    pub fn validate(&self, params: &Value) -> Result<(), Vec<String>> {
        collect_errors(&self.compiled, params)
    }
}

fn compile(schema: &Value) -> Result<JSONSchema, jsonschema::ValidationError<'_>> {
    JSONSchema::options().with_draft(Draft::Draft7).compile(schema)
}

fn collect_errors(schema: &JSONSchema, value: &Value) -> Result<(), Vec<String>> {
    if let Err(errors) = schema.validate(value) {
        return Err(errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect());
    }

    Ok(())
}
