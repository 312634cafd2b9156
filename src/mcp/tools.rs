//! MCP Tools Implementation
//!
//! This module provides the capability contract every tool implements and
//! the registry the dispatcher resolves method names against.

use crate::mcp::protocol::{Tool, is_reserved_method};
use crate::mcp::validation::ParamsSchema;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Static metadata describing one capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema for the parameters. `None` means params are passed
    /// through unvalidated.
    pub input_schema: Option<Value>,
}

impl ToolDescriptor {
    #[inline]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: None,
        }
    }

    #[inline]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Wire form advertised by `tools/list`
    #[inline]
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self
                .input_schema
                .clone()
                .unwrap_or_else(|| json!({"type": "object", "additionalProperties": true})),
        }
    }
}

/// Why a collaborator could not do its job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// An external command ran and exited unsuccessfully
    CommandFailed,
    /// The collaborator could not be reached or is not installed
    CollaboratorUnavailable,
    /// A remote API answered with an error
    RemoteError,
    /// Arguments passed schema validation but the collaborator rejected them
    InvalidArguments,
    Other,
}

impl fmt::Display for FailureKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CommandFailed => "command_failed",
            Self::CollaboratorUnavailable => "collaborator_unavailable",
            Self::RemoteError => "remote_error",
            Self::InvalidArguments => "invalid_arguments",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// Failure half of an [`InvocationResult`]
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationFailure {
    pub kind: FailureKind,
    pub message: String,
    pub detail: Option<Value>,
}

/// Outcome of a single capability invocation
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    Success(Value),
    Failure(InvocationFailure),
}

impl InvocationResult {
    #[inline]
    pub fn success(payload: Value) -> Self {
        Self::Success(payload)
    }

    #[inline]
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure(InvocationFailure {
            kind,
            message: message.into(),
            detail: None,
        })
    }

    #[inline]
    pub fn failure_with_detail(kind: FailureKind, message: impl Into<String>, detail: Value) -> Self {
        Self::Failure(InvocationFailure {
            kind,
            message: message.into(),
            detail: Some(detail),
        })
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// A named, externally invocable operation.
///
/// `invoke` must report every collaborator failure through
/// [`InvocationResult::Failure`]; it never returns an error type.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn describe(&self) -> ToolDescriptor;

    async fn invoke(&self, params: Value) -> InvocationResult;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool already registered: {name}")]
    DuplicateName { name: String },

    #[error("Tool not found: {name}")]
    NotFound { name: String },

    #[error("Tool name is reserved by the protocol: {name}")]
    ReservedName { name: String },

    #[error("Invalid input schema for tool {name}: {message}")]
    InvalidSchema { name: String, message: String },
}

/// A registered capability: metadata, compiled schema and handler
pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    pub schema: Option<ParamsSchema>,
    pub handler: Arc<dyn ToolHandler>,
}

/// Catalog of capabilities, populated once before serving.
///
/// Lookups take `&self` only, so a populated registry can be shared behind
/// an `Arc` without any lock.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create a new tool registry
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under an explicit descriptor
    #[inline]
    pub fn register<H>(&mut self, descriptor: ToolDescriptor, handler: H) -> Result<(), RegistryError>
    where
        H: ToolHandler + 'static,
    {
        self.register_arc(descriptor, Arc::new(handler))
    }

    /// Register a handler under the descriptor it reports for itself
    #[inline]
    pub fn register_handler<H>(&mut self, handler: H) -> Result<(), RegistryError>
    where
        H: ToolHandler + 'static,
    {
        let descriptor = handler.describe();
        self.register(descriptor, handler)
    }

    #[inline]
    pub fn register_arc(
        &mut self,
        descriptor: ToolDescriptor,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), RegistryError> {
        let name = descriptor.name.clone();

        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateName { name });
        }
        if is_reserved_method(&name) {
            return Err(RegistryError::ReservedName { name });
        }

        let schema = descriptor
            .input_schema
            .as_ref()
            .map(ParamsSchema::compile)
            .transpose()
            .map_err(|message| RegistryError::InvalidSchema {
                name: name.clone(),
                message,
            })?;

        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(RegisteredTool {
            descriptor,
            schema,
            handler,
        });

        debug!("Registered tool: {}", name);
        Ok(())
    }

    /// Get the handler registered under `name`
    #[inline]
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn ToolHandler>, RegistryError> {
        self.entry(name).map(|entry| Arc::clone(&entry.handler))
    }

    /// Get the full registration for `name`
    #[inline]
    pub fn entry(&self, name: &str) -> Result<&RegisteredTool, RegistryError> {
        self.index
            .get(name)
            .and_then(|&position| self.entries.get(position))
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })
    }

    /// Descriptors in registration order. The iterator is lazy and can be
    /// cloned to restart from the beginning.
    #[inline]
    pub fn list_all(&self) -> impl Iterator<Item = &ToolDescriptor> + Clone {
        self.entries.iter().map(|entry| &entry.descriptor)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticTool {
        name: &'static str,
    }

    #[async_trait]
    impl ToolHandler for StaticTool {
        fn describe(&self) -> ToolDescriptor {
            ToolDescriptor::new(self.name, "static test tool")
        }

        async fn invoke(&self, _params: Value) -> InvocationResult {
            InvocationResult::success(json!({"tool": self.name}))
        }
    }

    #[test]
    fn lookup_returns_registered_instance() {
        let mut registry = ToolRegistry::new();
        let handler: Arc<dyn ToolHandler> = Arc::new(StaticTool { name: "alpha" });

        registry
            .register_arc(handler.describe(), Arc::clone(&handler))
            .expect("registers");

        let found = registry.lookup("alpha").expect("registered tool is found");
        assert!(Arc::ptr_eq(&found, &handler));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry
            .register_handler(StaticTool { name: "alpha" })
            .expect("first registration succeeds");

        let err = registry
            .register_handler(StaticTool { name: "alpha" })
            .expect_err("second registration fails");
        assert_eq!(
            err,
            RegistryError::DuplicateName {
                name: "alpha".to_string()
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn missing_tool_is_not_found() {
        let registry = ToolRegistry::new();
        assert!(matches!(
            registry.lookup("ghost"),
            Err(RegistryError::NotFound { name }) if name == "ghost"
        ));
    }

    #[test]
    fn reserved_names_are_rejected() {
        let mut registry = ToolRegistry::new();
        let err = registry
            .register_handler(StaticTool { name: "tools/list" })
            .expect_err("reserved name fails");
        assert!(matches!(err, RegistryError::ReservedName { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn invalid_schema_is_rejected() {
        let mut registry = ToolRegistry::new();
        let descriptor =
            ToolDescriptor::new("broken", "bad schema").with_schema(json!({"type": 12}));

        let err = registry
            .register(descriptor, StaticTool { name: "broken" })
            .expect_err("schema does not compile");
        assert!(matches!(err, RegistryError::InvalidSchema { .. }));
    }

    #[test]
    fn listing_preserves_registration_order_and_restarts() {
        let mut registry = ToolRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry
                .register_handler(StaticTool { name })
                .expect("registers");
        }

        let listing = registry.list_all();
        let first: Vec<&str> = listing.clone().map(|d| d.name.as_str()).collect();
        let second: Vec<&str> = listing.map(|d| d.name.as_str()).collect();

        assert_eq!(first, vec!["zeta", "alpha", "mid"]);
        assert_eq!(first, second);
    }

    #[test]
    fn schemaless_descriptor_advertises_open_object() {
        let tool = ToolDescriptor::new("open", "no schema").to_tool();
        assert_eq!(
            tool.input_schema,
            json!({"type": "object", "additionalProperties": true})
        );
    }

    #[test]
    fn failure_kind_display_matches_serde() {
        for kind in [
            FailureKind::CommandFailed,
            FailureKind::CollaboratorUnavailable,
            FailureKind::RemoteError,
            FailureKind::InvalidArguments,
            FailureKind::Other,
        ] {
            let serialized = serde_json::to_value(kind).expect("serializes");
            assert_eq!(serialized, Value::String(kind.to_string()));
        }
    }
}
