//! MCP (Model Context Protocol) Server Implementation
//!
//! This module provides the JSON-RPC 2.0 dispatcher, the tool registry it
//! resolves against, and the wire types shared by every transport.

#[cfg(test)]
mod tests;

pub mod errors;
pub mod protocol;
pub mod server;
pub mod tools;
pub mod validation;

pub use errors::{McpError, McpResult};
pub use protocol::*;
pub use server::McpServer;
pub use tools::{
    FailureKind, InvocationFailure, InvocationResult, RegistryError, ToolDescriptor, ToolHandler,
    ToolRegistry,
};
