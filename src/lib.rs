use thiserror::Error;

pub type Result<T> = std::result::Result<T, KubeMcpError>;

#[derive(Error, Debug)]
pub enum KubeMcpError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Tool registry error: {0}")]
    Registry(#[from] mcp::RegistryError),

    #[error("MCP error: {0}")]
    Mcp(#[from] mcp::McpError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod bridge;
pub mod capabilities;
pub mod commands;
pub mod config;
pub mod http;
pub mod mcp;
