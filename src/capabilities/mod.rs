//! Concrete capability set served by both transports.
//!
//! The catalog is an explicit list: adding a capability means adding a
//! line to [`default_registry`], never discovering code at runtime.


pub mod command;
pub mod echo;
pub mod helm;
pub mod kubectl;

use crate::config::ToolsConfig;
use crate::mcp::tools::{RegistryError, ToolRegistry};
use tracing::info;

pub use command::{CommandArgs, CommandOutput, CommandTool, run_command};
pub use echo::EchoTool;

/// Build the registry served by `http` and `stdio`
#[inline]
pub fn default_registry(tools: &ToolsConfig) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();

    registry.register_handler(EchoTool)?;
    for tool in kubectl::tools(&tools.kubectl) {
        registry.register_handler(tool)?;
    }
    for tool in helm::tools(&tools.helm) {
        registry.register_handler(tool)?;
    }

    info!("Registered {} tools", registry.len());
    Ok(registry)
}
