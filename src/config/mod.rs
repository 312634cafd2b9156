// Configuration management module
// TOML settings for the HTTP server, the stdio bridge and the collaborators

pub mod settings;

pub use settings::{
    BridgeConfig, BridgeMode, CONFIG_FILE_NAME, Config, ConfigError, ServerConfig, ToolsConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
