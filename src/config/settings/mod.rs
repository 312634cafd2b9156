
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Where the HTTP transport listens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// How the stdio bridge reaches a dispatcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BridgeMode {
    /// Dispatch in the bridge's own process
    #[default]
    InProcess,
    /// Relay every line to an HTTP server
    Relay,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub mode: BridgeMode,
    pub server_url: String,
    /// In relay mode, start a private HTTP server child instead of using
    /// `server_url`
    pub spawn_server: bool,
    pub startup_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            mode: BridgeMode::InProcess,
            server_url: "http://127.0.0.1:8080/".to_string(),
            spawn_server: true,
            startup_timeout_secs: 10,
        }
    }
}

/// Programs backing the command-line collaborators
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    pub kubectl: String,
    pub helm: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            helm: "helm".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid host: {0}")]
    InvalidHost(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid startup timeout: {0} (must be between 1 and 300 seconds)")]
    InvalidStartupTimeout(u64),
    #[error("Invalid program for {0}: cannot be empty")]
    InvalidProgram(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default configuration directory, `~/.kube-mcp`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".kube-mcp"))
            .or_else(|| dirs::config_dir().map(|config| config.join("kube-mcp")))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from `config_dir`. A missing file yields defaults.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.bridge.validate()?;
        self.tools.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidHost(self.host.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        self.base_url()?;
        Ok(())
    }

    /// URL clients use to reach this server
    #[inline]
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("http://{}:{}/", self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidHost(self.host.clone()))
    }

    #[inline]
    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    #[inline]
    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let candidate = ServerConfig {
            host: host.clone(),
            ..self.clone()
        };
        candidate.validate()?;
        self.host = host;
        Ok(())
    }
}

impl BridgeConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server_url()?;

        if !(1..=300).contains(&self.startup_timeout_secs) {
            return Err(ConfigError::InvalidStartupTimeout(
                self.startup_timeout_secs,
            ));
        }

        Ok(())
    }

    /// Parsed `server_url`, normalized to end with `/` so endpoint paths
    /// join beneath it
    #[inline]
    pub fn server_url(&self) -> Result<Url, ConfigError> {
        let mut url = Url::parse(&self.server_url)
            .map_err(|_| ConfigError::InvalidUrl(self.server_url.clone()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
        }

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(url)
    }

    #[inline]
    pub fn set_server_url(&mut self, server_url: String) -> Result<(), ConfigError> {
        let candidate = BridgeConfig {
            server_url: server_url.clone(),
            ..self.clone()
        };
        candidate.server_url()?;
        self.server_url = server_url;
        Ok(())
    }

    #[inline]
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

impl ToolsConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kubectl.trim().is_empty() {
            return Err(ConfigError::InvalidProgram("kubectl"));
        }
        if self.helm.trim().is_empty() {
            return Err(ConfigError::InvalidProgram("helm"));
        }
        Ok(())
    }
}
