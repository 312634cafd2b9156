use anyhow::{Context, Result};
use console::style;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::bridge::{HttpRelay, InProcessUpstream, ServerProcess, StdioBridge, Upstream};
use crate::capabilities::default_registry;
use crate::config::{BridgeMode, CONFIG_FILE_NAME, Config};
use crate::http::{MCP_ENDPOINT, run_server};
use crate::mcp::McpServer;

/// Build the dispatcher with the full capability set
#[inline]
pub fn build_server(config: &Config) -> Result<McpServer> {
    let registry = default_registry(&config.tools).context("Failed to register tools")?;
    McpServer::new(
        env!("CARGO_PKG_NAME").to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
        registry,
    )
}

/// Serve the HTTP transport until Ctrl+C
#[inline]
pub async fn serve_http(config: &Config) -> Result<()> {
    let server = Arc::new(build_server(config)?);
    run_server(server, &config.server.host, config.server.port).await
}

/// Run the stdio bridge in the configured mode until end of input
#[inline]
pub async fn serve_stdio(config: &Config) -> Result<()> {
    match config.bridge.mode {
        BridgeMode::InProcess => {
            info!("Starting stdio bridge with in-process dispatch");
            let server = Arc::new(build_server(config)?);
            run_bridge(StdioBridge::new(InProcessUpstream::new(server))).await
        }
        BridgeMode::Relay if config.bridge.spawn_server => {
            let mut child = ServerProcess::spawn_current_exe(
                config.get_base_dir(),
                config.bridge.startup_timeout(),
            )
            .await
            .context("Failed to start the relay server")?;
            info!("Relaying stdio to spawned server at {}", child.base_url());

            let relay = HttpRelay::new(child.base_url().clone())?;
            let result = run_bridge(StdioBridge::new(relay)).await;
            child.shutdown().await;
            result
        }
        BridgeMode::Relay => {
            let relay = HttpRelay::new(config.bridge.server_url()?)?;
            relay
                .probe()
                .await
                .with_context(|| format!("Relay target {} is not reachable", config.bridge.server_url))?;
            info!("Relaying stdio to {}", relay.endpoint());
            run_bridge(StdioBridge::new(relay)).await
        }
    }
}

async fn run_bridge<U: Upstream>(bridge: StdioBridge<U>) -> Result<()> {
    tokio::select! {
        result = bridge.serve_stdio() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt signal, stopping bridge");
            Ok(())
        }
    }
}

/// Print the capability catalog to stdout
#[inline]
pub fn list_tools(config: &Config) -> Result<()> {
    let server = build_server(config)?;
    let tools = server.list_tools().tools;

    println!("{}", style(format!("Available tools ({} total):", tools.len())).bold());
    println!();

    for tool in &tools {
        println!("{}", style(&tool.name).bold().cyan());
        println!("   {}", tool.description);

        let required: Vec<&str> = tool
            .input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        if let Some(properties) = tool.input_schema.get("properties").and_then(Value::as_object) {
            for (name, schema) in properties {
                let kind = schema.get("type").and_then(Value::as_str).unwrap_or("any");
                let marker = if required.contains(&name.as_str()) {
                    style(" (required)").yellow().to_string()
                } else {
                    String::new()
                };
                println!("   - {}: {}{}", name, style(kind).dim(), marker);
            }
        }
        println!();
    }

    println!(
        "Invoke over HTTP with POST /tools/<name> or JSON-RPC at {}",
        MCP_ENDPOINT
    );
    Ok(())
}

#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("HTTP Server:").bold().yellow());
    eprintln!("  Host: {}", style(&config.server.host).cyan());
    eprintln!("  Port: {}", style(config.server.port).cyan());

    eprintln!();
    eprintln!("{}", style("Stdio Bridge:").bold().yellow());
    let mode = match config.bridge.mode {
        BridgeMode::InProcess => "in-process",
        BridgeMode::Relay => "relay",
    };
    eprintln!("  Mode: {}", style(mode).cyan());
    match config.bridge.server_url() {
        Ok(url) => eprintln!("  Server URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Server URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Spawn Server: {}", style(config.bridge.spawn_server).cyan());
    eprintln!(
        "  Startup Timeout: {}s",
        style(config.bridge.startup_timeout_secs).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Collaborators:").bold().yellow());
    eprintln!("  kubectl: {}", style(&config.tools.kubectl).cyan());
    eprintln!("  helm: {}", style(&config.tools.helm).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

/// Write a default `config.toml` unless one already exists
#[inline]
pub fn init_config(config_dir: &Path) -> Result<()> {
    let config_path = config_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        eprintln!(
            "{}",
            style(format!(
                "Configuration already exists at {}",
                config_path.display()
            ))
            .yellow()
        );
        return Ok(());
    }

    let config = Config {
        base_dir: config_dir.to_path_buf(),
        ..Config::default()
    };
    config.save().context("Failed to save configuration")?;

    eprintln!("{}", style("✓ Configuration saved successfully!").green());
    eprintln!(
        "Configuration saved to: {}",
        style(config_path.display()).cyan()
    );
    Ok(())
}
