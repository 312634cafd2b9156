use clap::{Parser, Subcommand};
use kube_mcp::Result;
use kube_mcp::commands::{init_config, list_tools, serve_http, serve_stdio, show_config};
use kube_mcp::config::{BridgeMode, Config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kube-mcp")]
#[command(about = "MCP server exposing Kubernetes and Helm tooling over HTTP and stdio")]
#[command(version)]
struct Cli {
    /// Configuration directory (defaults to ~/.kube-mcp)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve tools and the JSON-RPC endpoint over HTTP
    Http {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to bind
        #[arg(long)]
        port: Option<u16>,
    },
    /// Bridge JSON-RPC between stdin/stdout and the dispatcher
    Stdio {
        /// Dispatch in this process or relay to an HTTP server
        #[arg(long, value_enum)]
        mode: Option<BridgeMode>,
        /// HTTP server to relay to
        #[arg(long)]
        server_url: Option<String>,
        /// Relay to --server-url instead of starting a private server
        #[arg(long)]
        no_spawn: bool,
    },
    /// List the available tools
    Tools,
    /// Show the current configuration
    Config {
        /// Write a default configuration file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout is reserved for protocol traffic in stdio mode
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => Config::config_dir()?,
    };

    if let Commands::Config { init: true } = cli.command {
        init_config(&config_dir)?;
        return Ok(());
    }

    let mut config = Config::load(&config_dir)?;

    match cli.command {
        Commands::Http { host, port } => {
            if let Some(host) = host {
                config.server.set_host(host)?;
            }
            if let Some(port) = port {
                config.server.set_port(port)?;
            }
            serve_http(&config).await?;
        }
        Commands::Stdio {
            mode,
            server_url,
            no_spawn,
        } => {
            if let Some(mode) = mode {
                config.bridge.mode = mode;
            }
            if let Some(server_url) = server_url {
                config.bridge.set_server_url(server_url)?;
            }
            if no_spawn {
                config.bridge.spawn_server = false;
            }
            serve_stdio(&config).await?;
        }
        Commands::Tools => {
            list_tools(&config)?;
        }
        Commands::Config { .. } => {
            show_config(&config)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn http_command_with_overrides() {
        let cli = Cli::try_parse_from(["kube-mcp", "http", "--host", "0.0.0.0", "--port", "9000"])
            .expect("valid command line");

        let Commands::Http { host, port } = cli.command else {
            panic!("expected http command");
        };
        assert_eq!(host.as_deref(), Some("0.0.0.0"));
        assert_eq!(port, Some(9000));
    }

    #[test]
    fn stdio_command_defaults() {
        let cli = Cli::try_parse_from(["kube-mcp", "stdio"]).expect("valid command line");

        let Commands::Stdio {
            mode,
            server_url,
            no_spawn,
        } = cli.command
        else {
            panic!("expected stdio command");
        };
        assert_eq!(mode, None);
        assert_eq!(server_url, None);
        assert!(!no_spawn);
    }

    #[test]
    fn stdio_relay_mode() {
        let cli = Cli::try_parse_from([
            "kube-mcp",
            "stdio",
            "--mode",
            "relay",
            "--server-url",
            "http://10.0.0.5:8080/",
            "--no-spawn",
        ])
        .expect("valid command line");

        let Commands::Stdio {
            mode,
            server_url,
            no_spawn,
        } = cli.command
        else {
            panic!("expected stdio command");
        };
        assert_eq!(mode, Some(BridgeMode::Relay));
        assert_eq!(server_url.as_deref(), Some("http://10.0.0.5:8080/"));
        assert!(no_spawn);
    }

    #[test]
    fn global_config_dir() {
        let cli = Cli::try_parse_from(["kube-mcp", "tools", "--config-dir", "/tmp/kube"])
            .expect("valid command line");
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/kube")));
        assert!(matches!(cli.command, Commands::Tools));

        let cli = Cli::try_parse_from(["kube-mcp", "--config-dir", "/tmp/kube", "config", "--init"])
            .expect("valid command line");
        assert!(matches!(cli.command, Commands::Config { init: true }));
    }

    #[test]
    fn invalid_mode() {
        let cli = Cli::try_parse_from(["kube-mcp", "stdio", "--mode", "carrier-pigeon"]);

        let Err(err) = cli else {
            panic!("unknown mode must be rejected");
        };
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["kube-mcp", "invalid"]);

        let Err(err) = cli else {
            panic!("unknown command must be rejected");
        };
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["kube-mcp", "--help"]);

        let Err(err) = cli else {
            panic!("help is reported as an error");
        };
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }
}
