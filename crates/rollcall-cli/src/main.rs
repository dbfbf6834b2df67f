//! `rollcall` binary: loads the TOML config and runs the gateway.

use clap::{Parser, Subcommand};
use rollcall_gateway::middleware::digest;
use rollcall_gateway::{GatewayServer, TokenEntry, TokenVerifier};
use rollcall_session::FileAttendanceStore;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall: live classroom attendance server")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "rollcall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the attendance server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the SHA-256 digest of a token for use in `[[auth.tokens]]`
    HashToken {
        /// The raw bearer token
        token: String,
    },
}

#[derive(Deserialize)]
struct RollcallConfig {
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    auth: AuthConfig,
}

#[derive(Deserialize)]
struct ServerConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Deserialize, Default)]
struct AuthConfig {
    #[serde(default)]
    tokens: Vec<TokenEntry>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}

async fn load_config(path: &Path) -> anyhow::Result<RollcallConfig> {
    let config_str = tokio::fs::read_to_string(path).await.map_err(|e| {
        anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
    })?;
    Ok(toml::from_str(&config_str)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            let config = load_config(&cli.config).await?;
            let host = host.unwrap_or(config.server.host);
            let port = port.unwrap_or(config.server.port);

            let verifier = TokenVerifier::new(config.auth.tokens);
            if verifier.is_empty() {
                warn!("No tokens configured; every connection will be rejected");
            } else {
                info!(tokens = verifier.len(), "Token auth enabled");
            }

            let store = Arc::new(FileAttendanceStore::new(config.data_dir.clone()).await?);
            info!(data_dir = %config.data_dir.display(), "Attendance store ready");

            let app = GatewayServer::build(Arc::new(verifier), store);

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("Rollcall listening on {}", addr);
            rollcall_gateway::server::serve(listener, app).await?;
        }
        Commands::HashToken { token } => {
            println!("{}", digest(&token));
        }
    }

    Ok(())
}
