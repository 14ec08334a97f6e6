//! vaultview - serve the Users table from a vault-configured database
//!
//! Startup fetches the database connection string from Azure Key Vault
//! using the ambient platform identity. If that fails the process exits
//! without binding a port. Once running, every `GET /` opens a fresh
//! connection, runs `SELECT * FROM Users`, and renders the result.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use vaultview_core::config::{self, DEFAULT_SECRET_NAME, DEFAULT_VAULT_URL};
use vaultview_core::{fetch_connection_string, ChainedCredential, SecretClient, VaultConfig};
use vaultview_server::db::is_odbc_style;
use vaultview_server::{run_server, AppState, PgRowSource, ServerConfig, Views};

mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "vaultview",
    author,
    version,
    about = "Serve the Users table from a database whose connection string lives in Azure Key Vault"
)]
struct Cli {
    /// Key Vault URL holding the connection string secret
    #[arg(long, env = "VAULTVIEW_VAULT_URL", default_value = DEFAULT_VAULT_URL)]
    vault_url: String,

    /// Name of the secret containing the database connection string
    #[arg(long, env = "VAULTVIEW_SECRET_NAME", default_value = DEFAULT_SECRET_NAME)]
    secret_name: String,

    /// Address to bind to
    #[arg(long, short = 'b', env = "VAULTVIEW_BIND", default_value = "127.0.0.1:5000")]
    bind: SocketAddr,

    /// Show the raw connection string (credentials included) on the Users page
    #[arg(long, env = "VAULTVIEW_EXPOSE_CONNECTION_STRING")]
    expose_connection_string: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = config::load_dotenv();
    let cli = Cli::parse();

    tracing_setup::init(&tracing_setup::TracingConfig { debug: cli.debug })?;
    dotenv.log();

    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let vault = VaultConfig::new(&cli.vault_url, &cli.secret_name)
        .context("Invalid vault configuration")?;

    let http = SecretClient::http_client().context("Failed to build HTTP client")?;
    let credential = Arc::new(ChainedCredential::default_chain(http.clone()));

    info!(
        vault = %vault.vault_url,
        secret = %vault.secret_name,
        "Fetching database connection string"
    );
    let connection_string = fetch_connection_string(http, &vault, credential)
        .await
        .with_context(|| {
            format!(
                "Failed to read secret '{}' from {}",
                vault.secret_name, vault.vault_url
            )
        })?;

    if is_odbc_style(connection_string.expose()) {
        warn!("Connection string looks ODBC-style (Driver=...;Server=...); every request will fail until it is stored as a PostgreSQL URL");
    }

    let views = Views::new().context("Failed to load templates")?;
    let rows = Arc::new(PgRowSource::new(connection_string.clone()));

    if cli.expose_connection_string {
        warn!("Connection string exposure enabled: database credentials will appear in rendered pages");
    }
    let state = AppState::new(rows, views, connection_string, cli.expose_connection_string);

    run_server(state, ServerConfig { bind_addr: cli.bind })
        .await
        .context("Server error")?;

    Ok(())
}
