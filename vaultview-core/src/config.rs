//! Startup configuration: vault location, secret name, `.env` loading.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::error::ConfigError;

/// Key Vault holding the database secret.
pub const DEFAULT_VAULT_URL: &str = "https://Vault-test-ca-cen.vault.azure.net/";

/// Name of the secret whose value is the database connection string.
pub const DEFAULT_SECRET_NAME: &str = "DbConnectionString";

/// Where to find the connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// Vault base URL without a trailing slash
    pub vault_url: String,
    pub secret_name: String,
}

impl VaultConfig {
    /// Validate and normalise the vault URL and secret name.
    pub fn new(vault_url: &str, secret_name: &str) -> Result<Self, ConfigError> {
        let vault_url = validate_vault_url(vault_url)?;
        let secret_name = secret_name.trim();
        if secret_name.is_empty() {
            return Err(ConfigError::EmptySecretName);
        }
        Ok(Self {
            vault_url,
            secret_name: secret_name.to_owned(),
        })
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            vault_url: DEFAULT_VAULT_URL.trim_end_matches('/').to_owned(),
            secret_name: DEFAULT_SECRET_NAME.to_owned(),
        }
    }
}

/// Accept `https://` URLs, and `http://` only for localhost.
fn validate_vault_url(url: &str) -> Result<String, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidVaultUrl {
        url: url.to_owned(),
        reason: reason.to_owned(),
    };

    let parsed = reqwest::Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
    let host = parsed.host_str().ok_or_else(|| invalid("missing host"))?;

    match parsed.scheme() {
        "https" => {}
        "http" if host == "localhost" || host == "127.0.0.1" => {}
        "http" => return Err(invalid("plain http is only allowed for localhost")),
        other => return Err(invalid(&format!("unsupported scheme '{other}'"))),
    }

    Ok(url.trim_end_matches('/').to_owned())
}

/// What [`load_dotenv`] found.
///
/// Dotenv loading has to happen before CLI parsing (clap reads `env`
/// defaults), which is before tracing exists, so the outcome is returned
/// and logged once the subscriber is installed.
#[derive(Debug, Default)]
pub struct DotenvReport {
    pub loaded: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl DotenvReport {
    pub fn log(&self) {
        for (path, err) in &self.failed {
            warn!("Failed to load {}: {}", path.display(), err);
        }
        if self.loaded.is_empty() {
            debug!("No .env files found, using process environment only");
        } else {
            let paths: Vec<_> = self.loaded.iter().map(|p| p.display().to_string()).collect();
            info!("Loaded configuration from: {}", paths.join(", "));
        }
    }
}

/// Load environment variables from .env files
///
/// Priority order (highest to lowest):
/// 1. Variables already set in the environment
/// 2. Current directory .env
/// 3. ~/.vaultview/.env
pub fn load_dotenv() -> DotenvReport {
    let mut report = DotenvReport::default();

    match dotenvy::dotenv() {
        Ok(path) => report.loaded.push(path),
        Err(e) if e.not_found() => {}
        Err(e) => report.failed.push((PathBuf::from(".env"), e.to_string())),
    }

    if let Some(env_file) = config_dir().map(|dir| dir.join(".env")) {
        if env_file.exists() {
            // dotenvy doesn't overwrite existing vars
            match dotenvy::from_path(&env_file) {
                Ok(()) => report.loaded.push(env_file),
                Err(e) => report.failed.push((env_file, e.to_string())),
            }
        }
    }

    report
}

/// The vaultview config directory (~/.vaultview)
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".vaultview"))
}
