//! vaultview-core: configuration, credentials, and secret retrieval
//!
//! Resolves the database connection string from Azure Key Vault using the
//! ambient platform identity. Nothing here runs per request.

pub mod config;
pub mod connection;
pub mod credential;
pub mod error;
pub mod secrets;

pub use config::VaultConfig;
pub use connection::ConnectionString;
pub use credential::{ChainedCredential, TokenCredential};
pub use error::{error_chain, ConfigError, CredentialError, SecretError};
pub use secrets::{fetch_connection_string, SecretClient};
