/// Structured error types for vaultview-core.
///
/// Every variant here is fatal at startup: the binary wraps them with
/// `anyhow` context and exits before binding a listener.
use std::error::Error as StdError;

use thiserror::Error;

/// Render an error and its sources as `outer: inner: root`.
///
/// Variants wrapping another error keep it out of their own message, so each
/// cause appears exactly once.
pub fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Failure to obtain an access token from a credential provider.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The provider is not configured in this environment (missing env vars, no CLI)
    #[error("{provider} unavailable: {reason}")]
    Unavailable {
        provider: &'static str,
        reason: String,
    },

    /// The token endpoint could not be reached
    #[error("{provider} request failed")]
    Network {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The token endpoint answered, but refused to issue a token
    #[error("{provider} authentication failed: {reason}")]
    Rejected {
        provider: &'static str,
        reason: String,
    },

    /// Every provider in a chain failed
    #[error("no credential provider succeeded:\n{}", .attempts.join("\n"))]
    Exhausted { attempts: Vec<String> },
}

/// Key Vault API errors. Raw response bodies are never surfaced.
#[derive(Error, Debug)]
pub enum SecretError {
    #[error("failed to acquire vault token")]
    Credential(#[from] CredentialError),

    #[error("network error communicating with the vault")]
    Network(#[source] reqwest::Error),

    #[error("vault authentication failed (check access policy for this identity)")]
    Unauthorized,

    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("vault rate limit exceeded")]
    RateLimited,

    #[error("vault server error: status {0}")]
    ServerError(u16),

    #[error("unexpected vault response: status {0}")]
    UnexpectedStatus(u16),

    #[error("secret '{0}' has no value")]
    MissingValue(String),
}

/// Invalid startup configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid vault URL '{url}': {reason}")]
    InvalidVaultUrl { url: String, reason: String },

    #[error("secret name must not be empty")]
    EmptySecretName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_chain_lists_each_cause_once() {
        let err = SecretError::Credential(CredentialError::Exhausted {
            attempts: vec!["EnvironmentCredential unavailable: not set".into()],
        });
        let chain = error_chain(&err);
        assert_eq!(
            chain.matches("no credential provider succeeded").count(),
            1,
            "{chain}"
        );
        assert!(chain.starts_with("failed to acquire vault token: "));
        assert!(chain.contains("EnvironmentCredential unavailable"));
    }

    #[test]
    fn wrapping_variants_do_not_repeat_their_source() {
        let err = SecretError::Credential(CredentialError::Unavailable {
            provider: "AzureCliCredential",
            reason: "Azure CLI not installed".into(),
        });
        assert_eq!(err.to_string(), "failed to acquire vault token");
    }
}
