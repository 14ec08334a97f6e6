//! Platform credential providers for the vault.
//!
//! The application never handles credentials itself. At startup it asks a
//! [`ChainedCredential`] for a bearer token, which tries each ambient
//! mechanism in turn:
//!
//! 1. Service principal from `AZURE_TENANT_ID` / `AZURE_CLIENT_ID` / `AZURE_CLIENT_SECRET`
//! 2. Managed identity (App Service endpoint or the instance metadata service)
//! 3. A logged-in Azure CLI
//!
//! Environment variables:
//!   AZURE_AUTHORITY_HOST   # Token authority (default: https://login.microsoftonline.com)
//!   IDENTITY_ENDPOINT      # App Service managed identity endpoint
//!   IDENTITY_HEADER        # App Service managed identity secret header

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{error_chain, CredentialError};

/// OAuth scope for Key Vault data-plane access.
pub const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

pub const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

/// IMDS is link-local; off-Azure the connect attempt should fail fast.
const IMDS_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// A bearer token for the vault.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Something that can mint access tokens for a scope.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Provider name used in logs and error messages
    fn name(&self) -> &'static str;

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError>;
}

/// Strip `/.default` to get the v1 "resource" form that managed identity
/// endpoints and the CLI expect.
fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

/// OAuth2 token endpoint response (AAD v2 and managed identity share this shape).
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// OAuth2 error body.
#[derive(Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

/// Read a token out of a response, mapping non-success bodies to `Rejected`.
async fn read_token_response(
    provider: &'static str,
    resp: reqwest::Response,
) -> Result<AccessToken, CredentialError> {
    let status = resp.status();
    if status.is_success() {
        let body = resp
            .json::<TokenResponse>()
            .await
            .map_err(|source| CredentialError::Network { provider, source })?;
        return Ok(AccessToken(body.access_token));
    }

    let reason = match resp.json::<TokenErrorResponse>().await {
        Ok(TokenErrorResponse {
            error_description: Some(desc),
            ..
        }) => desc,
        Ok(TokenErrorResponse {
            error: Some(code), ..
        }) => code,
        _ => format!("status {}", status.as_u16()),
    };
    Err(CredentialError::Rejected { provider, reason })
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Service principal (client secret)
// ============================================================================

#[derive(Debug, Clone)]
struct ClientSecretSettings {
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

/// Service principal credential configured through environment variables.
#[derive(Clone)]
pub struct EnvironmentCredential {
    http: reqwest::Client,
    settings: Option<ClientSecretSettings>,
}

impl EnvironmentCredential {
    pub fn from_env(http: reqwest::Client) -> Self {
        let settings = match (
            env_var("AZURE_TENANT_ID"),
            env_var("AZURE_CLIENT_ID"),
            env_var("AZURE_CLIENT_SECRET"),
        ) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => Some(ClientSecretSettings {
                authority_host: env_var("AZURE_AUTHORITY_HOST")
                    .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_owned()),
                tenant_id,
                client_id,
                client_secret,
            }),
            _ => None,
        };
        Self { http, settings }
    }

    /// Credential against an explicit authority (sovereign clouds, tests).
    pub fn new(
        http: reqwest::Client,
        authority_host: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            settings: Some(ClientSecretSettings {
                authority_host: authority_host.into(),
                tenant_id: tenant_id.into(),
                client_id: client_id.into(),
                client_secret: client_secret.into(),
            }),
        }
    }
}

#[async_trait]
impl TokenCredential for EnvironmentCredential {
    fn name(&self) -> &'static str {
        "EnvironmentCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let provider = self.name();
        let settings = self.settings.as_ref().ok_or_else(|| CredentialError::Unavailable {
            provider,
            reason: "AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET must all be set"
                .into(),
        })?;

        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            settings.authority_host.trim_end_matches('/'),
            urlencoding::encode(&settings.tenant_id)
        );
        let resp = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", settings.client_id.as_str()),
                ("client_secret", settings.client_secret.as_str()),
                ("scope", scope),
            ])
            .send()
            .await
            .map_err(|source| CredentialError::Network { provider, source })?;

        read_token_response(provider, resp).await
    }
}

// ============================================================================
// Managed identity
// ============================================================================

#[derive(Debug, Clone)]
enum ManagedIdentitySource {
    AppService { endpoint: String, header: String },
    Imds { endpoint: String },
}

/// Managed identity of the hosting Azure resource.
#[derive(Clone)]
pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    source: ManagedIdentitySource,
    /// Set for user-assigned identities
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    /// App Service when `IDENTITY_ENDPOINT` and `IDENTITY_HEADER` are set, IMDS otherwise.
    pub fn from_env(http: reqwest::Client) -> Self {
        let source = match (env_var("IDENTITY_ENDPOINT"), env_var("IDENTITY_HEADER")) {
            (Some(endpoint), Some(header)) => ManagedIdentitySource::AppService { endpoint, header },
            _ => ManagedIdentitySource::Imds {
                endpoint: DEFAULT_IMDS_ENDPOINT.to_owned(),
            },
        };
        Self {
            http,
            source,
            client_id: env_var("AZURE_CLIENT_ID"),
        }
    }

    pub fn imds(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            source: ManagedIdentitySource::Imds {
                endpoint: endpoint.into(),
            },
            client_id: None,
        }
    }

    pub fn app_service(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        header: impl Into<String>,
    ) -> Self {
        Self {
            http,
            source: ManagedIdentitySource::AppService {
                endpoint: endpoint.into(),
                header: header.into(),
            },
            client_id: None,
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        "ManagedIdentityCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let provider = self.name();
        let resource = scope_to_resource(scope);

        let mut query = vec![("resource", resource)];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        let request = match &self.source {
            ManagedIdentitySource::AppService { endpoint, header } => {
                query.push(("api-version", APP_SERVICE_API_VERSION));
                self.http
                    .get(endpoint)
                    .header("X-IDENTITY-HEADER", header)
                    .query(&query)
            }
            ManagedIdentitySource::Imds { endpoint } => {
                query.push(("api-version", IMDS_API_VERSION));
                self.http
                    .get(endpoint)
                    .header("Metadata", "true")
                    .query(&query)
                    .timeout(IMDS_CONNECT_TIMEOUT)
            }
        };

        let resp = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                CredentialError::Unavailable {
                    provider,
                    reason: "no managed identity endpoint reachable".into(),
                }
            } else {
                CredentialError::Network { provider, source: e }
            }
        })?;

        read_token_response(provider, resp).await
    }
}

// ============================================================================
// Azure CLI
// ============================================================================

#[cfg(windows)]
const AZ_PROGRAM: &str = "az.cmd";
#[cfg(not(windows))]
const AZ_PROGRAM: &str = "az";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenOutput {
    access_token: String,
}

/// Token from the developer's `az login` session.
#[derive(Debug, Clone, Default)]
pub struct AzureCliCredential;

impl AzureCliCredential {
    pub fn new() -> Self {
        Self
    }
}

fn parse_cli_output(stdout: &[u8]) -> Result<AccessToken, CredentialError> {
    serde_json::from_slice::<CliTokenOutput>(stdout)
        .map(|out| AccessToken(out.access_token))
        .map_err(|e| CredentialError::Rejected {
            provider: "AzureCliCredential",
            reason: format!("unreadable az output: {e}"),
        })
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        "AzureCliCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let provider = self.name();
        let output = tokio::process::Command::new(AZ_PROGRAM)
            .args([
                "account",
                "get-access-token",
                "--resource",
                scope_to_resource(scope),
                "--output",
                "json",
            ])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CredentialError::Unavailable {
                provider,
                reason: if e.kind() == std::io::ErrorKind::NotFound {
                    "Azure CLI not installed".into()
                } else {
                    e.to_string()
                },
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("az exited with an error")
                .trim()
                .to_owned();
            return Err(CredentialError::Unavailable { provider, reason });
        }

        parse_cli_output(&output.stdout)
    }
}

// ============================================================================
// Chain
// ============================================================================

/// Tries each credential in order and returns the first token.
#[derive(Clone)]
pub struct ChainedCredential {
    sources: Vec<Arc<dyn TokenCredential>>,
}

impl ChainedCredential {
    pub fn new(sources: Vec<Arc<dyn TokenCredential>>) -> Self {
        Self { sources }
    }

    /// Environment service principal, then managed identity, then Azure CLI.
    pub fn default_chain(http: reqwest::Client) -> Self {
        Self::new(vec![
            Arc::new(EnvironmentCredential::from_env(http.clone())),
            Arc::new(ManagedIdentityCredential::from_env(http)),
            Arc::new(AzureCliCredential::new()),
        ])
    }
}

#[async_trait]
impl TokenCredential for ChainedCredential {
    fn name(&self) -> &'static str {
        "ChainedCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let mut attempts = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => {
                    debug!(provider = source.name(), "Acquired vault token");
                    return Ok(token);
                }
                Err(e) => {
                    let message = error_chain(&e);
                    debug!(provider = source.name(), error = %message, "Credential provider failed");
                    attempts.push(message);
                }
            }
        }
        Err(CredentialError::Exhausted { attempts })
    }
}
