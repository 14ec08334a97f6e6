//! Key Vault HTTP client for secret reads.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::VaultConfig;
use crate::connection::ConnectionString;
use crate::credential::{TokenCredential, KEY_VAULT_SCOPE};
use crate::error::SecretError;

/// Key Vault data-plane API version.
pub const API_VERSION: &str = "7.4";

/// Secret bundle returned by `GET /secrets/{name}`.
#[derive(Debug, Deserialize)]
struct SecretBundle {
    value: Option<String>,
}

/// Key Vault REST API client.
#[derive(Clone)]
pub struct SecretClient {
    http: reqwest::Client,
    vault_url: String,
    credential: Arc<dyn TokenCredential>,
}

impl SecretClient {
    fn user_agent() -> String {
        format!("vaultview/{}", env!("CARGO_PKG_VERSION"))
    }

    /// Shared HTTP client for the vault and token endpoints.
    pub fn http_client() -> Result<reqwest::Client, SecretError> {
        reqwest::Client::builder()
            .user_agent(Self::user_agent())
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(SecretError::Network)
    }

    pub fn new(
        http: reqwest::Client,
        vault_url: impl Into<String>,
        credential: Arc<dyn TokenCredential>,
    ) -> Self {
        let vault_url = vault_url.into().trim_end_matches('/').to_owned();
        Self {
            http,
            vault_url,
            credential,
        }
    }

    /// Read the current version of a secret.
    pub async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        let token = self.credential.get_token(KEY_VAULT_SCOPE).await?;

        let url = format!("{}/secrets/{}", self.vault_url, urlencoding::encode(name));
        debug!(%url, "Fetching secret");
        let resp = self
            .http
            .get(&url)
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(token.secret())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(SecretError::Network)?;

        match resp.status().as_u16() {
            200 => {
                let bundle = resp
                    .json::<SecretBundle>()
                    .await
                    .map_err(SecretError::Network)?;
                bundle
                    .value
                    .ok_or_else(|| SecretError::MissingValue(name.to_owned()))
            }
            401 | 403 => Err(SecretError::Unauthorized),
            404 => Err(SecretError::NotFound(name.to_owned())),
            429 => Err(SecretError::RateLimited),
            status @ 500..=599 => Err(SecretError::ServerError(status)),
            other => Err(SecretError::UnexpectedStatus(other)),
        }
    }
}

/// Fetch the database connection string named by `config`.
///
/// Called exactly once at startup. The value is never logged.
pub async fn fetch_connection_string(
    http: reqwest::Client,
    config: &VaultConfig,
    credential: Arc<dyn TokenCredential>,
) -> Result<ConnectionString, SecretError> {
    let client = SecretClient::new(http, &config.vault_url, credential);
    let value = client.get_secret(&config.secret_name).await?;
    info!(
        vault = %config.vault_url,
        secret = %config.secret_name,
        "Retrieved database connection string"
    );
    Ok(ConnectionString::new(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::AccessToken;
    use crate::error::CredentialError;
    use async_trait::async_trait;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticToken;

    #[async_trait]
    impl TokenCredential for StaticToken {
        fn name(&self) -> &'static str {
            "StaticToken"
        }

        async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
            assert_eq!(scope, KEY_VAULT_SCOPE);
            Ok(AccessToken::new("vault-token"))
        }
    }

    struct NoToken;

    #[async_trait]
    impl TokenCredential for NoToken {
        fn name(&self) -> &'static str {
            "NoToken"
        }

        async fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
            Err(CredentialError::Unavailable {
                provider: "NoToken",
                reason: "nothing configured".into(),
            })
        }
    }

    fn client(uri: String) -> SecretClient {
        SecretClient::new(reqwest::Client::new(), uri, Arc::new(StaticToken))
    }

    #[test]
    fn user_agent_contains_version() {
        assert!(SecretClient::user_agent().starts_with("vaultview/"));
    }

    #[tokio::test]
    async fn get_secret_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secrets/DbConnectionString"))
            .and(query_param("api-version", API_VERSION))
            .and(header("authorization", "Bearer vault-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": "postgres://app:pw@db/app",
                "id": "https://kv.vault.azure.net/secrets/DbConnectionString/abc",
                "attributes": { "enabled": true }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let value = client(server.uri())
            .get_secret("DbConnectionString")
            .await
            .unwrap();
        assert_eq!(value, "postgres://app:pw@db/app");
    }

    #[tokio::test]
    async fn get_secret_maps_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secrets/Missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(server.uri()).get_secret("Missing").await.unwrap_err();
        assert!(matches!(err, SecretError::NotFound(name) if name == "Missing"));
    }

    #[tokio::test]
    async fn get_secret_maps_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secrets/DbConnectionString"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = client(server.uri())
            .get_secret("DbConnectionString")
            .await
            .unwrap_err();
        assert!(matches!(err, SecretError::Unauthorized));
    }

    #[tokio::test]
    async fn get_secret_maps_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secrets/DbConnectionString"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(server.uri())
            .get_secret("DbConnectionString")
            .await
            .unwrap_err();
        assert!(matches!(err, SecretError::ServerError(503)));
    }

    #[tokio::test]
    async fn get_secret_without_value_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secrets/DbConnectionString"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "x" })),
            )
            .mount(&server)
            .await;

        let err = client(server.uri())
            .get_secret("DbConnectionString")
            .await
            .unwrap_err();
        assert!(matches!(err, SecretError::MissingValue(_)));
    }

    #[tokio::test]
    async fn credential_failure_skips_vault_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = SecretClient::new(reqwest::Client::new(), server.uri(), Arc::new(NoToken));
        let err = client.get_secret("DbConnectionString").await.unwrap_err();
        assert!(matches!(err, SecretError::Credential(_)));
    }

    #[tokio::test]
    async fn fetch_connection_string_uses_given_client() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secrets/DbConnectionString"))
            .and(header("user-agent", "vaultview-shared"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": "postgres://app:pw@db/app"
            })))
            .mount(&server)
            .await;

        let config = VaultConfig::new(&server.uri(), "DbConnectionString").unwrap();
        let http = reqwest::Client::builder()
            .user_agent("vaultview-shared")
            .build()
            .unwrap();
        let cs = fetch_connection_string(http, &config, Arc::new(StaticToken))
            .await
            .unwrap();
        assert_eq!(cs.expose(), "postgres://app:pw@db/app");
    }
}
