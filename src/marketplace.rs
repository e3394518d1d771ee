//! Marketplace provider HTTP client
//!
//! Thin client over the provider's three endpoints: the OAuth token endpoint
//! (refresh grant), the identity API and the account-privileges API. Base
//! URLs are environment-bound and overridable through configuration so tests
//! can point the client at a mock server. Every call carries the configured
//! request timeout; nothing here blocks indefinitely.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::config::MarketplaceConfig;
use crate::credentials::ClientCredentials;

const TOKEN_PATH: &str = "/identity/v1/oauth2/token";
const IDENTITY_PATH: &str = "/commerce/identity/v1/user/";
const PRIVILEGES_PATH: &str = "/sell/account/v1/privilege";

/// Provider environment for one marketplace account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    /// Parse the environment column value
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sandbox" => Some(Self::Sandbox),
            "production" => Some(Self::Production),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }
}

/// Errors from provider calls.
#[derive(Debug, Error)]
pub enum MarketplaceError {
    /// The refresh grant was rejected; `code` carries the provider's OAuth
    /// error code when the response body contained one
    #[error("refresh grant rejected with status {status}: {code}")]
    Grant { status: u16, code: String },
    #[error("provider request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("provider returned a malformed response")]
    MalformedResponse,
}

/// A successful refresh grant: one new token generation.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime of the new access token in seconds
    pub expires_in: i64,
    /// Present only when the provider rotated the refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Status and parsed body of one identity/privileges call.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status: StatusCode,
    pub body: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: Option<String>,
}

/// Client over the marketplace provider's APIs.
#[derive(Debug, Clone)]
pub struct MarketplaceClient {
    http: reqwest::Client,
    config: MarketplaceConfig,
}

impl MarketplaceClient {
    /// Build a client with the configured bounded timeout
    pub fn new(config: MarketplaceConfig) -> Result<Self, MarketplaceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .build()?;
        Ok(Self { http, config })
    }

    fn auth_base(&self, environment: Environment) -> &str {
        match environment {
            Environment::Sandbox => &self.config.sandbox.auth_base,
            Environment::Production => &self.config.production.auth_base,
        }
    }

    fn api_base(&self, environment: Environment) -> &str {
        match environment {
            Environment::Sandbox => &self.config.sandbox.api_base,
            Environment::Production => &self.config.production.api_base,
        }
    }

    /// Environment-bound redirect identifier (RuName) required by the
    /// refresh grant, if one is configured
    pub fn ru_name(&self, environment: Environment) -> Option<&str> {
        match environment {
            Environment::Sandbox => self.config.sandbox.ru_name.as_deref(),
            Environment::Production => self.config.production.ru_name.as_deref(),
        }
    }

    /// Scope string to send when the stored scope is blank
    pub fn default_scope(&self) -> &str {
        &self.config.default_scope
    }

    /// Execute an OAuth2 `grant_type=refresh_token` request.
    ///
    /// Client credentials travel as HTTP Basic auth; the body carries the
    /// refresh token, the environment's redirect identifier and the scope.
    pub async fn refresh_grant(
        &self,
        environment: Environment,
        credentials: &ClientCredentials,
        refresh_token: &str,
        ru_name: &str,
        scope: &str,
    ) -> Result<TokenGrant, MarketplaceError> {
        let url = format!("{}{}", self.auth_base(environment), TOKEN_PATH);

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("redirect_uri", ru_name),
            ("scope", scope),
        ];

        let response = self
            .http
            .post(&url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let code = response
                .json::<OAuthErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| "server_error".to_string());

            tracing::warn!(
                environment = environment.as_str(),
                status = status.as_u16(),
                error = %code,
                "Refresh grant rejected by provider"
            );

            return Err(MarketplaceError::Grant {
                status: status.as_u16(),
                code,
            });
        }

        response
            .json::<TokenGrant>()
            .await
            .map_err(|_| MarketplaceError::MalformedResponse)
    }

    /// Call the identity endpoint with a bearer token
    pub async fn get_identity(
        &self,
        environment: Environment,
        access_token: &str,
    ) -> Result<ProviderResponse, MarketplaceError> {
        self.get_json(environment, IDENTITY_PATH, access_token)
            .await
    }

    /// Call the account-privileges endpoint with a bearer token
    pub async fn get_privileges(
        &self,
        environment: Environment,
        access_token: &str,
    ) -> Result<ProviderResponse, MarketplaceError> {
        self.get_json(environment, PRIVILEGES_PATH, access_token)
            .await
    }

    async fn get_json(
        &self,
        environment: Environment,
        path: &str,
        access_token: &str,
    ) -> Result<ProviderResponse, MarketplaceError> {
        let url = format!("{}{}", self.api_base(environment), path);

        let response = self.http.get(&url).bearer_auth(access_token).send().await?;

        let status = response.status();
        let body = response
            .json::<serde_json::Value>()
            .await
            .unwrap_or(serde_json::Value::Null);

        Ok(ProviderResponse { status, body })
    }
}
