//! Identity backend: the remote half of authentication and logout.
//!
//! Filters talk to the provider only through [`IdentityBackend`], so tests can
//! substitute an in-process double for [`SalesforceIdentityBackend`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use crate::connector::{ConnectorConfig, OAuthConfig};
use crate::context::SecurityContext;
use crate::error::{Error, ErrorKind, Result};

/// Remote operations the filters depend on.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Terminate the session described by `config` on the provider.
    async fn logout(&self, config: &ConnectorConfig) -> Result<()>;

    /// Exchange an authorization code for tokens.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse>;

    /// Fetch the identity of the user a token belongs to.
    async fn user_info(&self, token: &TokenResponse) -> Result<UserInfo>;
}

/// Token response from OAuth.
///
/// Sensitive fields are redacted in Debug output.
#[derive(Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    /// Access token; becomes the session id.
    pub access_token: String,
    /// Instance URL.
    pub instance_url: String,
    /// Identity URL.
    #[serde(default)]
    pub id: Option<String>,
    /// Token type (usually "Bearer").
    #[serde(default)]
    pub token_type: Option<String>,
    /// Scopes granted.
    #[serde(default)]
    pub scope: Option<String>,
    /// Signature for verification.
    #[serde(default)]
    pub signature: Option<String>,
    /// Issued at timestamp.
    #[serde(default)]
    pub issued_at: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("instance_url", &self.instance_url)
            .field("id", &self.id)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("signature", &self.signature.as_ref().map(|_| "[REDACTED]"))
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// User identity returned by the userinfo endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UserInfo {
    pub user_id: String,
    pub organization_id: String,
    #[serde(default)]
    pub preferred_username: String,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub zoneinfo: String,
    #[serde(default)]
    pub role: Option<String>,
}

impl TokenResponse {
    /// Build the security context for an authenticated user.
    ///
    /// The endpoint is the partner SOAP endpoint of the instance for `api_version`.
    pub fn to_security_context(&self, user: &UserInfo, api_version: &str) -> Result<SecurityContext> {
        let instance = Url::parse(&self.instance_url)?;
        let endpoint = instance.join(&format!(
            "/services/Soap/u/{}/{}",
            api_version, user.organization_id
        ))?;

        Ok(SecurityContext::new(&self.access_token, endpoint)
            .with_org_id(&user.organization_id)
            .with_user_id(&user.user_id)
            .with_user_name(&user.preferred_username)
            .with_role(user.role.as_deref().unwrap_or_default())
            .with_locale(&user.locale)
            .with_language(&user.language)
            .with_time_zone(&user.zoneinfo))
    }
}

/// Identity backend talking to the Salesforce OAuth endpoints.
#[derive(Clone)]
pub struct SalesforceIdentityBackend {
    config: OAuthConfig,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for SalesforceIdentityBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesforceIdentityBackend")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SalesforceIdentityBackend {
    /// Create a backend with a default HTTP client.
    pub fn new(config: OAuthConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create a backend with a caller-configured HTTP client.
    pub fn with_client(config: OAuthConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    async fn oauth_error(response: reqwest::Response) -> Error {
        let status = response.status();
        match response.json::<OAuthErrorResponse>().await {
            Ok(error) => Error::new(ErrorKind::OAuth {
                error: error.error,
                description: error.error_description,
            }),
            Err(_) => Error::new(ErrorKind::Http(format!("unexpected status {}", status))),
        }
    }
}

#[async_trait]
impl IdentityBackend for SalesforceIdentityBackend {
    /// Revokes the session token on the instance the session is bound to.
    #[instrument(skip(self, config), fields(instance = %config.instance_url()))]
    async fn logout(&self, config: &ConnectorConfig) -> Result<()> {
        let body = serde_urlencoded::to_string([("token", config.session_id())])?;

        let response = self
            .http_client
            .post(config.service_url("/services/oauth2/revoke")?)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::oauth_error(response).await);
        }

        Ok(())
    }

    /// The code parameter is not logged to prevent credential exposure.
    #[instrument(skip(self, code))]
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.consumer_key.as_str()),
            ("redirect_uri", redirect_uri),
        ];

        if let Some(secret) = self.config.consumer_secret() {
            params.push(("client_secret", secret));
        }

        let body = serde_urlencoded::to_string(params)?;

        let response = self
            .http_client
            .post(format!("{}/services/oauth2/token", self.config.login_url))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::oauth_error(response).await);
        }

        let token: TokenResponse = response.json().await?;
        Ok(token)
    }

    #[instrument(skip(self, token), fields(instance = %token.instance_url))]
    async fn user_info(&self, token: &TokenResponse) -> Result<UserInfo> {
        let url = Url::parse(&token.instance_url)?.join("/services/oauth2/userinfo")?;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(&token.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::oauth_error(response).await);
        }

        let info: UserInfo = response.json().await?;
        Ok(info)
    }
}

/// OAuth error response.
#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}
