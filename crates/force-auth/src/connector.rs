//! OAuth connector: provider URL building and per-session connection settings.
//!
//! Everything in this module is a pure function of its inputs; the network
//! calls live in [`crate::backend`].

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use http::header::HOST;
use http::HeaderMap;
use parking_lot::RwLock;
use url::Url;

use crate::context::SecurityContext;
use crate::error::{Error, ErrorKind, Result};

/// Path of the provider's browser logout page.
pub const LOGOUT_PATH: &str = "/secur/logout.jsp";

/// Query parameter carrying the post-logout callback.
pub const LOGOUT_CALLBACK_PARAM: &str = "retUrl";

/// Default path that receives the authorization code.
pub const DEFAULT_CALLBACK_PATH: &str = "/_auth";

/// OAuth 2.0 configuration for a connected app.
///
/// The consumer secret is redacted in Debug output.
#[derive(Clone)]
pub struct OAuthConfig {
    /// Consumer key (client_id).
    pub consumer_key: String,
    /// Consumer secret (client_secret).
    consumer_secret: Option<String>,
    /// Login endpoint, e.g. `https://login.salesforce.com`.
    pub login_url: String,
    /// Local path receiving the authorization code.
    pub callback_path: String,
    /// Scopes to request.
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("login_url", &self.login_url)
            .field("callback_path", &self.callback_path)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl OAuthConfig {
    /// Create a new OAuth config against the production login endpoint.
    pub fn new(consumer_key: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: None,
            login_url: crate::PRODUCTION_LOGIN_URL.to_string(),
            callback_path: DEFAULT_CALLBACK_PATH.to_string(),
            scopes: vec!["api".to_string(), "id".to_string()],
        }
    }

    /// Set the consumer secret.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.consumer_secret = Some(secret.into());
        self
    }

    pub(crate) fn consumer_secret(&self) -> Option<&str> {
        self.consumer_secret.as_deref()
    }

    /// Set the login endpoint.
    pub fn with_login_url(mut self, login_url: impl Into<String>) -> Self {
        self.login_url = login_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the local callback path.
    pub fn with_callback_path(mut self, path: impl Into<String>) -> Self {
        self.callback_path = path.into();
        self
    }

    /// Set the scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Load the config from environment variables.
    ///
    /// Required: `FORCE_CONSUMER_KEY`.
    /// Optional: `FORCE_CONSUMER_SECRET`, `FORCE_LOGIN_URL`, `FORCE_CALLBACK_PATH`.
    pub fn from_env() -> Result<Self> {
        let consumer_key = std::env::var("FORCE_CONSUMER_KEY")
            .map_err(|_| Error::new(ErrorKind::EnvVar("FORCE_CONSUMER_KEY".to_string())))?;

        let mut config = Self::new(consumer_key);
        if let Ok(secret) = std::env::var("FORCE_CONSUMER_SECRET") {
            config = config.with_secret(secret);
        }
        if let Ok(login_url) = std::env::var("FORCE_LOGIN_URL") {
            config = config.with_login_url(login_url);
        }
        if let Ok(path) = std::env::var("FORCE_CALLBACK_PATH") {
            config = config.with_callback_path(path);
        }
        Ok(config)
    }
}

/// Scheme and authority the current request was addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    scheme: String,
    host: String,
}

impl RequestOrigin {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
        }
    }

    /// Parse a configured public origin such as `https://app.example.com`.
    pub fn parse(origin: &str) -> Result<Self> {
        let url = Url::parse(origin)?;
        let host = url.host_str().ok_or_else(|| {
            Error::new(ErrorKind::InvalidUrl(format!("{} has no host", origin)))
        })?;
        let host = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        Ok(Self::new(url.scheme(), host))
    }

    /// Derive the origin from request headers.
    ///
    /// Uses `Host`, falling back to `localhost`. `X-Forwarded-Proto` and
    /// `X-Forwarded-Host` are honored only when `trust_forwarded` is set,
    /// i.e. when a proxy in front of the service overwrites them.
    pub fn from_headers(headers: &HeaderMap, default_scheme: &str, trust_forwarded: bool) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let forwarded = |name: &str| if trust_forwarded { header(name) } else { None };

        let scheme = forwarded("x-forwarded-proto").unwrap_or(default_scheme);
        let host = forwarded("x-forwarded-host")
            .or_else(|| header(HOST.as_str()))
            .unwrap_or("localhost");

        Self::new(scheme, host)
    }

    /// The origin as a base URL.
    pub fn base_url(&self) -> Result<Url> {
        Ok(Url::parse(&format!("{}://{}/", self.scheme, self.host))?)
    }

    /// Resolve `target` against this origin. Absolute targets are returned unchanged.
    pub fn absolute(&self, target: &str) -> Result<String> {
        if Url::parse(target).is_ok() {
            return Ok(target.to_string());
        }
        Ok(self.base_url()?.join(target)?.to_string())
    }
}

/// Builds provider-side URLs for a connected app.
#[derive(Debug, Clone)]
pub struct OAuthConnector {
    config: OAuthConfig,
}

impl OAuthConnector {
    pub fn new(config: OAuthConfig) -> Self {
        Self { config }
    }

    /// Get the OAuth config.
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Absolute URL of the local OAuth callback for a request origin.
    pub fn redirect_uri(&self, origin: &RequestOrigin) -> Result<String> {
        origin.absolute(&self.config.callback_path)
    }

    /// The authorization URL to send unauthenticated users to.
    pub fn authorization_url(&self, origin: &RequestOrigin, state: Option<&str>) -> Result<String> {
        let redirect_uri = self.redirect_uri(origin)?;
        let scopes = self.config.scopes.join(" ");

        let mut url = format!(
            "{}/services/oauth2/authorize?response_type=code&client_id={}&redirect_uri={}",
            self.config.login_url,
            urlencoding::encode(&self.config.consumer_key),
            urlencoding::encode(&redirect_uri),
        );

        if !scopes.is_empty() {
            url.push_str(&format!("&scope={}", urlencoding::encode(&scopes)));
        }

        if let Some(state) = state {
            url.push_str(&format!("&state={}", urlencoding::encode(state)));
        }

        Ok(url)
    }

    /// Build the provider logout URL with `local_target` as its callback.
    ///
    /// The provider part is the scheme, host and port of `provider_endpoint`
    /// followed by the logout page. Relative targets are made absolute
    /// against `origin` so the provider can redirect back.
    pub fn build_logout_url(
        &self,
        origin: &RequestOrigin,
        provider_endpoint: &Url,
        local_target: &str,
    ) -> Result<Url> {
        let mut url = provider_endpoint.join(LOGOUT_PATH)?;
        url.set_query(None);
        url.set_fragment(None);

        let callback = origin.absolute(local_target)?;
        url.set_query(Some(&format!(
            "{}={}",
            LOGOUT_CALLBACK_PARAM,
            urlencoding::encode(&callback)
        )));
        Ok(url)
    }
}

/// Connection settings derived from a security context.
///
/// The session id is redacted in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectorConfig {
    endpoint: Url,
    session_id: String,
}

impl std::fmt::Debug for ConnectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("session_id", &"[REDACTED]")
            .finish()
    }
}

impl ConnectorConfig {
    pub fn new(endpoint: Url, session_id: impl Into<String>) -> Self {
        Self {
            endpoint,
            session_id: session_id.into(),
        }
    }

    /// Build the settings for a context's endpoint and session id.
    pub fn from_context(context: &SecurityContext) -> Self {
        Self::new(context.endpoint().clone(), context.session_id())
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The instance origin, e.g. `https://na1.salesforce.com`.
    pub fn instance_url(&self) -> String {
        self.endpoint.origin().ascii_serialization()
    }

    /// Resolve an absolute path on the instance.
    pub fn service_url(&self, path: &str) -> Result<Url> {
        Ok(self.endpoint.join(path)?)
    }
}

/// How long cached connector settings stay valid, in minutes.
pub const DEFAULT_CONNECTOR_TTL_MINUTES: i64 = 120;

#[derive(Debug, Clone)]
struct CachedConnector {
    config: ConnectorConfig,
    cached_at: DateTime<Utc>,
}

/// Process-scoped cache of connector settings keyed by user id.
///
/// Shared by the authentication and logout filters; `clear` resets it.
/// Entries expire after a time-to-live and are reclaimed on every `put`.
#[derive(Debug)]
pub struct ConnectorCache {
    entries: RwLock<HashMap<String, CachedConnector>>,
    ttl: Duration,
}

impl Default for ConnectorCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectorCache {
    pub fn new() -> Self {
        Self::with_ttl(Duration::minutes(DEFAULT_CONNECTOR_TTL_MINUTES))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Cached settings for a user.
    pub fn get(&self, user_id: &str) -> Option<ConnectorConfig> {
        let now = Utc::now();
        self.entries
            .read()
            .get(user_id)
            .filter(|entry| !self.is_expired(entry, now))
            .map(|entry| entry.config.clone())
    }

    /// Cache the settings for a context, replacing older ones for the same user.
    pub fn put(&self, context: &SecurityContext) {
        let now = Utc::now();
        let mut entries = self.entries.write();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        entries.insert(
            context.user_id().to_string(),
            CachedConnector {
                config: ConnectorConfig::from_context(context),
                cached_at: now,
            },
        );
    }

    /// Settings for a context: the cached entry if it belongs to the same
    /// session, otherwise freshly built from the context.
    pub fn resolve(&self, context: &SecurityContext) -> ConnectorConfig {
        match self.get(context.user_id()) {
            Some(cached) if cached.session_id() == context.session_id() => cached,
            _ => ConnectorConfig::from_context(context),
        }
    }

    /// Drop the settings for a user.
    pub fn evict(&self, user_id: &str) -> Option<ConnectorConfig> {
        self.entries.write().remove(user_id).map(|entry| entry.config)
    }

    /// Drop every expired entry. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        before - entries.len()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of entries held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &CachedConnector, now: DateTime<Utc>) -> bool {
        now - entry.cached_at > self.ttl
    }
}
