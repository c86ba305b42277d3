//! Collaborators shared by the authentication and logout filters.

use std::sync::{Arc, Weak};
use std::time::Duration;

use force_auth::{
    ConnectorCache, ContextCipher, CookieOptions, CookieSecurityContextStorage, IdentityBackend,
    MemorySessionStore, OAuthConnector, RequestOrigin, SecurityContextStorage,
    SessionSecurityContextStorage, SessionStore, StorageMethod,
};
use http::HeaderMap;
use tokio::task::JoinHandle;

/// Everything a filter needs besides its own configuration.
///
/// Build one per application and hand the same `Arc` to every filter so
/// they share the session store and connector cache.
#[derive(Clone)]
pub struct ForceServices {
    connector: OAuthConnector,
    backend: Arc<dyn IdentityBackend>,
    cache: Arc<ConnectorCache>,
    cipher: ContextCipher,
    sessions: Arc<dyn SessionStore>,
    cookie_options: CookieOptions,
    default_scheme: String,
    trusted_proxy: bool,
    public_origin: Option<RequestOrigin>,
}

impl std::fmt::Debug for ForceServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForceServices")
            .field("connector", &self.connector)
            .field("cipher", &self.cipher)
            .field("cookie_options", &self.cookie_options)
            .field("default_scheme", &self.default_scheme)
            .field("trusted_proxy", &self.trusted_proxy)
            .field("public_origin", &self.public_origin)
            .finish_non_exhaustive()
    }
}

impl ForceServices {
    /// Create services with an in-memory session store and an empty cache.
    pub fn new(
        connector: OAuthConnector,
        backend: Arc<dyn IdentityBackend>,
        cipher: ContextCipher,
    ) -> Self {
        Self {
            connector,
            backend,
            cache: Arc::new(ConnectorCache::new()),
            cipher,
            sessions: Arc::new(MemorySessionStore::new()),
            cookie_options: CookieOptions::default(),
            default_scheme: "https".to_string(),
            trusted_proxy: false,
            public_origin: None,
        }
    }

    /// Use a different server-side session store.
    pub fn with_session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    /// Share an existing connector cache.
    pub fn with_cache(mut self, cache: Arc<ConnectorCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Set the attributes of every cookie the filters write.
    pub fn with_cookie_options(mut self, options: CookieOptions) -> Self {
        self.cookie_options = options;
        self
    }

    /// Scheme assumed when a request carries no `X-Forwarded-Proto`.
    pub fn with_default_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.default_scheme = scheme.into();
        self
    }

    /// Honor `X-Forwarded-Proto`/`X-Forwarded-Host`. Off by default; only
    /// enable it behind a proxy that overwrites those headers.
    pub fn with_trusted_proxy(mut self, trusted: bool) -> Self {
        self.trusted_proxy = trusted;
        self
    }

    /// Pin the origin used for callback and logout URLs, ignoring request headers.
    pub fn with_public_origin(mut self, origin: RequestOrigin) -> Self {
        self.public_origin = Some(origin);
        self
    }

    /// Origin the current request was addressed to.
    pub fn origin(&self, headers: &HeaderMap) -> RequestOrigin {
        match &self.public_origin {
            Some(origin) => origin.clone(),
            None => RequestOrigin::from_headers(headers, &self.default_scheme, self.trusted_proxy),
        }
    }

    /// Reclaim expired sessions and connector cache entries every `period`.
    ///
    /// The task ends once the last `Arc` to the services is dropped.
    pub fn spawn_purge_task(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let services: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(services) = services.upgrade() else {
                    break;
                };
                let sessions = services.sessions.purge_expired();
                let connectors = services.cache.purge_expired();
                if sessions + connectors > 0 {
                    tracing::debug!(sessions, connectors, "Purged expired entries");
                }
            }
        })
    }

    pub fn connector(&self) -> &OAuthConnector {
        &self.connector
    }

    pub fn backend(&self) -> &dyn IdentityBackend {
        self.backend.as_ref()
    }

    pub fn cache(&self) -> &ConnectorCache {
        &self.cache
    }

    pub fn cookie_options(&self) -> &CookieOptions {
        &self.cookie_options
    }

    pub fn default_scheme(&self) -> &str {
        &self.default_scheme
    }

    /// Build the storage for a configured method.
    pub fn storage(&self, method: StorageMethod) -> Arc<dyn SecurityContextStorage> {
        match method {
            StorageMethod::Cookie => Arc::new(
                CookieSecurityContextStorage::new(self.cipher.clone())
                    .with_cookie_options(self.cookie_options.clone()),
            ),
            StorageMethod::Session => Arc::new(
                SessionSecurityContextStorage::new(self.sessions.clone())
                    .with_cookie_options(self.cookie_options.clone()),
            ),
        }
    }
}
