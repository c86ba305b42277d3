//! Security context storage between requests.
//!
//! Two variants implement [`SecurityContextStorage`]:
//! - [`CookieSecurityContextStorage`] keeps the context in an encrypted cookie.
//! - [`SessionSecurityContextStorage`] keeps it in a server-side session.

use std::sync::Arc;

use http::HeaderMap;
use tracing::instrument;

use crate::context::SecurityContext;
use crate::cookies::{self, CookieOptions};
use crate::crypto::ContextCipher;
use crate::error::{Error, ErrorKind, Result};
use crate::session::SessionStore;

/// Where a security context is persisted between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMethod {
    /// Encrypted `security_context` cookie.
    #[default]
    Cookie,
    /// Server-side session attribute.
    Session,
}

impl std::str::FromStr for StorageMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cookie" => Ok(StorageMethod::Cookie),
            "session" => Ok(StorageMethod::Session),
            other => Err(Error::new(ErrorKind::Config(format!(
                "unknown security context storage method '{}' (expected 'cookie' or 'session')",
                other
            )))),
        }
    }
}

impl std::fmt::Display for StorageMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageMethod::Cookie => f.write_str("cookie"),
            StorageMethod::Session => f.write_str("session"),
        }
    }
}

/// Trait for security context storage implementations.
pub trait SecurityContextStorage: Send + Sync {
    /// The storage method this implementation provides.
    fn method(&self) -> StorageMethod;

    /// Load the context for a request.
    ///
    /// Returns `Ok(None)` when no context is stored and a
    /// `ContextUnreadable` error when one is stored but cannot be decoded.
    fn load(&self, request: &HeaderMap) -> Result<Option<SecurityContext>>;

    /// Save the context, writing any cookies to the response.
    fn save(
        &self,
        request: &HeaderMap,
        response: &mut HeaderMap,
        context: &SecurityContext,
    ) -> Result<()>;

    /// Clear the stored context for a request.
    fn clear(&self, request: &HeaderMap, response: &mut HeaderMap);
}

/// Stores the context as an encrypted cookie.
///
/// Also writes `force_sid` and `force_ep` for client-side consumers;
/// clearing expires all three cookies.
#[derive(Debug, Clone)]
pub struct CookieSecurityContextStorage {
    cipher: ContextCipher,
    options: CookieOptions,
}

impl CookieSecurityContextStorage {
    /// Create a cookie storage with default cookie attributes.
    pub fn new(cipher: ContextCipher) -> Self {
        Self {
            cipher,
            options: CookieOptions::default(),
        }
    }

    /// Set the cookie attributes.
    pub fn with_cookie_options(mut self, options: CookieOptions) -> Self {
        self.options = options;
        self
    }
}

impl SecurityContextStorage for CookieSecurityContextStorage {
    fn method(&self) -> StorageMethod {
        StorageMethod::Cookie
    }

    fn load(&self, request: &HeaderMap) -> Result<Option<SecurityContext>> {
        let sealed = match cookies::get_cookie(request, cookies::SECURITY_CONTEXT) {
            Some(value) if !value.is_empty() => value,
            _ => return Ok(None),
        };

        let json = self.cipher.open(sealed)?;
        let context = serde_json::from_slice(&json).map_err(|e| {
            Error::with_source(
                ErrorKind::ContextUnreadable("invalid security context".to_string()),
                e,
            )
        })?;

        Ok(Some(context))
    }

    #[instrument(skip_all)]
    fn save(
        &self,
        _request: &HeaderMap,
        response: &mut HeaderMap,
        context: &SecurityContext,
    ) -> Result<()> {
        let json = serde_json::to_vec(context)?;
        let sealed = self.cipher.seal(&json)?;

        cookies::append_set_cookie(response, &self.options, cookies::SECURITY_CONTEXT, &sealed)?;
        cookies::append_set_cookie(
            response,
            &self.options,
            cookies::FORCE_SID,
            context.session_id(),
        )?;
        cookies::append_set_cookie(
            response,
            &self.options,
            cookies::FORCE_EP,
            context.endpoint().as_str(),
        )?;

        tracing::debug!("Security context written to cookie");
        Ok(())
    }

    fn clear(&self, _request: &HeaderMap, response: &mut HeaderMap) {
        for name in [cookies::SECURITY_CONTEXT, cookies::FORCE_SID, cookies::FORCE_EP] {
            cookies::append_expired_cookie(response, &self.options, name);
        }
    }
}

/// Stores the context in a server-side session.
///
/// The session is identified by the `force_session` cookie. Every save
/// issues a fresh session id and drops the one the request presented.
/// Clearing removes the stored context and expires `force_session`; the
/// `security_context` cookie is left untouched.
#[derive(Clone)]
pub struct SessionSecurityContextStorage {
    sessions: Arc<dyn SessionStore>,
    options: CookieOptions,
}

impl std::fmt::Debug for SessionSecurityContextStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSecurityContextStorage")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SessionSecurityContextStorage {
    /// Create a session storage backed by `sessions`.
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            sessions,
            options: CookieOptions::default(),
        }
    }

    /// Set the attributes of the session id cookie.
    pub fn with_cookie_options(mut self, options: CookieOptions) -> Self {
        self.options = options;
        self
    }

    fn session_id<'a>(&self, request: &'a HeaderMap) -> Option<&'a str> {
        cookies::get_cookie(request, cookies::SESSION_ID).filter(|id| !id.is_empty())
    }
}

impl SecurityContextStorage for SessionSecurityContextStorage {
    fn method(&self) -> StorageMethod {
        StorageMethod::Session
    }

    fn load(&self, request: &HeaderMap) -> Result<Option<SecurityContext>> {
        Ok(self
            .session_id(request)
            .and_then(|id| self.sessions.get(id)))
    }

    #[instrument(skip_all)]
    fn save(
        &self,
        request: &HeaderMap,
        response: &mut HeaderMap,
        context: &SecurityContext,
    ) -> Result<()> {
        // A new login always gets a new session; a presented id is never adopted.
        if let Some(previous) = self.session_id(request) {
            self.sessions.remove(previous);
        }

        let session_id = uuid::Uuid::new_v4().simple().to_string();
        cookies::append_set_cookie(response, &self.options, cookies::SESSION_ID, &session_id)?;
        self.sessions.put(&session_id, context.clone());

        tracing::debug!("Created server session");
        Ok(())
    }

    fn clear(&self, request: &HeaderMap, response: &mut HeaderMap) {
        if let Some(id) = self.session_id(request) {
            self.sessions.remove(id);
        }
        cookies::append_expired_cookie(response, &self.options, cookies::SESSION_ID);
    }
}
