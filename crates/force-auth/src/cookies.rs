//! Cookie names and helpers for reading `Cookie` and writing `Set-Cookie` headers.

use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};

/// Session id cookie for client-side consumers.
pub const FORCE_SID: &str = "force_sid";

/// Endpoint cookie for client-side consumers.
pub const FORCE_EP: &str = "force_ep";

/// Encrypted security context cookie.
pub const SECURITY_CONTEXT: &str = "security_context";

/// Server-side session id cookie used by session storage.
pub const SESSION_ID: &str = "force_session";

/// Cookies issued by the identity provider, cleared on provider logout.
pub const PROVIDER_COOKIES: &[&str] = &["sid", "sid_Client", "clientSrc"];

/// SameSite cookie policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes applied to every cookie written by the storage services.
#[derive(Debug, Clone)]
pub struct CookieOptions {
    /// Cookie path.
    pub path: String,
    /// Cookie domain.
    pub domain: Option<String>,
    /// Secure flag (HTTPS only).
    pub secure: bool,
    /// HttpOnly flag.
    pub http_only: bool,
    /// SameSite policy.
    pub same_site: SameSite,
    /// Max age in seconds; `None` makes a browser-session cookie.
    pub max_age: Option<i64>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
            max_age: None,
        }
    }
}

impl CookieOptions {
    /// Set the cookie path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the cookie domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the Secure flag.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the SameSite policy.
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Set the max age in seconds.
    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Build a `Set-Cookie` value writing `name=value`.
    pub fn set_cookie(&self, name: &str, value: &str) -> String {
        let mut parts = vec![format!("{}={}", name, value)];
        self.push_scope(&mut parts);

        if let Some(max_age) = self.max_age {
            parts.push(format!("Max-Age={}", max_age));
        }
        if self.secure {
            parts.push("Secure".to_string());
        }
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }
        parts.push(format!("SameSite={}", self.same_site.as_str()));

        parts.join("; ")
    }

    /// Build a `Set-Cookie` value expiring `name` immediately.
    pub fn expire_cookie(&self, name: &str) -> String {
        let mut parts = vec![format!("{}=", name)];
        self.push_scope(&mut parts);
        parts.push("Max-Age=0".to_string());
        parts.join("; ")
    }

    fn push_scope(&self, parts: &mut Vec<String>) {
        if let Some(ref domain) = self.domain {
            parts.push(format!("Domain={}", domain));
        }
        parts.push(format!("Path={}", self.path));
    }
}

/// Find a cookie value in the request's `Cookie` headers.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|header| header.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then_some(value)
        })
}

/// Append a `Set-Cookie` header writing `name=value`.
pub fn append_set_cookie(
    headers: &mut HeaderMap,
    options: &CookieOptions,
    name: &str,
    value: &str,
) -> crate::Result<()> {
    let header = HeaderValue::from_str(&options.set_cookie(name, value)).map_err(|e| {
        crate::Error::with_source(
            crate::ErrorKind::InvalidInput(format!("cookie {} has an invalid value", name)),
            e,
        )
    })?;
    headers.append(SET_COOKIE, header);
    Ok(())
}

/// Append a `Set-Cookie` header expiring `name`.
pub fn append_expired_cookie(headers: &mut HeaderMap, options: &CookieOptions, name: &str) {
    // Cookie names are compile-time constants, so the header is always valid.
    if let Ok(header) = HeaderValue::from_str(&options.expire_cookie(name)) {
        headers.append(SET_COOKIE, header);
    }
}

/// Returns true if the response expires `name`.
pub fn is_expired_in(headers: &HeaderMap, name: &str) -> bool {
    let prefix = format!("{}=", name);
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix) && v.contains("Max-Age=0"))
}

/// Returns the value the response sets for `name`, ignoring expirations.
pub fn set_value_in<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let prefix = format!("{}=", name);
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| !v.contains("Max-Age=0"))
        .find_map(|v| v.strip_prefix(prefix.as_str()))
        .map(|rest| rest.split(';').next().unwrap_or_default())
}
