//! The authenticated session's identity and connection attributes.
//!
//! `SecurityContext` implements a custom Debug to redact the session id.

use serde::{Deserialize, Serialize};
use url::Url;

/// Identity and connection state for the current request.
///
/// Created on successful authentication and cleared on logout or session
/// expiry. Owned by the current request; never shared between tasks.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SecurityContext {
    session_id: String,
    endpoint: Url,
    org_id: String,
    user_id: String,
    user_name: String,
    role: String,
    locale: String,
    language: String,
    time_zone: String,
}

impl std::fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityContext")
            .field("session_id", &"[REDACTED]")
            .field("endpoint", &self.endpoint.as_str())
            .field("org_id", &self.org_id)
            .field("user_id", &self.user_id)
            .field("user_name", &self.user_name)
            .field("role", &self.role)
            .field("locale", &self.locale)
            .field("language", &self.language)
            .field("time_zone", &self.time_zone)
            .finish()
    }
}

impl SecurityContext {
    /// Create a context for a session on the given endpoint.
    ///
    /// The remaining user attributes default to empty strings.
    pub fn new(session_id: impl Into<String>, endpoint: Url) -> Self {
        Self {
            session_id: session_id.into(),
            endpoint,
            org_id: String::new(),
            user_id: String::new(),
            user_name: String::new(),
            role: String::new(),
            locale: String::new(),
            language: String::new(),
            time_zone: String::new(),
        }
    }

    pub fn with_org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = org_id.into();
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = user_name.into();
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    /// The session id (access token) issued by the identity provider.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Returns true if the context carries a session id.
    ///
    /// A context may outlive its session id when the session was already
    /// terminated elsewhere; such a context has nothing to log out remotely.
    pub fn has_session(&self) -> bool {
        !self.session_id.is_empty()
    }

    /// The API endpoint the session is bound to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn time_zone(&self) -> &str {
        &self.time_zone
    }
}

#[cfg(test)]
pub(crate) fn test_context() -> SecurityContext {
    SecurityContext::new(
        "00Dxx0000001gPL!AQ4AQFakeSessionId",
        Url::parse("https://na1.salesforce.com/services/Soap/u/62.0/00Dxx0000001gPL").unwrap(),
    )
    .with_org_id("00Dxx0000001gPL")
    .with_user_id("005xx000001Sv6AAAS")
    .with_user_name("alice@example.com")
    .with_role("CEO")
    .with_locale("en_US")
    .with_language("en_US")
    .with_time_zone("America/Los_Angeles")
}
