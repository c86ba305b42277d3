//! # force-auth
//!
//! Security context handling for Force.com web applications.
//!
//! ## Security
//!
//! - Session ids, tokens and keys are redacted in Debug output
//! - Tracing skips credential parameters
//! - The cookie form of a context is encrypted and authenticated; a context
//!   that fails to decode is an error, never treated as absent
//!
//! ## Components
//!
//! - [`SecurityContext`] - identity and connection attributes of a session
//! - [`SecurityContextStorage`] - cookie or server-session persistence
//! - [`SecurityContextHolder`] - request-scoped access to the active context
//! - [`OAuthConnector`] - authorization and logout URL building
//! - [`IdentityBackend`] - remote token exchange, user info and logout
//!
//! ## Example
//!
//! ```rust,ignore
//! use force_auth::{ContextCipher, CookieSecurityContextStorage, SecurityContextStorage};
//!
//! let cipher = ContextCipher::from_secret(&std::env::var("FORCE_COOKIE_SECRET")?)?;
//! let storage = CookieSecurityContextStorage::new(cipher);
//!
//! match storage.load(request.headers()) {
//!     Ok(Some(context)) => println!("signed in as {}", context.user_name()),
//!     Ok(None) => println!("anonymous"),
//!     Err(e) if e.is_context_unreadable() => println!("re-authenticate"),
//!     Err(e) => return Err(e.into()),
//! }
//! ```

mod backend;
mod connector;
mod context;
pub mod cookies;
mod crypto;
mod error;
mod holder;
mod session;
mod storage;

pub use backend::{IdentityBackend, SalesforceIdentityBackend, TokenResponse, UserInfo};
pub use connector::{
    ConnectorCache, ConnectorConfig, OAuthConfig, OAuthConnector, RequestOrigin,
    DEFAULT_CALLBACK_PATH, DEFAULT_CONNECTOR_TTL_MINUTES, LOGOUT_CALLBACK_PARAM, LOGOUT_PATH,
};
pub use context::SecurityContext;
pub use cookies::{CookieOptions, SameSite};
pub use crypto::ContextCipher;
pub use error::{Error, ErrorKind, Result};
pub use holder::SecurityContextHolder;
pub use session::{MemorySessionStore, SessionStore, DEFAULT_MAX_INACTIVE_MINUTES};
pub use storage::{
    CookieSecurityContextStorage, SecurityContextStorage, SessionSecurityContextStorage,
    StorageMethod,
};

/// Default Salesforce login URL for production.
pub const PRODUCTION_LOGIN_URL: &str = "https://login.salesforce.com";

/// Default Salesforce login URL for sandbox.
pub const SANDBOX_LOGIN_URL: &str = "https://test.salesforce.com";

/// API version used for the session endpoint.
pub const DEFAULT_API_VERSION: &str = "62.0";
