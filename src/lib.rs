//! # force-sdk
//!
//! Force.com OAuth security context and logout pipeline for Rust web services.
//!
//! ## Security
//!
//! - Session ids, tokens and keys are redacted in Debug output
//! - The security context cookie is encrypted and authenticated
//! - Logout clears local state even when the provider cannot be reached
//!
//! ## Crates
//!
//! - **force-auth** - Security context, storage, holder, OAuth connector and identity backend
//! - **force-filter** - axum/tower authentication layer and logout filter
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use force_sdk::auth::{ContextCipher, OAuthConfig, OAuthConnector, SalesforceIdentityBackend};
//! use force_sdk::filter::{AuthFilterConfig, AuthLayer, ForceServices, LogoutFilter, LogoutFilterConfig};
//!
//! let oauth = OAuthConfig::from_env()?;
//! let services = Arc::new(ForceServices::new(
//!     OAuthConnector::new(oauth.clone()),
//!     Arc::new(SalesforceIdentityBackend::new(oauth)),
//!     ContextCipher::from_secret(&std::env::var("FORCE_COOKIE_SECRET")?)?,
//! ));
//!
//! let app = axum::Router::new()
//!     .route("/", axum::routing::get(home))
//!     .merge(LogoutFilter::new(LogoutFilterConfig::from_env()?, services.clone()).into_router("/logout"))
//!     .layer(AuthLayer::new(AuthFilterConfig::from_env()?, services));
//! ```

#[cfg(feature = "auth")]
pub use force_auth as auth;
#[cfg(feature = "filter")]
pub use force_filter as filter;

#[cfg(feature = "auth")]
pub use force_auth::{SecurityContext, SecurityContextHolder, StorageMethod};
#[cfg(feature = "filter")]
pub use force_filter::{AuthLayer, ForceContext, ForceServices, LogoutFilter};
