//! # force-filter
//!
//! axum/tower filters for Force.com OAuth web applications.
//!
//! - [`AuthLayer`] completes the OAuth flow on the callback path and makes
//!   the stored [`SecurityContext`](force_auth::SecurityContext) available
//!   to handlers through [`ForceContext`] and
//!   [`SecurityContextHolder`](force_auth::SecurityContextHolder)
//! - [`LogoutFilter`] ends the session remotely, clears local state and
//!   redirects, optionally through the provider's logout page
//!
//! Both filters share one [`ForceServices`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use axum::{routing::get, Router};
//! use force_filter::{AuthFilterConfig, AuthLayer, ForceContext, ForceServices, LogoutFilter, LogoutFilterConfig};
//!
//! async fn home(ForceContext(context): ForceContext) -> String {
//!     format!("Hello, {}", context.user_name())
//! }
//!
//! let services = Arc::new(ForceServices::new(connector, backend, cipher));
//! let app = Router::new()
//!     .route("/", get(home))
//!     .merge(LogoutFilter::new(LogoutFilterConfig::from_env()?, services.clone()).into_router("/logout"))
//!     .layer(AuthLayer::new(AuthFilterConfig::from_env()?, services));
//! ```

mod auth;
pub mod config;
mod logout;
pub mod redirect;
mod services;

pub use auth::{AuthLayer, AuthService, ForceContext};
pub use config::{AuthFilterConfig, LogoutFilterConfig};
pub use logout::{logout_handler, LogoutFilter};
pub use services::ForceServices;

pub use force_auth;
