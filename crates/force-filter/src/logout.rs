//! Logout filter.
//!
//! Per request the filter moves a session from authenticated to logged out:
//! it ends the session on the identity backend, clears every piece of local
//! state and redirects. Local state is cleared whatever the backend answers,
//! so a failed remote call can never leave the user signed in locally.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use force_auth::{
    cookies, ConnectorConfig, SecurityContext, SecurityContextHolder, SecurityContextStorage,
};
use http::HeaderMap;

use crate::config::LogoutFilterConfig;
use crate::redirect::redirect;
use crate::services::ForceServices;

/// Ends the current session and redirects to the configured target.
pub struct LogoutFilter {
    config: LogoutFilterConfig,
    services: Arc<ForceServices>,
    storage: Arc<dyn SecurityContextStorage>,
}

impl std::fmt::Debug for LogoutFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogoutFilter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LogoutFilter {
    /// Initialize the filter. The configuration is fixed from here on.
    pub fn new(config: LogoutFilterConfig, services: Arc<ForceServices>) -> Self {
        let storage = services.storage(config.storage_method);
        tracing::info!(
            logout_from_force_dot_com = config.logout_from_force_dot_com,
            logout_success_url = %config.logout_success_url,
            storage_method = %config.storage_method,
            "Logout filter initialized"
        );
        Self {
            config,
            services,
            storage,
        }
    }

    pub fn config(&self) -> &LogoutFilterConfig {
        &self.config
    }

    /// Router serving the filter on `path` (GET and POST).
    pub fn into_router(self, path: &str) -> Router {
        Router::new()
            .route(path, get(logout_handler).post(logout_handler))
            .with_state(Arc::new(self))
    }

    /// Log the request's session out and build the redirect response.
    pub async fn do_filter(&self, request: &HeaderMap) -> Response {
        let mut set_cookies = HeaderMap::new();

        let Some(context) = self.current_context(request, &mut set_cookies) else {
            tracing::debug!("No security context, already logged out");
            if self.config.logout_from_force_dot_com {
                self.expire_provider_cookies(&mut set_cookies);
            }
            return redirect(&self.config.logout_success_url, set_cookies);
        };

        let connector_config = self.services.cache().resolve(&context);
        self.remote_logout(&context, &connector_config).await;
        self.clear_local_state(&context, request, &mut set_cookies);

        let target = self.redirect_target(request, &connector_config);
        tracing::info!(user_id = %context.user_id(), "Logged out");
        redirect(&target, set_cookies)
    }

    /// The holder's context, else the stored one. An unreadable stored
    /// context is cleared and treated as absent.
    fn current_context(
        &self,
        request: &HeaderMap,
        set_cookies: &mut HeaderMap,
    ) -> Option<SecurityContext> {
        if let Some(context) = SecurityContextHolder::get() {
            return Some(context);
        }

        match self.storage.load(request) {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!(error = %e, "Stored security context unreadable, clearing it");
                self.storage.clear(request, set_cookies);
                None
            }
        }
    }

    /// Issue the remote logout at most once. Failures are logged, not raised.
    async fn remote_logout(&self, context: &SecurityContext, config: &ConnectorConfig) {
        if !context.has_session() {
            // Session already terminated elsewhere; nothing to revoke.
            tracing::debug!(user_id = %context.user_id(), "No session id, skipping remote logout");
            return;
        }

        match self.services.backend().logout(config).await {
            Ok(()) => tracing::debug!(user_id = %context.user_id(), "Remote session ended"),
            Err(e) if e.is_connection_failure() => tracing::warn!(
                user_id = %context.user_id(),
                error = %e,
                "Identity backend unreachable, logging out locally only"
            ),
            Err(e) => tracing::warn!(
                user_id = %context.user_id(),
                error = %e,
                "Remote logout rejected, logging out locally only"
            ),
        }
    }

    fn clear_local_state(
        &self,
        context: &SecurityContext,
        request: &HeaderMap,
        set_cookies: &mut HeaderMap,
    ) {
        SecurityContextHolder::release();
        self.storage.clear(request, set_cookies);
        self.services.cache().evict(context.user_id());
        if self.config.logout_from_force_dot_com {
            self.expire_provider_cookies(set_cookies);
        }
    }

    fn expire_provider_cookies(&self, set_cookies: &mut HeaderMap) {
        for name in cookies::PROVIDER_COOKIES {
            cookies::append_expired_cookie(set_cookies, self.services.cookie_options(), name);
        }
    }

    fn redirect_target(&self, request: &HeaderMap, config: &ConnectorConfig) -> String {
        if !self.config.logout_from_force_dot_com {
            return self.config.logout_success_url.clone();
        }

        let origin = self.services.origin(request);
        match self.services.connector().build_logout_url(
            &origin,
            config.endpoint(),
            &self.config.logout_success_url,
        ) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not build provider logout URL");
                self.config.logout_success_url.clone()
            }
        }
    }
}

/// Axum handler running [`LogoutFilter::do_filter`].
pub async fn logout_handler(State(filter): State<Arc<LogoutFilter>>, headers: HeaderMap) -> Response {
    filter.do_filter(&headers).await
}
